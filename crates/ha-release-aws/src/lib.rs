//! ha-release-aws — the AWS fleet backend.
//!
//! Group membership, desired capacity and load balancer names come from
//! Auto Scaling; tags and termination go through EC2; health comes from
//! the classic Elastic Load Balancing API. Application/network load
//! balancer target groups are not read.

pub mod client;
mod error;

pub use client::AwsFleet;
