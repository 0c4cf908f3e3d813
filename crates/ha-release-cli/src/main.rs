use clap::Parser;
use clap::builder::NonEmptyStringValueParser;

mod commands;

#[derive(Debug, Parser)]
#[command(
    name = "ha-release",
    about = "Phase new instances into an autoscaling group without downtime",
    version
)]
struct Cli {
    /// Name of the autoscaling group
    #[arg(short, long, value_parser = NonEmptyStringValueParser::new())]
    asg: String,
    /// Region of the autoscaling group
    #[arg(short, long, value_parser = NonEmptyStringValueParser::new())]
    region: String,
    /// Credentials profile
    #[arg(short, long, value_parser = NonEmptyStringValueParser::new())]
    profile: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .or_else(|_| tracing_subscriber::EnvFilter::try_new("info"))?,
        )
        .init();

    // Exits with status 2 on missing or empty options, before any AWS call.
    let cli = Cli::parse();

    commands::release::release(&cli.asg, &cli.region, &cli.profile).await
}
