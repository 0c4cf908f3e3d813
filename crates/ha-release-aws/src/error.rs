//! Mapping of AWS SDK failures onto [`FleetError`].

use aws_sdk_ec2::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};

use ha_release_fleet::FleetError;

/// Error codes that mean the credentials, not the request, are the problem.
const AUTH_CODES: &[&str] = &[
    "AccessDenied",
    "AccessDeniedException",
    "AuthFailure",
    "ExpiredToken",
    "ExpiredTokenException",
    "InvalidClientTokenId",
    "SignatureDoesNotMatch",
    "UnauthorizedOperation",
    "UnrecognizedClientException",
];

/// EC2's code for an instance ID it no longer knows.
pub(crate) const INSTANCE_NOT_FOUND: &str = "InvalidInstanceID.NotFound";

/// Service error code of an SDK failure, if the service answered at all.
pub(crate) fn error_code<E, R>(err: &SdkError<E, R>) -> Option<&str>
where
    E: ProvideErrorMetadata,
{
    match err {
        SdkError::ServiceError(e) => e.err().code(),
        _ => None,
    }
}

/// Convert an SDK failure into a fleet error.
///
/// `instance` names the instance the call acted on, if any, so that EC2's
/// not-found code can be reported as `InstanceNotFound`.
pub(crate) fn fleet_error<E, R>(
    operation: &str,
    instance: Option<&str>,
    err: SdkError<E, R>,
) -> FleetError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let code = error_code(&err).map(str::to_string);
    let detail = format!("{operation}: {}", DisplayErrorContext(&err));
    classify(code.as_deref(), instance, detail)
}

pub(crate) fn classify(code: Option<&str>, instance: Option<&str>, detail: String) -> FleetError {
    match (code, instance) {
        (Some(INSTANCE_NOT_FOUND), Some(id)) => FleetError::InstanceNotFound(id.to_string()),
        (Some(code), _) if AUTH_CODES.contains(&code) => FleetError::Auth(detail),
        _ => FleetError::Provider(detail),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_codes_are_not_transient() {
        for code in ["AuthFailure", "UnauthorizedOperation", "ExpiredToken"] {
            let err = classify(Some(code), None, "denied".into());
            assert_eq!(err, FleetError::Auth("denied".into()));
            assert!(!err.is_transient());
        }
    }

    #[test]
    fn missing_instance_names_the_instance() {
        let err = classify(Some(INSTANCE_NOT_FOUND), Some("i-0abc"), "gone".into());
        assert_eq!(err, FleetError::InstanceNotFound("i-0abc".into()));
    }

    #[test]
    fn missing_instance_without_context_is_provider_error() {
        let err = classify(Some(INSTANCE_NOT_FOUND), None, "gone".into());
        assert!(matches!(err, FleetError::Provider(_)));
    }

    #[test]
    fn throttling_and_network_failures_are_transient() {
        assert!(classify(Some("Throttling"), None, "slow down".into()).is_transient());
        assert!(classify(None, None, "connection reset".into()).is_transient());
    }
}
