//! AWS SDK error mapping
//!
//! Converts SDK failures into [`ProviderError`], preserving the remote error
//! code so lifecycle handlers and probes can classify transient conditions.

use aws_sdk_ec2::error::{ProvideErrorMetadata, SdkError};
use stratus_core::provider::ProviderError;

pub const GATEWAY_NOT_FOUND: &str = "InvalidInternetGatewayID.NotFound";
pub const GATEWAY_NOT_ATTACHED: &str = "Gateway.NotAttached";
pub const DEPENDENCY_VIOLATION: &str = "DependencyViolation";
pub const NAT_GATEWAY_NOT_FOUND: &str = "NatGatewayNotFound";

/// Whether the remote reported exactly this error code
pub fn is_code<E, R>(err: &SdkError<E, R>, code: &str) -> bool
where
    E: ProvideErrorMetadata,
{
    err.code() == Some(code)
}

/// Convert an SDK failure into a [`ProviderError`] with call context
pub fn api_error<E, R>(context: &str, err: SdkError<E, R>) -> ProviderError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug + Send + Sync + 'static,
{
    let code = err.code().map(str::to_owned);
    let detail = err
        .message()
        .map(str::to_owned)
        .unwrap_or_else(|| err.to_string());
    let mapped = ProviderError::new(format!("{context}: {detail}")).with_cause(err);
    match code {
        Some(code) => mapped.with_code(code),
        None => mapped,
    }
}
