//! Status probes for EC2 resources
//!
//! Each probe wraps one control-plane call and classifies the response into
//! a status label for the waiter. Probes keep their bookkeeping in explicit
//! fields so a wait's data dependencies stay visible and testable.

use std::time::Duration;

use aws_sdk_ec2::Client as Ec2Client;
use aws_sdk_ec2::types::{AttachmentStatus, InternetGateway, NatGateway};
use tokio::time::Instant;

use stratus_core::provider::{BoxFuture, ProviderError};
use stratus_core::waiter::{Observation, Probe};

use crate::{errs, finder};

/// Status the EC2 API reports once an internet gateway attachment has
/// settled, instead of `attached`
pub const GATEWAY_ATTACHMENT_SETTLED: &str = "available";

/// The attachment API can keep reporting a stale state after the attachment
/// lands; past this grace period the probe reports the expected status.
const ATTACHMENT_REPORT_GRACE: Duration = Duration::from_secs(10);

/// Watches the attachment state of an internet gateway
pub struct GatewayAttachment {
    ec2: Ec2Client,
    gateway_id: String,
    expected: &'static str,
    first_observed: Option<Instant>,
}

impl GatewayAttachment {
    pub fn new(ec2: Ec2Client, gateway_id: impl Into<String>, expected: &'static str) -> Self {
        Self {
            ec2,
            gateway_id: gateway_id.into(),
            expected,
            first_observed: None,
        }
    }
}

impl Probe for GatewayAttachment {
    type Value = InternetGateway;
    type Error = ProviderError;

    fn observe(&mut self) -> BoxFuture<'_, Result<Observation<InternetGateway>, ProviderError>> {
        Box::pin(async move {
            let Some(gateway) = finder::find_internet_gateway(&self.ec2, &self.gateway_id).await?
            else {
                return Ok(Observation::absent());
            };

            let first_observed = *self.first_observed.get_or_insert_with(Instant::now);
            if first_observed.elapsed() > ATTACHMENT_REPORT_GRACE {
                return Ok(Observation::observed(gateway, self.expected));
            }

            let status = match gateway.attachments().first().and_then(|a| a.state()) {
                Some(state) => state.as_str().to_owned(),
                None => AttachmentStatus::Detached.as_str().to_owned(),
            };
            Ok(Observation::observed(gateway, status))
        })
    }
}

/// Drives an internet gateway detachment and classifies the outcome
///
/// The detach call itself is the probe: this API reports progress only
/// through its error codes.
pub struct GatewayDetach {
    ec2: Ec2Client,
    gateway_id: String,
    vpc_id: String,
}

impl GatewayDetach {
    pub fn new(ec2: Ec2Client, gateway_id: impl Into<String>, vpc_id: impl Into<String>) -> Self {
        Self {
            ec2,
            gateway_id: gateway_id.into(),
            vpc_id: vpc_id.into(),
        }
    }
}

impl Probe for GatewayDetach {
    type Value = ();
    type Error = ProviderError;

    fn observe(&mut self) -> BoxFuture<'_, Result<Observation<()>, ProviderError>> {
        Box::pin(async move {
            let detach = self
                .ec2
                .detach_internet_gateway()
                .internet_gateway_id(&self.gateway_id)
                .vpc_id(&self.vpc_id)
                .send()
                .await;

            match detach {
                // the call only errors while something still holds the
                // attachment
                Ok(_) => Ok(Observation::status_only(
                    AttachmentStatus::Detached.as_str(),
                )),
                Err(err) if errs::is_code(&err, errs::GATEWAY_NOT_FOUND) => {
                    Ok(Observation::absent())
                }
                Err(err) if errs::is_code(&err, errs::GATEWAY_NOT_ATTACHED) => Ok(
                    Observation::status_only(AttachmentStatus::Detached.as_str()),
                ),
                Err(err) if errs::is_code(&err, errs::DEPENDENCY_VIOLATION) => Ok(
                    Observation::status_only(AttachmentStatus::Detaching.as_str()),
                ),
                Err(err) => Err(errs::api_error("detaching internet gateway", err)),
            }
        })
    }
}

/// Watches the lifecycle state of a NAT gateway
pub struct NatGatewayStatus {
    ec2: Ec2Client,
    nat_gateway_id: String,
}

impl NatGatewayStatus {
    pub fn new(ec2: Ec2Client, nat_gateway_id: impl Into<String>) -> Self {
        Self {
            ec2,
            nat_gateway_id: nat_gateway_id.into(),
        }
    }
}

impl Probe for NatGatewayStatus {
    type Value = NatGateway;
    type Error = ProviderError;

    fn observe(&mut self) -> BoxFuture<'_, Result<Observation<NatGateway>, ProviderError>> {
        Box::pin(async move {
            let Some(gateway) = finder::find_nat_gateway(&self.ec2, &self.nat_gateway_id).await?
            else {
                return Ok(Observation::absent());
            };

            let status = match gateway.state() {
                Some(state) => state.as_str().to_owned(),
                None => return Ok(Observation::absent()),
            };
            Ok(Observation::observed(gateway, status))
        })
    }
}
