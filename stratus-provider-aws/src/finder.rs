//! Finders - single-resource lookups against the EC2 API
//!
//! Each finder returns `Ok(None)` when the resource does not exist, so
//! lifecycle handlers and probes can tell absence apart from a failed call.

use aws_sdk_ec2::Client as Ec2Client;
use aws_sdk_ec2::types::{InternetGateway, NatGateway};
use stratus_core::provider::ProviderError;

use crate::errs;

pub async fn find_internet_gateway(
    ec2: &Ec2Client,
    gateway_id: &str,
) -> Result<Option<InternetGateway>, ProviderError> {
    let describe = ec2
        .describe_internet_gateways()
        .internet_gateway_ids(gateway_id)
        .send()
        .await;

    match describe {
        Ok(output) => Ok(output.internet_gateways().first().cloned()),
        Err(err) if errs::is_code(&err, errs::GATEWAY_NOT_FOUND) => Ok(None),
        Err(err) => Err(errs::api_error("describing internet gateway", err)),
    }
}

pub async fn find_nat_gateway(
    ec2: &Ec2Client,
    nat_gateway_id: &str,
) -> Result<Option<NatGateway>, ProviderError> {
    let describe = ec2
        .describe_nat_gateways()
        .nat_gateway_ids(nat_gateway_id)
        .send()
        .await;

    match describe {
        Ok(output) => Ok(output.nat_gateways().first().cloned()),
        Err(err) if errs::is_code(&err, errs::NAT_GATEWAY_NOT_FOUND) => Ok(None),
        Err(err) => Err(errs::api_error("describing nat gateway", err)),
    }
}
