//! NAT gateway lifecycle
//!
//! A NAT gateway takes minutes to provision and can land in a terminal
//! `failed` state on its own. Deletion settles through `deleting` into
//! `deleted`, or drops out of describe results entirely.

use std::collections::HashMap;
use std::time::Duration;

use aws_sdk_ec2::types::{ConnectivityType, NatGateway, NatGatewayState};

use stratus_core::provider::{ProviderError, ProviderResult};
use stratus_core::resource::{Resource, ResourceId, State, Value};
use stratus_core::waiter::{WaitError, WaitSpec};

use crate::{AwsProvider, errs, finder, status, tag_specification, tags_to_attribute};

const CREATE_WAIT_TIMEOUT: Duration = Duration::from_secs(10 * 60);
const DELETE_WAIT_TIMEOUT: Duration = Duration::from_secs(30 * 60);
const NAT_POLL_INTERVAL: Duration = Duration::from_secs(10);

impl AwsProvider {
    pub(crate) async fn read_nat_gateway(
        &self,
        id: &ResourceId,
        nat_gateway_id: &str,
    ) -> ProviderResult<State> {
        let gateway = finder::find_nat_gateway(self.ec2(), nat_gateway_id)
            .await
            .map_err(|e| e.for_resource(id.clone()))?;
        let Some(gateway) = gateway else {
            return Ok(State::not_found(id.clone()));
        };
        // a deleted NAT gateway stays visible in describe results for a while
        if matches!(gateway.state(), Some(NatGatewayState::Deleted)) {
            return Ok(State::not_found(id.clone()));
        }
        Ok(
            State::existing(id.clone(), nat_gateway_attributes(&gateway))
                .with_identifier(nat_gateway_id),
        )
    }

    pub(crate) async fn create_nat_gateway(&self, resource: &Resource) -> ProviderResult<State> {
        let subnet_id = resource.string_attr("subnet_id").ok_or_else(|| {
            ProviderError::new("nat gateway requires a subnet_id").for_resource(resource.id.clone())
        })?;

        let mut request = self.ec2().create_nat_gateway().subnet_id(subnet_id);
        if let Some(allocation_id) = resource.string_attr("allocation_id") {
            request = request.allocation_id(allocation_id);
        }
        if let Some(connectivity) = resource.string_attr("connectivity_type") {
            request = request.connectivity_type(ConnectivityType::from(connectivity));
        }
        if let Some(spec) = tag_specification(resource) {
            request = request.tag_specifications(spec);
        }

        let created = request.send().await.map_err(|e| {
            errs::api_error("creating nat gateway", e).for_resource(resource.id.clone())
        })?;

        let nat_gateway_id = created
            .nat_gateway()
            .and_then(|gateway| gateway.nat_gateway_id())
            .map(str::to_owned)
            .ok_or_else(|| {
                ProviderError::new("nat gateway created but no id returned")
                    .for_resource(resource.id.clone())
            })?;

        self.await_nat_gateway_available(&nat_gateway_id)
            .await
            .map_err(|e| e.for_resource(resource.id.clone()))?;

        self.read_nat_gateway(&resource.id, &nat_gateway_id).await
    }

    async fn await_nat_gateway_available(&self, nat_gateway_id: &str) -> Result<(), ProviderError> {
        let mut probe = status::NatGatewayStatus::new(self.ec2().clone(), nat_gateway_id);
        let spec = WaitSpec::new(CREATE_WAIT_TIMEOUT)
            .pending([NatGatewayState::Pending.as_str()])
            .target([NatGatewayState::Available.as_str()])
            .poll_interval(NAT_POLL_INTERVAL);

        match spec.wait(&mut probe).await {
            Ok(_) => Ok(()),
            Err(WaitError::Unexpected { value, status }) => {
                let detail = value
                    .and_then(|gateway| gateway.failure_message().map(str::to_owned))
                    .map(|message| format!(": {message}"))
                    .unwrap_or_default();
                Err(ProviderError::new(format!(
                    "nat gateway {nat_gateway_id} entered state {status:?}{detail}"
                )))
            }
            Err(err) => Err(ProviderError::new(format!(
                "nat gateway {nat_gateway_id} did not become available: {err}"
            ))),
        }
    }

    pub(crate) async fn delete_nat_gateway(
        &self,
        id: &ResourceId,
        nat_gateway_id: &str,
    ) -> ProviderResult<()> {
        let deleted = self
            .ec2()
            .delete_nat_gateway()
            .nat_gateway_id(nat_gateway_id)
            .send()
            .await;
        if let Err(err) = deleted {
            if errs::is_code(&err, errs::NAT_GATEWAY_NOT_FOUND) {
                return Ok(());
            }
            return Err(errs::api_error("deleting nat gateway", err).for_resource(id.clone()));
        }

        let mut probe = status::NatGatewayStatus::new(self.ec2().clone(), nat_gateway_id);
        let spec = WaitSpec::new(DELETE_WAIT_TIMEOUT)
            .pending([NatGatewayState::Deleting.as_str()])
            .target([NatGatewayState::Deleted.as_str()])
            .poll_interval(NAT_POLL_INTERVAL);

        match spec.wait(&mut probe).await {
            Ok(_) => Ok(()),
            // dropping out of describe results is deletion too
            Err(WaitError::Vanished { .. }) => Ok(()),
            Err(err) if err.is_timeout() => Err(ProviderError::new(format!(
                "nat gateway {nat_gateway_id} still exists: {err}"
            ))
            .for_resource(id.clone())),
            Err(err) => Err(ProviderError::new(format!(
                "waiting for nat gateway {nat_gateway_id} to delete: {err}"
            ))
            .for_resource(id.clone())),
        }
    }
}

fn nat_gateway_attributes(gateway: &NatGateway) -> HashMap<String, Value> {
    let mut attributes = HashMap::new();
    if let Some(subnet_id) = gateway.subnet_id() {
        attributes.insert("subnet_id".to_string(), Value::String(subnet_id.to_string()));
    }
    if let Some(allocation_id) = gateway
        .nat_gateway_addresses()
        .first()
        .and_then(|address| address.allocation_id())
    {
        attributes.insert(
            "allocation_id".to_string(),
            Value::String(allocation_id.to_string()),
        );
    }
    if let Some(connectivity) = gateway.connectivity_type() {
        attributes.insert(
            "connectivity_type".to_string(),
            Value::String(connectivity.as_str().to_string()),
        );
    }
    if let Some(tags) = tags_to_attribute(gateway.tags()) {
        attributes.insert("tags".to_string(), tags);
    }
    attributes
}

#[cfg(test)]
mod tests {
    use aws_sdk_ec2::types::{NatGatewayAddress, Tag};

    use super::*;

    #[test]
    fn nat_gateway_attributes_capture_addresses_and_connectivity() {
        let gateway = NatGateway::builder()
            .nat_gateway_id("nat-0abc")
            .subnet_id("subnet-0def")
            .connectivity_type(ConnectivityType::Public)
            .nat_gateway_addresses(
                NatGatewayAddress::builder()
                    .allocation_id("eipalloc-0123")
                    .build(),
            )
            .tags(Tag::builder().key("Name").value("egress").build())
            .build();

        let attributes = nat_gateway_attributes(&gateway);
        assert_eq!(
            attributes.get("subnet_id"),
            Some(&Value::String("subnet-0def".to_string()))
        );
        assert_eq!(
            attributes.get("allocation_id"),
            Some(&Value::String("eipalloc-0123".to_string()))
        );
        assert_eq!(
            attributes.get("connectivity_type"),
            Some(&Value::String("public".to_string()))
        );
    }

    #[test]
    fn nat_gateway_attributes_without_addresses() {
        let gateway = NatGateway::builder().nat_gateway_id("nat-0abc").build();
        let attributes = nat_gateway_attributes(&gateway);
        assert!(!attributes.contains_key("allocation_id"));
        assert!(!attributes.contains_key("connectivity_type"));
    }
}
