//! Internet gateway lifecycle
//!
//! Create returns before the gateway is visible to describe calls, attach
//! and detach settle asynchronously, and delete stays blocked while
//! dependents drain. Every step pairs its control-plane call with a retry or
//! wait so the handler only returns once the remote state has settled.

use std::collections::HashMap;
use std::time::Duration;

use aws_sdk_ec2::types::{AttachmentStatus, InternetGateway};

use stratus_core::provider::{ProviderError, ProviderResult};
use stratus_core::resource::{Resource, ResourceId, State, Value};
use stratus_core::retry::{self, AttemptError};
use stratus_core::waiter::WaitSpec;

use crate::{AwsProvider, errs, finder, status, tag_specification, tags_to_attribute};

const CREATE_VISIBILITY_TIMEOUT: Duration = Duration::from_secs(5 * 60);
const ATTACH_CALL_TIMEOUT: Duration = Duration::from_secs(2 * 60);
const ATTACH_WAIT_TIMEOUT: Duration = Duration::from_secs(4 * 60);
const DETACH_WAIT_TIMEOUT: Duration = Duration::from_secs(15 * 60);
const DETACH_WAIT_DELAY: Duration = Duration::from_secs(10);
const DETACH_NOT_FOUND_TOLERANCE: u32 = 30;
const DELETE_CALL_TIMEOUT: Duration = Duration::from_secs(10 * 60);

impl AwsProvider {
    pub(crate) async fn read_internet_gateway(
        &self,
        id: &ResourceId,
        gateway_id: &str,
    ) -> ProviderResult<State> {
        let gateway = finder::find_internet_gateway(self.ec2(), gateway_id)
            .await
            .map_err(|e| e.for_resource(id.clone()))?;
        let Some(gateway) = gateway else {
            return Ok(State::not_found(id.clone()));
        };
        Ok(State::existing(id.clone(), gateway_attributes(&gateway)).with_identifier(gateway_id))
    }

    pub(crate) async fn create_internet_gateway(
        &self,
        resource: &Resource,
    ) -> ProviderResult<State> {
        let mut request = self.ec2().create_internet_gateway();
        if let Some(spec) = tag_specification(resource) {
            request = request.tag_specifications(spec);
        }
        let created = request.send().await.map_err(|e| {
            errs::api_error("creating internet gateway", e).for_resource(resource.id.clone())
        })?;

        let gateway_id = created
            .internet_gateway()
            .and_then(|gateway| gateway.internet_gateway_id())
            .map(str::to_owned)
            .ok_or_else(|| {
                ProviderError::new("internet gateway created but no id returned")
                    .for_resource(resource.id.clone())
            })?;

        // a freshly created gateway is not always visible to describe calls
        // right away
        self.await_gateway_visible(&gateway_id)
            .await
            .map_err(|e| e.for_resource(resource.id.clone()))?;

        if let Some(vpc_id) = resource.string_attr("vpc_id") {
            self.attach_internet_gateway(&gateway_id, vpc_id)
                .await
                .map_err(|e| e.for_resource(resource.id.clone()))?;
        }

        self.read_internet_gateway(&resource.id, &gateway_id).await
    }

    pub(crate) async fn update_internet_gateway(
        &self,
        id: &ResourceId,
        gateway_id: &str,
        from: &State,
        to: &Resource,
    ) -> ProviderResult<State> {
        let previous = from.string_attr("vpc_id");
        let next = to.string_attr("vpc_id");
        if previous != next {
            if let Some(vpc_id) = previous {
                self.detach_internet_gateway(gateway_id, vpc_id)
                    .await
                    .map_err(|e| e.for_resource(id.clone()))?;
            }
            if let Some(vpc_id) = next {
                self.attach_internet_gateway(gateway_id, vpc_id)
                    .await
                    .map_err(|e| e.for_resource(id.clone()))?;
            }
        }
        self.read_internet_gateway(id, gateway_id).await
    }

    pub(crate) async fn delete_internet_gateway(
        &self,
        id: &ResourceId,
        gateway_id: &str,
    ) -> ProviderResult<()> {
        // detach from the VPC first when an attachment is present
        let current = finder::find_internet_gateway(self.ec2(), gateway_id)
            .await
            .map_err(|e| e.for_resource(id.clone()))?;
        if let Some(gateway) = current
            && let Some(vpc_id) = gateway.attachments().first().and_then(|a| a.vpc_id())
        {
            let vpc_id = vpc_id.to_string();
            self.detach_internet_gateway(gateway_id, &vpc_id)
                .await
                .map_err(|e| e.for_resource(id.clone()))?;
        }

        let ec2 = self.ec2();
        let deleted = retry::retry(DELETE_CALL_TIMEOUT, || {
            let ec2 = ec2.clone();
            let gateway_id = gateway_id.to_string();
            Box::pin(async move {
                let sent = ec2
                    .delete_internet_gateway()
                    .internet_gateway_id(&gateway_id)
                    .send()
                    .await;
                match sent {
                    Ok(_) => Ok(()),
                    Err(err) if errs::is_code(&err, errs::GATEWAY_NOT_FOUND) => Ok(()),
                    Err(err) if errs::is_code(&err, errs::DEPENDENCY_VIOLATION) => Err(
                        AttemptError::transient(errs::api_error("deleting internet gateway", err)),
                    ),
                    Err(err) => Err(AttemptError::permanent(errs::api_error(
                        "deleting internet gateway",
                        err,
                    ))),
                }
            })
        })
        .await;

        match deleted {
            Ok(()) => Ok(()),
            // budget exhausted, give the delete one more direct attempt
            Err(err) if err.is_timeout() => self
                .ec2()
                .delete_internet_gateway()
                .internet_gateway_id(gateway_id)
                .send()
                .await
                .map(|_| ())
                .map_err(|e| {
                    errs::api_error("deleting internet gateway", e).for_resource(id.clone())
                }),
            Err(err) => Err(err.into_inner().for_resource(id.clone())),
        }
    }

    /// Block until a freshly created gateway shows up in describe results
    async fn await_gateway_visible(&self, gateway_id: &str) -> Result<(), ProviderError> {
        let ec2 = self.ec2();
        let outcome = retry::retry(CREATE_VISIBILITY_TIMEOUT, || {
            let ec2 = ec2.clone();
            let gateway_id = gateway_id.to_string();
            Box::pin(async move {
                match finder::find_internet_gateway(&ec2, &gateway_id).await {
                    Ok(Some(gateway)) => Ok(gateway),
                    Ok(None) => Err(AttemptError::transient(
                        ProviderError::new(format!(
                            "internet gateway {gateway_id} not visible yet"
                        ))
                        .with_code(errs::GATEWAY_NOT_FOUND),
                    )),
                    Err(err) => Err(AttemptError::permanent(err)),
                }
            })
        })
        .await;

        match outcome {
            Ok(_) => Ok(()),
            // budget exhausted, give the API one more direct look
            Err(err) if err.is_timeout() => {
                match finder::find_internet_gateway(ec2, gateway_id).await? {
                    Some(_) => Ok(()),
                    None => Err(ProviderError::new(format!(
                        "internet gateway {gateway_id} was created but never became visible"
                    ))),
                }
            }
            Err(err) => Err(err.into_inner()),
        }
    }

    pub(crate) async fn attach_internet_gateway(
        &self,
        gateway_id: &str,
        vpc_id: &str,
    ) -> Result<(), ProviderError> {
        let ec2 = self.ec2();
        let attach = retry::retry(ATTACH_CALL_TIMEOUT, || {
            let ec2 = ec2.clone();
            let gateway_id = gateway_id.to_string();
            let vpc_id = vpc_id.to_string();
            Box::pin(async move {
                let sent = ec2
                    .attach_internet_gateway()
                    .internet_gateway_id(&gateway_id)
                    .vpc_id(&vpc_id)
                    .send()
                    .await;
                match sent {
                    Ok(_) => Ok(()),
                    Err(err) if errs::is_code(&err, errs::GATEWAY_NOT_FOUND) => Err(
                        AttemptError::transient(errs::api_error("attaching internet gateway", err)),
                    ),
                    Err(err) => Err(AttemptError::permanent(errs::api_error(
                        "attaching internet gateway",
                        err,
                    ))),
                }
            })
        })
        .await;

        match attach {
            Ok(()) => {}
            Err(err) if err.is_timeout() => {
                ec2.attach_internet_gateway()
                    .internet_gateway_id(gateway_id)
                    .vpc_id(vpc_id)
                    .send()
                    .await
                    .map(|_| ())
                    .map_err(|e| errs::api_error("attaching internet gateway", e))?;
            }
            Err(err) => return Err(err.into_inner()),
        }

        let mut probe = status::GatewayAttachment::new(
            ec2.clone(),
            gateway_id,
            status::GATEWAY_ATTACHMENT_SETTLED,
        );
        let spec = WaitSpec::new(ATTACH_WAIT_TIMEOUT)
            .pending([
                AttachmentStatus::Detached.as_str(),
                AttachmentStatus::Attaching.as_str(),
            ])
            .target([status::GATEWAY_ATTACHMENT_SETTLED]);
        spec.wait(&mut probe).await.map_err(|err| {
            ProviderError::new(format!(
                "waiting for internet gateway {gateway_id} to attach to {vpc_id}: {err}"
            ))
        })?;
        Ok(())
    }

    pub(crate) async fn detach_internet_gateway(
        &self,
        gateway_id: &str,
        vpc_id: &str,
    ) -> Result<(), ProviderError> {
        let mut probe = status::GatewayDetach::new(self.ec2().clone(), gateway_id, vpc_id);
        let spec = WaitSpec::new(DETACH_WAIT_TIMEOUT)
            .pending([AttachmentStatus::Detaching.as_str()])
            .target([AttachmentStatus::Detached.as_str()])
            .initial_delay(DETACH_WAIT_DELAY)
            .not_found_tolerance(DETACH_NOT_FOUND_TOLERANCE);
        spec.wait(&mut probe).await.map_err(|err| {
            ProviderError::new(format!(
                "waiting for internet gateway {gateway_id} to detach from {vpc_id}: {err}"
            ))
        })?;
        Ok(())
    }
}

fn gateway_attributes(gateway: &InternetGateway) -> HashMap<String, Value> {
    let mut attributes = HashMap::new();
    if let Some(attachment) = gateway.attachments().first()
        && let Some(vpc_id) = attachment.vpc_id()
    {
        attributes.insert("vpc_id".to_string(), Value::String(vpc_id.to_string()));
    }
    if let Some(owner_id) = gateway.owner_id() {
        attributes.insert("owner_id".to_string(), Value::String(owner_id.to_string()));
    }
    if let Some(tags) = tags_to_attribute(gateway.tags()) {
        attributes.insert("tags".to_string(), tags);
    }
    attributes
}

#[cfg(test)]
mod tests {
    use aws_sdk_ec2::types::{InternetGatewayAttachment, Tag};

    use super::*;

    #[test]
    fn gateway_attributes_capture_attachment_and_tags() {
        let gateway = InternetGateway::builder()
            .internet_gateway_id("igw-0abc")
            .owner_id("123456789012")
            .attachments(
                InternetGatewayAttachment::builder()
                    .vpc_id("vpc-0def")
                    .state(AttachmentStatus::Available)
                    .build(),
            )
            .tags(Tag::builder().key("Name").value("main").build())
            .build();

        let attributes = gateway_attributes(&gateway);
        assert_eq!(
            attributes.get("vpc_id"),
            Some(&Value::String("vpc-0def".to_string()))
        );
        assert_eq!(
            attributes.get("owner_id"),
            Some(&Value::String("123456789012".to_string()))
        );
        match attributes.get("tags") {
            Some(Value::Map(tags)) => {
                assert_eq!(tags.get("Name"), Some(&Value::String("main".to_string())));
            }
            other => panic!("expected tags map, got {other:?}"),
        }
    }

    #[test]
    fn gateway_attributes_without_attachment() {
        let gateway = InternetGateway::builder()
            .internet_gateway_id("igw-0abc")
            .build();

        let attributes = gateway_attributes(&gateway);
        assert!(!attributes.contains_key("vpc_id"));
        assert!(!attributes.contains_key("tags"));
    }
}
