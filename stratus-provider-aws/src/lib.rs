//! Stratus AWS Provider
//!
//! EC2 provider built on the stratus-core reconciliation engine. Each
//! lifecycle operation issues its control-plane call and then drives the
//! resource to a settled status with a retry or a wait.
//!
//! ## Module Structure
//!
//! - `registry` - Resource type definitions and static configuration
//! - `errs` - SDK error mapping and the codes used for classification
//! - `finder` - Single-resource lookups
//! - `status` - Probes that classify remote state for the waiter
//! - `internet_gateway`, `nat_gateway` - Lifecycle handlers

pub mod errs;
pub mod finder;
mod internet_gateway;
mod nat_gateway;
pub mod registry;
pub mod status;

use std::collections::HashMap;

use aws_config::Region;
use aws_sdk_ec2::Client as Ec2Client;
use aws_sdk_ec2::types::{Tag, TagSpecification};

use stratus_core::provider::{BoxFuture, Provider, ProviderError, ProviderResult, ResourceType};
use stratus_core::resource::{Resource, ResourceId, State, Value};

/// AWS Provider
pub struct AwsProvider {
    ec2_client: Ec2Client,
    region: String,
}

impl AwsProvider {
    /// Create a new AwsProvider for the specified region
    pub async fn new(region: &str) -> Self {
        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .load()
            .await;

        Self {
            ec2_client: Ec2Client::new(&config),
            region: region.to_string(),
        }
    }

    /// Create with a specific client (for testing)
    pub fn with_client(ec2_client: Ec2Client, region: String) -> Self {
        Self { ec2_client, region }
    }

    pub(crate) fn ec2(&self) -> &Ec2Client {
        &self.ec2_client
    }

    pub fn region(&self) -> &str {
        &self.region
    }
}

/// Tag specification for a create call, from the resource's `tags` attribute
pub(crate) fn tag_specification(resource: &Resource) -> Option<TagSpecification> {
    let config = registry::get_resource_config(&resource.id.resource_type)?;
    if !config.has_tags {
        return None;
    }
    let Some(Value::Map(tags)) = resource.attributes.get("tags") else {
        return None;
    };

    let mut builder = TagSpecification::builder().resource_type(config.tag_resource_type.clone());
    let mut any = false;
    for (key, value) in tags {
        if let Value::String(v) = value {
            builder = builder.tags(Tag::builder().key(key).value(v).build());
            any = true;
        }
    }
    any.then(|| builder.build())
}

/// Map remote tags into a `tags` attribute value
pub(crate) fn tags_to_attribute(tags: &[Tag]) -> Option<Value> {
    let mut map = HashMap::new();
    for tag in tags {
        if let (Some(key), Some(value)) = (tag.key(), tag.value()) {
            map.insert(key.to_string(), Value::String(value.to_string()));
        }
    }
    (!map.is_empty()).then(|| Value::Map(map))
}

fn unknown_resource_type(id: &ResourceId) -> ProviderError {
    ProviderError::new(format!("unknown resource type: {}", id.resource_type))
        .for_resource(id.clone())
}

impl Provider for AwsProvider {
    fn name(&self) -> &'static str {
        "aws"
    }

    fn resource_types(&self) -> Vec<Box<dyn ResourceType>> {
        registry::resource_types()
    }

    fn read(
        &self,
        id: &ResourceId,
        identifier: Option<&str>,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        let id = id.clone();
        let identifier = identifier.map(str::to_owned);
        Box::pin(async move {
            let Some(identifier) = identifier else {
                return Ok(State::not_found(id));
            };
            match id.resource_type.as_str() {
                "internet_gateway" => self.read_internet_gateway(&id, &identifier).await,
                "nat_gateway" => self.read_nat_gateway(&id, &identifier).await,
                _ => Err(unknown_resource_type(&id)),
            }
        })
    }

    fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        let resource = resource.clone();
        Box::pin(async move {
            match resource.id.resource_type.as_str() {
                "internet_gateway" => self.create_internet_gateway(&resource).await,
                "nat_gateway" => self.create_nat_gateway(&resource).await,
                _ => Err(unknown_resource_type(&resource.id)),
            }
        })
    }

    fn update(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        let id = id.clone();
        let identifier = identifier.to_string();
        let from = from.clone();
        let to = to.clone();
        Box::pin(async move {
            match id.resource_type.as_str() {
                "internet_gateway" => {
                    self.update_internet_gateway(&id, &identifier, &from, &to)
                        .await
                }
                "nat_gateway" => Err(ProviderError::new(
                    "nat_gateway does not support in-place updates, delete and recreate",
                )
                .for_resource(id.clone())),
                _ => Err(unknown_resource_type(&id)),
            }
        })
    }

    fn delete(&self, id: &ResourceId, identifier: &str) -> BoxFuture<'_, ProviderResult<()>> {
        let id = id.clone();
        let identifier = identifier.to_string();
        Box::pin(async move {
            match id.resource_type.as_str() {
                "internet_gateway" => self.delete_internet_gateway(&id, &identifier).await,
                "nat_gateway" => self.delete_nat_gateway(&id, &identifier).await,
                _ => Err(unknown_resource_type(&id)),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use aws_sdk_ec2::config::{BehaviorVersion, Region};
    use aws_sdk_ec2::types::ResourceType as TagResourceType;

    use super::*;

    fn test_provider() -> AwsProvider {
        let config = aws_sdk_ec2::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .build();
        AwsProvider::with_client(Ec2Client::from_conf(config), "us-east-1".to_string())
    }

    #[tokio::test]
    async fn read_without_identifier_is_not_found() {
        let provider = test_provider();
        let id = ResourceId::new("internet_gateway", "main");
        let state = provider.read(&id, None).await.unwrap();
        assert!(!state.exists);
    }

    #[tokio::test]
    async fn unknown_resource_type_is_rejected() {
        let provider = test_provider();
        let id = ResourceId::new("warp_drive", "main");
        let err = provider.read(&id, Some("wd-1")).await.unwrap_err();
        assert!(err.to_string().contains("unknown resource type"));
    }

    #[tokio::test]
    async fn nat_gateway_update_is_rejected() {
        let provider = test_provider();
        let id = ResourceId::new("nat_gateway", "egress");
        let from = State::not_found(id.clone());
        let to = Resource::new("nat_gateway", "egress");
        let err = provider.update(&id, "nat-1", &from, &to).await.unwrap_err();
        assert!(err.to_string().contains("delete and recreate"));
    }

    #[test]
    fn provider_name_and_types() {
        let provider = test_provider();
        assert_eq!(provider.name(), "aws");
        assert_eq!(provider.region(), "us-east-1");
        assert_eq!(provider.resource_types().len(), 2);
    }

    #[test]
    fn tag_specification_collects_string_tags() {
        let mut tags = HashMap::new();
        tags.insert("Name".to_string(), Value::String("main".to_string()));
        tags.insert("count".to_string(), Value::Int(3));
        let resource =
            Resource::new("internet_gateway", "main").with_attribute("tags", Value::Map(tags));

        let spec = tag_specification(&resource).unwrap();
        assert_eq!(
            spec.resource_type(),
            Some(&TagResourceType::InternetGateway)
        );
        let built = spec.tags();
        assert_eq!(built.len(), 1);
        assert_eq!(built[0].key(), Some("Name"));
        assert_eq!(built[0].value(), Some("main"));
    }

    #[test]
    fn tag_specification_absent_without_tags() {
        let resource = Resource::new("internet_gateway", "main");
        assert!(tag_specification(&resource).is_none());

        let mut tags = HashMap::new();
        tags.insert("Name".to_string(), Value::String("x".to_string()));
        let unregistered = Resource::new("warp_drive", "main").with_attribute("tags", Value::Map(tags));
        assert!(tag_specification(&unregistered).is_none());
    }

    #[test]
    fn tags_to_attribute_skips_incomplete_tags() {
        let tags = vec![
            Tag::builder().key("Name").value("main").build(),
            Tag::builder().key("orphan").build(),
        ];
        match tags_to_attribute(&tags) {
            Some(Value::Map(map)) => {
                assert_eq!(map.len(), 1);
                assert_eq!(map.get("Name"), Some(&Value::String("main".to_string())));
            }
            other => panic!("expected tags map, got {other:?}"),
        }
        assert!(tags_to_attribute(&[]).is_none());
    }
}
