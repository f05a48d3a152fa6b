//! Resource type registry
//!
//! An immutable table from resource-type name to its static configuration,
//! consulted by the provider's dispatch layer.

use aws_sdk_ec2::types::ResourceType as TagResourceType;
use stratus_core::provider::ResourceType;

macro_rules! define_resource_type {
    ($name:ident, $type_name:expr) => {
        pub struct $name;
        impl ResourceType for $name {
            fn name(&self) -> &'static str {
                $type_name
            }
        }
    };
}

define_resource_type!(InternetGatewayType, "internet_gateway");
define_resource_type!(NatGatewayType, "nat_gateway");

/// Returns all resource types supported by this provider
pub fn resource_types() -> Vec<Box<dyn ResourceType>> {
    vec![Box::new(InternetGatewayType), Box::new(NatGatewayType)]
}

/// Static configuration for one resource type
pub struct ResourceConfig {
    /// Resource type name
    pub resource_type: &'static str,
    /// Tag-specification resource type used at create time
    pub tag_resource_type: TagResourceType,
    /// Whether this resource type carries tags
    pub has_tags: bool,
}

pub const INTERNET_GATEWAY_CONFIG: ResourceConfig = ResourceConfig {
    resource_type: "internet_gateway",
    tag_resource_type: TagResourceType::InternetGateway,
    has_tags: true,
};

pub const NAT_GATEWAY_CONFIG: ResourceConfig = ResourceConfig {
    resource_type: "nat_gateway",
    tag_resource_type: TagResourceType::Natgateway,
    has_tags: true,
};

/// Get resource configuration by type name
pub fn get_resource_config(resource_type: &str) -> Option<&'static ResourceConfig> {
    match resource_type {
        "internet_gateway" => Some(&INTERNET_GATEWAY_CONFIG),
        "nat_gateway" => Some(&NAT_GATEWAY_CONFIG),
        _ => None,
    }
}
