//! Resource - Representing resources and their remote state

use std::collections::HashMap;

/// Unique identifier for a resource
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceId {
    /// Resource type (e.g., "internet_gateway", "nat_gateway")
    pub resource_type: String,
    /// Resource name chosen by the caller's configuration
    pub name: String,
}

impl ResourceId {
    pub fn new(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            name: name.into(),
        }
    }
}

/// Attribute value of a resource
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Int(i64),
    Bool(bool),
    List(Vec<Value>),
    Map(HashMap<String, Value>),
}

/// Desired configuration for a resource
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub id: ResourceId,
    pub attributes: HashMap<String, Value>,
}

impl Resource {
    pub fn new(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: ResourceId::new(resource_type, name),
            attributes: HashMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    /// String attribute by key, when present and a string
    pub fn string_attr(&self, key: &str) -> Option<&str> {
        match self.attributes.get(key) {
            Some(Value::String(s)) => Some(s.as_str()),
            _ => None,
        }
    }
}

/// Current state observed on the remote control plane
#[derive(Debug, Clone, PartialEq)]
pub struct State {
    pub id: ResourceId,
    /// Remote identifier (e.g., igw-xxx, nat-xxx)
    pub identifier: Option<String>,
    pub attributes: HashMap<String, Value>,
    /// Whether the resource exists remotely
    pub exists: bool,
}

impl State {
    pub fn not_found(id: ResourceId) -> Self {
        Self {
            id,
            identifier: None,
            attributes: HashMap::new(),
            exists: false,
        }
    }

    pub fn existing(id: ResourceId, attributes: HashMap<String, Value>) -> Self {
        Self {
            id,
            identifier: None,
            attributes,
            exists: true,
        }
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    /// String attribute by key, when present and a string
    pub fn string_attr(&self, key: &str) -> Option<&str> {
        match self.attributes.get(key) {
            Some(Value::String(s)) => Some(s.as_str()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_builder_collects_attributes() {
        let resource = Resource::new("internet_gateway", "main")
            .with_attribute("vpc_id", Value::String("vpc-123".to_string()));

        assert_eq!(resource.id.resource_type, "internet_gateway");
        assert_eq!(resource.string_attr("vpc_id"), Some("vpc-123"));
        assert_eq!(resource.string_attr("missing"), None);
    }

    #[test]
    fn state_not_found_has_no_identifier() {
        let state = State::not_found(ResourceId::new("nat_gateway", "egress"));
        assert!(!state.exists);
        assert!(state.identifier.is_none());
    }

    #[test]
    fn state_with_identifier() {
        let state = State::existing(ResourceId::new("internet_gateway", "main"), HashMap::new())
            .with_identifier("igw-0abc");
        assert!(state.exists);
        assert_eq!(state.identifier.as_deref(), Some("igw-0abc"));
    }

    #[test]
    fn string_attr_ignores_non_string_values() {
        let state = State::existing(ResourceId::new("internet_gateway", "main"), HashMap::new());
        assert_eq!(state.string_attr("vpc_id"), None);

        let resource = Resource::new("nat_gateway", "egress").with_attribute("port", Value::Int(443));
        assert_eq!(resource.string_attr("port"), None);
    }
}
