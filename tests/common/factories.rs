//! Test factories for generating test data
//!
//! Factories create unique test data, useful when a test needs several
//! hostgroups whose names must not collide.

use std::sync::atomic::{AtomicU64, Ordering};

use uuid::Uuid;

use openvox_hostgroups::models::{CreateHostgroupRequest, ParameterInput};

/// Factory for creating hostgroup requests
pub struct HostgroupFactory {
    counter: AtomicU64,
}

impl Default for HostgroupFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl HostgroupFactory {
    pub fn new() -> Self {
        Self {
            counter: AtomicU64::new(0),
        }
    }

    /// Start a uniquely named hostgroup request
    pub fn create(&self) -> HostgroupBuilder {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        HostgroupBuilder {
            req: CreateHostgroupRequest {
                name: format!("hostgroup_{}", n),
                ..Default::default()
            },
        }
    }
}

/// Builder for hostgroup requests
pub struct HostgroupBuilder {
    req: CreateHostgroupRequest,
}

impl HostgroupBuilder {
    pub fn with_name(mut self, name: &str) -> Self {
        self.req.name = name.to_string();
        self
    }

    pub fn with_parent(mut self, parent_id: Uuid) -> Self {
        self.req.parent_id = Some(parent_id);
        self
    }

    pub fn with_parameter(mut self, name: &str, value: &str) -> Self {
        self.req.parameters.push(ParameterInput {
            name: name.to_string(),
            value: value.to_string(),
        });
        self
    }

    pub fn with_environment(mut self, environment_id: Uuid) -> Self {
        self.req.associations.environment_id = Some(environment_id);
        self
    }

    pub fn with_puppetclasses(mut self, ids: &[Uuid]) -> Self {
        self.req.puppetclass_ids = ids.to_vec();
        self
    }

    pub fn with_config_groups(mut self, ids: &[Uuid]) -> Self {
        self.req.config_group_ids = ids.to_vec();
        self
    }

    pub fn build(self) -> CreateHostgroupRequest {
        self.req
    }

    /// JSON body for `POST /api/v1/hostgroups`
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.req).expect("Failed to serialize hostgroup request")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_generates_unique_names() {
        let factory = HostgroupFactory::new();
        let first = factory.create().build();
        let second = factory.create().build();
        assert_ne!(first.name, second.name);
    }
}
