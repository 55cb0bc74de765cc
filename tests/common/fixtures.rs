//! Test fixtures for common test data
//!
//! Fixtures provide pre-defined test data that can be used across multiple tests.

use std::collections::BTreeMap;

use openvox_hostgroups::config::InventoryConfig;
use openvox_hostgroups::models::{CreateHostgroupRequest, ParameterInput, ROOT_PASS_SETTING};

/// Fixed UUIDs for testing (reproducible tests)
pub mod ids {
    use uuid::Uuid;

    pub const BASE: Uuid = Uuid::from_u128(0x01);
    pub const CHKMK: Uuid = Uuid::from_u128(0x02);
    pub const NAGIOS: Uuid = Uuid::from_u128(0x03);
    pub const VIM: Uuid = Uuid::from_u128(0x04);
    pub const GIT: Uuid = Uuid::from_u128(0x05);

    pub const PRODUCTION: Uuid = Uuid::from_u128(0x10);
    pub const TESTING: Uuid = Uuid::from_u128(0x11);

    pub const MONITORING: Uuid = Uuid::from_u128(0x20);
    pub const EDITORS: Uuid = Uuid::from_u128(0x21);

    pub const PUPPET_PROXY: Uuid = Uuid::from_u128(0x30);
    pub const TFTP_PROXY: Uuid = Uuid::from_u128(0x31);

    pub const EXAMPLE_DOMAIN: Uuid = Uuid::from_u128(0x40);
    pub const LAB_DOMAIN: Uuid = Uuid::from_u128(0x41);
}

/// Global root password seeded into settings
pub const DEFAULT_ROOT_PASS: &str = "settings-secret";

/// Inventory shared by integration tests and cucumber scenarios
pub const INVENTORY_YAML: &str = r#"
puppetclasses:
  - { id: "00000000-0000-0000-0000-000000000001", name: "base" }
  - { id: "00000000-0000-0000-0000-000000000002", name: "chkmk" }
  - { id: "00000000-0000-0000-0000-000000000003", name: "nagios" }
  - { id: "00000000-0000-0000-0000-000000000004", name: "vim" }
  - { id: "00000000-0000-0000-0000-000000000005", name: "git" }
environments:
  - id: "00000000-0000-0000-0000-000000000010"
    name: "production"
    puppetclasses: ["base", "chkmk", "nagios", "vim"]
  - id: "00000000-0000-0000-0000-000000000011"
    name: "testing"
    puppetclasses: ["base", "git", "nagios"]
config_groups:
  - id: "00000000-0000-0000-0000-000000000020"
    name: "monitoring"
    puppetclasses: ["nagios", "chkmk"]
  - id: "00000000-0000-0000-0000-000000000021"
    name: "editors"
    puppetclasses: ["vim", "git"]
smart_proxies:
  - id: "00000000-0000-0000-0000-000000000030"
    name: "puppet.example.com"
    url: "https://puppet.example.com:8443"
    features: ["Puppet", "Puppet CA"]
  - id: "00000000-0000-0000-0000-000000000031"
    name: "tftp.example.com"
    features: ["TFTP"]
references:
  domains:
    - { id: "00000000-0000-0000-0000-000000000040", name: "example.com" }
    - { id: "00000000-0000-0000-0000-000000000041", name: "lab.example.com" }
lookup_values:
  - lookup_key: "ntp::servers"
    match: "hostgroup=Common"
    value: "pool.ntp.org"
  - lookup_key: "motd::banner"
    match: "hostgroup=Common/Web"
    value: "web tier"
"#;

/// Parse the shared inventory
pub fn test_inventory() -> InventoryConfig {
    serde_norway::from_str(INVENTORY_YAML).expect("Failed to parse test inventory")
}

/// Settings seeded at startup
pub fn test_settings() -> BTreeMap<String, String> {
    BTreeMap::from([(ROOT_PASS_SETTING.to_string(), DEFAULT_ROOT_PASS.to_string())])
}

/// Hostgroup request fixtures
pub struct HostgroupFixtures;

impl HostgroupFixtures {
    /// Top-level group in production with a domain, a puppet proxy and two parameters
    pub fn common() -> CreateHostgroupRequest {
        let mut req = CreateHostgroupRequest {
            name: "Common".to_string(),
            root_pass: Some("common-secret".to_string()),
            puppetclass_ids: vec![ids::BASE],
            config_group_ids: vec![ids::MONITORING],
            parameters: vec![
                ParameterInput {
                    name: "ntp_server".to_string(),
                    value: "pool.ntp.org".to_string(),
                },
                ParameterInput {
                    name: "monitoring".to_string(),
                    value: "yes".to_string(),
                },
            ],
            ..Default::default()
        };
        req.associations.environment_id = Some(ids::PRODUCTION);
        req.associations.domain_id = Some(ids::EXAMPLE_DOMAIN);
        req.associations.puppet_proxy_id = Some(ids::PUPPET_PROXY);
        req
    }

    /// Bare child request
    pub fn child(name: &str, parent_id: uuid::Uuid) -> CreateHostgroupRequest {
        CreateHostgroupRequest {
            name: name.to_string(),
            parent_id: Some(parent_id),
            ..Default::default()
        }
    }
}
