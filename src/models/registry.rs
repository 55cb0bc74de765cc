//! Registry of records referenced by hostgroups
//!
//! Puppet classes, environments, config groups and smart proxies are owned by
//! other parts of the system; hostgroups only point at them. The registry is
//! loaded from the inventory file and consulted during resolution.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ReferenceKind;

/// A puppet class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Puppetclass {
    pub id: Uuid,
    pub name: String,
}

/// A puppet environment and the classes it provides
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub puppetclass_ids: BTreeSet<Uuid>,
}

/// A named bundle of puppet classes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigGroup {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub puppetclass_ids: BTreeSet<Uuid>,
}

/// Capability advertised by a smart proxy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Feature {
    #[serde(rename = "Puppet")]
    Puppet,
    #[serde(rename = "Puppet CA")]
    PuppetCa,
    #[serde(rename = "TFTP")]
    Tftp,
    #[serde(rename = "DHCP")]
    Dhcp,
    #[serde(rename = "DNS")]
    Dns,
    #[serde(rename = "Realm")]
    Realm,
    #[serde(rename = "Templates")]
    Templates,
}

impl Feature {
    pub fn display_name(self) -> &'static str {
        match self {
            Feature::Puppet => "Puppet",
            Feature::PuppetCa => "Puppet CA",
            Feature::Tftp => "TFTP",
            Feature::Dhcp => "DHCP",
            Feature::Dns => "DNS",
            Feature::Realm => "Realm",
            Feature::Templates => "Templates",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// A smart proxy and its features
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmartProxy {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub features: BTreeSet<Feature>,
}

impl SmartProxy {
    pub fn has_feature(&self, feature: Feature) -> bool {
        self.features.contains(&feature)
    }
}

/// A plain named record (domain, subnet, operating system, ...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedReference {
    pub id: Uuid,
    pub name: String,
}

/// Id/name pair used in responses
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NamedRef {
    pub id: Uuid,
    pub name: String,
}

/// In-memory index of every record hostgroups may reference
#[derive(Debug, Clone, Default)]
pub struct Registry {
    puppetclasses: BTreeMap<Uuid, Puppetclass>,
    environments: BTreeMap<Uuid, Environment>,
    config_groups: BTreeMap<Uuid, ConfigGroup>,
    smart_proxies: BTreeMap<Uuid, SmartProxy>,
    references: BTreeMap<(ReferenceKind, Uuid), NamedReference>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_puppetclass(&mut self, class: Puppetclass) {
        self.puppetclasses.insert(class.id, class);
    }

    pub fn add_environment(&mut self, environment: Environment) {
        self.environments.insert(environment.id, environment);
    }

    pub fn add_config_group(&mut self, group: ConfigGroup) {
        self.config_groups.insert(group.id, group);
    }

    pub fn add_smart_proxy(&mut self, proxy: SmartProxy) {
        self.smart_proxies.insert(proxy.id, proxy);
    }

    /// Register a plain named record. Environments and proxies have their own tables.
    pub fn add_reference(&mut self, kind: ReferenceKind, reference: NamedReference) {
        self.references.insert((kind, reference.id), reference);
    }

    pub fn puppetclass(&self, id: Uuid) -> Option<&Puppetclass> {
        self.puppetclasses.get(&id)
    }

    pub fn puppetclasses(&self) -> impl Iterator<Item = &Puppetclass> {
        self.puppetclasses.values()
    }

    pub fn puppetclass_ids(&self) -> BTreeSet<Uuid> {
        self.puppetclasses.keys().copied().collect()
    }

    pub fn environment(&self, id: Uuid) -> Option<&Environment> {
        self.environments.get(&id)
    }

    pub fn environments(&self) -> impl Iterator<Item = &Environment> {
        self.environments.values()
    }

    pub fn config_group(&self, id: Uuid) -> Option<&ConfigGroup> {
        self.config_groups.get(&id)
    }

    pub fn config_groups(&self) -> impl Iterator<Item = &ConfigGroup> {
        self.config_groups.values()
    }

    pub fn config_group_by_name(&self, name: &str) -> Option<&ConfigGroup> {
        self.config_groups.values().find(|g| g.name == name)
    }

    pub fn smart_proxy(&self, id: Uuid) -> Option<&SmartProxy> {
        self.smart_proxies.get(&id)
    }

    pub fn smart_proxies(&self) -> impl Iterator<Item = &SmartProxy> {
        self.smart_proxies.values()
    }

    /// Display name of any referenced record
    pub fn reference_name(&self, kind: ReferenceKind, id: Uuid) -> Option<&str> {
        match kind {
            ReferenceKind::Environment => self.environment(id).map(|e| e.name.as_str()),
            ReferenceKind::SmartProxy => self.smart_proxy(id).map(|p| p.name.as_str()),
            _ => self.references.get(&(kind, id)).map(|r| r.name.as_str()),
        }
    }

    /// Resolve class ids to id/name pairs sorted by name; unknown ids are skipped
    pub fn named_classes<'a>(&self, ids: impl IntoIterator<Item = &'a Uuid>) -> Vec<NamedRef> {
        let mut named: Vec<NamedRef> = ids
            .into_iter()
            .filter_map(|id| self.puppetclass(*id))
            .map(|c| NamedRef {
                id: c.id,
                name: c.name.clone(),
            })
            .collect();
        named.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        named
    }

    /// Resolve config group ids to id/name pairs sorted by name
    pub fn named_config_groups<'a>(
        &self,
        ids: impl IntoIterator<Item = &'a Uuid>,
    ) -> Vec<NamedRef> {
        let mut named: Vec<NamedRef> = ids
            .into_iter()
            .filter_map(|id| self.config_group(*id))
            .map(|g| NamedRef {
                id: g.id,
                name: g.name.clone(),
            })
            .collect();
        named.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        named
    }
}
