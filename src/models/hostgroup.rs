//! Hostgroup data model

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::utils::validation::parameterize;

/// Separator used when joining ancestor names into a title
pub const TITLE_SEPARATOR: &str = "/";

/// Prefix of the lookup value matcher derived from a hostgroup title
pub const LOOKUP_MATCHER_PREFIX: &str = "hostgroup=";

/// Maximum length of a lookup value matcher (`hostgroup=<title>`)
pub const MAX_MATCHER_LENGTH: usize = 255;

/// A node in the hostgroup hierarchy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hostgroup {
    /// Unique identifier
    pub id: Uuid,

    /// Leaf name (trimmed before validation)
    pub name: String,

    /// Parent hostgroup. Not owned: a parent with children cannot be deleted.
    pub parent_id: Option<Uuid>,

    /// Materialized label, ancestor names joined by `/`
    pub title: String,

    /// Free-form description
    #[serde(default)]
    pub description: Option<String>,

    /// Root password; inherited from ancestors or settings when blank
    #[serde(default, skip_serializing)]
    pub root_pass: Option<String>,

    /// Inheritable foreign-key associations
    #[serde(default)]
    pub associations: Associations,

    /// Directly attached parameters
    #[serde(default)]
    pub parameters: Vec<GroupParameter>,

    /// Directly assigned puppet classes
    #[serde(default)]
    pub puppetclasses: Vec<HostgroupClass>,

    /// Directly assigned config groups
    #[serde(default)]
    pub config_groups: Vec<HostgroupConfigGroup>,

    /// Number of hosts assigned to this hostgroup
    #[serde(default)]
    pub hosts_count: u32,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Default for Hostgroup {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: String::new(),
            parent_id: None,
            title: String::new(),
            description: None,
            root_pass: None,
            associations: Associations::default(),
            parameters: vec![],
            puppetclasses: vec![],
            config_groups: vec![],
            hosts_count: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Hostgroup {
    /// Create a root hostgroup
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            title: name.clone(),
            name,
            ..Default::default()
        }
    }

    /// Create a hostgroup below `parent_id`. The title is fixed up by the tree on insert.
    pub fn with_parent(name: impl Into<String>, parent_id: Uuid) -> Self {
        Self {
            parent_id: Some(parent_id),
            ..Self::new(name)
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Matcher string used by lookup values overriding this hostgroup
    pub fn lookup_value_matcher(&self) -> String {
        format!("{}{}", LOOKUP_MATCHER_PREFIX, self.title)
    }

    /// External path token: `{id}-{parameterized title}`
    pub fn to_param(&self) -> String {
        let slug = parameterize(&self.title);
        if slug.is_empty() {
            self.id.to_string()
        } else {
            format!("{}-{}", self.id, slug)
        }
    }

    pub fn parameter(&self, name: &str) -> Option<&GroupParameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Set a parameter value, creating the parameter if needed
    pub fn set_parameter(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.parameters.iter_mut().find(|p| p.name == name) {
            Some(existing) => existing.value = value,
            None => self
                .parameters
                .push(GroupParameter::new(self.id, name, value)),
        }
    }

    /// Remove a parameter by name, returning whether it existed
    pub fn remove_parameter(&mut self, name: &str) -> bool {
        let before = self.parameters.len();
        self.parameters.retain(|p| p.name != name);
        self.parameters.len() != before
    }

    pub fn puppetclass_ids(&self) -> BTreeSet<Uuid> {
        self.puppetclasses.iter().map(|c| c.puppetclass_id).collect()
    }

    pub fn config_group_ids(&self) -> BTreeSet<Uuid> {
        self.config_groups.iter().map(|g| g.config_group_id).collect()
    }

    /// Assign a puppet class; returns false when already assigned
    pub fn assign_puppetclass(&mut self, puppetclass_id: Uuid) -> bool {
        if self.puppetclasses.iter().any(|c| c.puppetclass_id == puppetclass_id) {
            return false;
        }
        self.puppetclasses
            .push(HostgroupClass::new(self.id, puppetclass_id));
        true
    }

    pub fn remove_puppetclass(&mut self, puppetclass_id: Uuid) -> bool {
        let before = self.puppetclasses.len();
        self.puppetclasses.retain(|c| c.puppetclass_id != puppetclass_id);
        self.puppetclasses.len() != before
    }

    /// Replace the directly assigned classes, keeping join ids of retained links
    pub fn set_puppetclasses(&mut self, ids: impl IntoIterator<Item = Uuid>) {
        let wanted: BTreeSet<Uuid> = ids.into_iter().collect();
        self.puppetclasses.retain(|c| wanted.contains(&c.puppetclass_id));
        for id in wanted {
            self.assign_puppetclass(id);
        }
    }

    /// Assign a config group; returns false when already assigned
    pub fn assign_config_group(&mut self, config_group_id: Uuid) -> bool {
        if self
            .config_groups
            .iter()
            .any(|g| g.config_group_id == config_group_id)
        {
            return false;
        }
        self.config_groups
            .push(HostgroupConfigGroup::new(self.id, config_group_id));
        true
    }

    pub fn remove_config_group(&mut self, config_group_id: Uuid) -> bool {
        let before = self.config_groups.len();
        self.config_groups
            .retain(|g| g.config_group_id != config_group_id);
        self.config_groups.len() != before
    }

    /// Replace the directly assigned config groups, keeping join ids of retained links
    pub fn set_config_groups(&mut self, ids: impl IntoIterator<Item = Uuid>) {
        let wanted: BTreeSet<Uuid> = ids.into_iter().collect();
        self.config_groups
            .retain(|g| wanted.contains(&g.config_group_id));
        for id in wanted {
            self.assign_config_group(id);
        }
    }
}

/// Key/value parameter attached to a single hostgroup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupParameter {
    pub id: Uuid,
    pub hostgroup_id: Uuid,
    pub name: String,
    pub value: String,
}

impl GroupParameter {
    pub fn new(hostgroup_id: Uuid, name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            hostgroup_id,
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Link between a hostgroup and a puppet class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostgroupClass {
    pub id: Uuid,
    pub hostgroup_id: Uuid,
    pub puppetclass_id: Uuid,
}

impl HostgroupClass {
    pub fn new(hostgroup_id: Uuid, puppetclass_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            hostgroup_id,
            puppetclass_id,
        }
    }
}

/// Link between a hostgroup and a config group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostgroupConfigGroup {
    pub id: Uuid,
    pub hostgroup_id: Uuid,
    pub config_group_id: Uuid,
}

impl HostgroupConfigGroup {
    pub fn new(hostgroup_id: Uuid, config_group_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            hostgroup_id,
            config_group_id,
        }
    }
}

/// Inheritable association fields of a hostgroup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InheritedField {
    ComputeProfile,
    Environment,
    Domain,
    PuppetProxy,
    PuppetCaProxy,
    Operatingsystem,
    Architecture,
    Medium,
    Ptable,
    Subnet,
}

/// Kind of record an inherited field points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    ComputeProfile,
    Environment,
    Domain,
    SmartProxy,
    Operatingsystem,
    Architecture,
    Medium,
    Ptable,
    Subnet,
}

impl InheritedField {
    pub const ALL: [InheritedField; 10] = [
        InheritedField::ComputeProfile,
        InheritedField::Environment,
        InheritedField::Domain,
        InheritedField::PuppetProxy,
        InheritedField::PuppetCaProxy,
        InheritedField::Operatingsystem,
        InheritedField::Architecture,
        InheritedField::Medium,
        InheritedField::Ptable,
        InheritedField::Subnet,
    ];

    /// Column / attribute name of the field
    pub fn column(self) -> &'static str {
        match self {
            InheritedField::ComputeProfile => "compute_profile_id",
            InheritedField::Environment => "environment_id",
            InheritedField::Domain => "domain_id",
            InheritedField::PuppetProxy => "puppet_proxy_id",
            InheritedField::PuppetCaProxy => "puppet_ca_proxy_id",
            InheritedField::Operatingsystem => "operatingsystem_id",
            InheritedField::Architecture => "architecture_id",
            InheritedField::Medium => "medium_id",
            InheritedField::Ptable => "ptable_id",
            InheritedField::Subnet => "subnet_id",
        }
    }

    pub fn from_column(column: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.column() == column)
    }

    pub fn reference(self) -> ReferenceKind {
        match self {
            InheritedField::ComputeProfile => ReferenceKind::ComputeProfile,
            InheritedField::Environment => ReferenceKind::Environment,
            InheritedField::Domain => ReferenceKind::Domain,
            InheritedField::PuppetProxy | InheritedField::PuppetCaProxy => {
                ReferenceKind::SmartProxy
            }
            InheritedField::Operatingsystem => ReferenceKind::Operatingsystem,
            InheritedField::Architecture => ReferenceKind::Architecture,
            InheritedField::Medium => ReferenceKind::Medium,
            InheritedField::Ptable => ReferenceKind::Ptable,
            InheritedField::Subnet => ReferenceKind::Subnet,
        }
    }
}

/// Nullable foreign keys resolved through the ancestor chain
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Associations {
    #[serde(default)]
    pub compute_profile_id: Option<Uuid>,
    #[serde(default)]
    pub environment_id: Option<Uuid>,
    #[serde(default)]
    pub domain_id: Option<Uuid>,
    #[serde(default)]
    pub puppet_proxy_id: Option<Uuid>,
    #[serde(default)]
    pub puppet_ca_proxy_id: Option<Uuid>,
    #[serde(default)]
    pub operatingsystem_id: Option<Uuid>,
    #[serde(default)]
    pub architecture_id: Option<Uuid>,
    #[serde(default)]
    pub medium_id: Option<Uuid>,
    #[serde(default)]
    pub ptable_id: Option<Uuid>,
    #[serde(default)]
    pub subnet_id: Option<Uuid>,
}

impl Associations {
    pub fn get(&self, field: InheritedField) -> Option<Uuid> {
        match field {
            InheritedField::ComputeProfile => self.compute_profile_id,
            InheritedField::Environment => self.environment_id,
            InheritedField::Domain => self.domain_id,
            InheritedField::PuppetProxy => self.puppet_proxy_id,
            InheritedField::PuppetCaProxy => self.puppet_ca_proxy_id,
            InheritedField::Operatingsystem => self.operatingsystem_id,
            InheritedField::Architecture => self.architecture_id,
            InheritedField::Medium => self.medium_id,
            InheritedField::Ptable => self.ptable_id,
            InheritedField::Subnet => self.subnet_id,
        }
    }

    pub fn set(&mut self, field: InheritedField, value: Option<Uuid>) {
        let slot = match field {
            InheritedField::ComputeProfile => &mut self.compute_profile_id,
            InheritedField::Environment => &mut self.environment_id,
            InheritedField::Domain => &mut self.domain_id,
            InheritedField::PuppetProxy => &mut self.puppet_proxy_id,
            InheritedField::PuppetCaProxy => &mut self.puppet_ca_proxy_id,
            InheritedField::Operatingsystem => &mut self.operatingsystem_id,
            InheritedField::Architecture => &mut self.architecture_id,
            InheritedField::Medium => &mut self.medium_id,
            InheritedField::Ptable => &mut self.ptable_id,
            InheritedField::Subnet => &mut self.subnet_id,
        };
        *slot = value;
    }

    /// Iterate `(field, value)` pairs in descriptor order
    pub fn iter(&self) -> impl Iterator<Item = (InheritedField, Option<Uuid>)> + '_ {
        InheritedField::ALL.into_iter().map(move |f| (f, self.get(f)))
    }
}

/// Parameter name/value pair in requests
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ParameterInput {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub value: String,
}

/// Request to create a hostgroup
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct CreateHostgroupRequest {
    #[validate(length(max = 255))]
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
    #[serde(default)]
    #[validate(length(max = 1024))]
    pub description: Option<String>,
    #[serde(default)]
    pub root_pass: Option<String>,
    #[serde(default)]
    pub associations: Associations,
    #[serde(default)]
    pub parameters: Vec<ParameterInput>,
    #[serde(default)]
    pub puppetclass_ids: Vec<Uuid>,
    #[serde(default)]
    pub config_group_ids: Vec<Uuid>,
}

/// Request to update a hostgroup.
///
/// `parent_id`, `description` and `root_pass` distinguish "absent" from an explicit `null`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateHostgroupRequest {
    #[serde(default)]
    #[validate(length(max = 255))]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub parent_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "present")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub root_pass: Option<Option<String>>,
    #[serde(default)]
    pub associations: Option<Associations>,
}

/// Request to clone a hostgroup
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct CloneHostgroupRequest {
    #[serde(default)]
    #[validate(length(max = 255))]
    pub name: Option<String>,
}

/// Request to set a parameter value
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetParameterRequest {
    pub value: String,
}

/// Request replacing the directly assigned classes or config groups
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SetMembershipRequest {
    #[serde(default)]
    pub ids: Vec<Uuid>,
}

fn present<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}
