//! Resolved views returned to API consumers

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Hostgroup, InheritedField, LookupValue, NamedRef};

/// Effective parameter together with the hostgroup that supplied it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedParameter {
    pub name: String,
    pub value: String,
    pub source_id: Uuid,
    pub source_title: String,
    /// True when the value comes from an ancestor
    pub inherited: bool,
}

/// Effective value of one association field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InheritedAssociation {
    pub field: InheritedField,
    pub value: Option<Uuid>,
    /// Display name of the referenced record, when known
    pub name: Option<String>,
    /// Hostgroup supplying the value
    pub source_id: Option<Uuid>,
    pub inherited: bool,
}

/// Class and config group membership of a hostgroup
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassMembership {
    pub environment_id: Option<Uuid>,
    pub classes: Vec<NamedRef>,
    pub individual_classes: Vec<NamedRef>,
    pub classes_in_groups: Vec<NamedRef>,
    pub parent_classes: Vec<NamedRef>,
    pub all_classes: Vec<NamedRef>,
    pub available_classes: Vec<NamedRef>,
    pub config_groups: Vec<NamedRef>,
    pub parent_config_groups: Vec<NamedRef>,
}

/// Boolean classification of a parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterFlags {
    pub name: String,
    pub value: Option<String>,
    pub truthy: bool,
    pub falsy: bool,
}

/// List entry for a hostgroup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostgroupSummary {
    pub id: Uuid,
    pub name: String,
    pub title: String,
    pub parent_id: Option<Uuid>,
    pub to_param: String,
    pub hosts_count: u32,
    pub children_hosts_count: u64,
}

/// Full resolved view of a hostgroup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostgroupDetail {
    pub hostgroup: Hostgroup,
    pub to_param: String,
    pub ancestors: Vec<NamedRef>,
    pub parameters: Vec<ResolvedParameter>,
    pub associations: Vec<InheritedAssociation>,
    pub lookup_values: Vec<LookupValue>,
    /// Whether a root password resolves for this hostgroup (the value is never returned)
    pub root_pass_resolved: bool,
    pub children_hosts_count: u64,
}

/// Unsaved hostgroup produced by the clone engine or from a create request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostgroupDraft {
    pub hostgroup: Hostgroup,
    #[serde(default)]
    pub lookup_values: Vec<LookupValue>,
}

impl HostgroupDraft {
    pub fn new(hostgroup: Hostgroup) -> Self {
        Self {
            hostgroup,
            lookup_values: vec![],
        }
    }
}

/// Structural consistency of the loaded hostgroup tree
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeIntegrity {
    pub hostgroups: usize,
    pub roots: usize,
    /// Rows whose parent was missing at load, now treated as roots
    pub reattached: Vec<Uuid>,
    /// Rows whose parent chain loops and never reaches a root
    pub unreachable: Vec<Uuid>,
    pub duplicate_titles: Vec<String>,
}

impl TreeIntegrity {
    /// Reattached rows are repaired at load and do not count against consistency
    pub fn is_consistent(&self) -> bool {
        self.unreachable.is_empty() && self.duplicate_titles.is_empty()
    }
}
