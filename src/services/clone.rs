//! Hostgroup cloning
//!
//! Building a clone is a pure read: it produces an owned [`HostgroupDraft`]
//! with fresh identities. Persisting the draft goes through the regular
//! create path, including validation.

use chrono::Utc;
use uuid::Uuid;

use crate::models::{
    GroupParameter, Hostgroup, HostgroupClass, HostgroupConfigGroup, HostgroupDraft, LookupValue,
};
use crate::services::tree::HostgroupTree;
use crate::utils::validation::normalize_name;

/// Deep-copy `source` into an unsaved draft named `new_name` (blank when absent)
pub fn build_clone(
    tree: &HostgroupTree,
    lookup_values: &[LookupValue],
    source: &Hostgroup,
    new_name: Option<&str>,
) -> HostgroupDraft {
    let id = Uuid::new_v4();
    let now = Utc::now();
    let name = new_name.map(normalize_name).unwrap_or_default();
    let title = tree.compose_title(source.parent_id, &name);

    let hostgroup = Hostgroup {
        id,
        name,
        parent_id: source.parent_id,
        title,
        description: source.description.clone(),
        root_pass: source.root_pass.clone(),
        associations: source.associations,
        parameters: source
            .parameters
            .iter()
            .map(|p| GroupParameter::new(id, p.name.clone(), p.value.clone()))
            .collect(),
        puppetclasses: source
            .puppetclasses
            .iter()
            .map(|c| HostgroupClass::new(id, c.puppetclass_id))
            .collect(),
        config_groups: source
            .config_groups
            .iter()
            .map(|g| HostgroupConfigGroup::new(id, g.config_group_id))
            .collect(),
        hosts_count: 0,
        created_at: now,
        updated_at: now,
    };

    let source_matcher = source.lookup_value_matcher();
    let matcher = hostgroup.lookup_value_matcher();
    let lookup_values = lookup_values
        .iter()
        .filter(|lv| lv.matcher == source_matcher)
        .map(|lv| LookupValue::new(lv.lookup_key.clone(), matcher.clone(), lv.value.clone()))
        .collect();

    tracing::debug!(source = %source.id, draft = %id, "Built hostgroup clone");

    HostgroupDraft {
        hostgroup,
        lookup_values,
    }
}
