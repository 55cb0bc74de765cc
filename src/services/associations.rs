//! Association inheritance
//!
//! Every field listed in [`InheritedField::ALL`] resolves independently to the
//! nearest non-null value on the path from the node up to the root.

use uuid::Uuid;

use crate::models::{Hostgroup, InheritedAssociation, InheritedField, Registry, Settings};
use crate::services::tree::HostgroupTree;

/// Nearest non-null value of `field`, together with the hostgroup supplying it
pub fn inherited_with_source(
    tree: &HostgroupTree,
    node: &Hostgroup,
    field: InheritedField,
) -> Option<(Uuid, Uuid)> {
    if let Some(value) = node.associations.get(field) {
        return Some((value, node.id));
    }
    tree.ancestors(node)
        .into_iter()
        .rev()
        .find_map(|ancestor| ancestor.associations.get(field).map(|v| (v, ancestor.id)))
}

/// Effective value of `field` for `node`
pub fn inherited(tree: &HostgroupTree, node: &Hostgroup, field: InheritedField) -> Option<Uuid> {
    inherited_with_source(tree, node, field).map(|(value, _)| value)
}

/// Effective environment, used to filter class membership
pub fn effective_environment(tree: &HostgroupTree, node: &Hostgroup) -> Option<Uuid> {
    inherited(tree, node, InheritedField::Environment)
}

/// All association fields resolved at once, with display names from the registry
pub fn inherited_associations(
    tree: &HostgroupTree,
    registry: &Registry,
    node: &Hostgroup,
) -> Vec<InheritedAssociation> {
    InheritedField::ALL
        .into_iter()
        .map(|field| {
            let resolved = inherited_with_source(tree, node, field);
            let value = resolved.map(|(v, _)| v);
            let source_id = resolved.map(|(_, s)| s);
            InheritedAssociation {
                field,
                value,
                name: value
                    .and_then(|id| registry.reference_name(field.reference(), id))
                    .map(str::to_string),
                source_id,
                inherited: source_id.is_some_and(|s| s != node.id),
            }
        })
        .collect()
}

/// Effective root password: own non-blank value, then the nearest ancestor's,
/// then the global setting.
pub fn root_pass(tree: &HostgroupTree, node: &Hostgroup, settings: &Settings) -> Option<String> {
    fn non_blank(value: &Option<String>) -> Option<&str> {
        value.as_deref().filter(|v| !v.trim().is_empty())
    }

    if let Some(own) = non_blank(&node.root_pass) {
        return Some(own.to_string());
    }
    tree.ancestors(node)
        .into_iter()
        .rev()
        .find_map(|ancestor| non_blank(&ancestor.root_pass))
        .or_else(|| settings.root_pass())
        .map(str::to_string)
}
