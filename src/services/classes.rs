//! Puppet class and config group membership
//!
//! Membership is evaluated against the effective environment of the node:
//! classes contributed by config groups only count when the environment
//! provides them.

use std::collections::BTreeSet;

use uuid::Uuid;

use crate::models::{ClassMembership, Hostgroup, Registry};
use crate::services::associations::effective_environment;
use crate::services::tree::HostgroupTree;

/// Classes provided by an environment; an unknown environment provides none
fn environment_classes(registry: &Registry, environment_id: Uuid) -> BTreeSet<Uuid> {
    registry
        .environment(environment_id)
        .map(|env| env.puppetclass_ids.clone())
        .unwrap_or_default()
}

/// Classes of the given config groups, unfiltered
fn config_group_classes(registry: &Registry, group_ids: &BTreeSet<Uuid>) -> BTreeSet<Uuid> {
    group_ids
        .iter()
        .filter_map(|id| registry.config_group(*id))
        .flat_map(|group| group.puppetclass_ids.iter().copied())
        .collect()
}

/// Classes contributed by the node's own config groups that its environment provides.
///
/// Without an effective environment no group class is considered available.
pub fn classes_in_groups(
    tree: &HostgroupTree,
    registry: &Registry,
    node: &Hostgroup,
) -> BTreeSet<Uuid> {
    let Some(environment_id) = effective_environment(tree, node) else {
        return BTreeSet::new();
    };
    let available = environment_classes(registry, environment_id);
    config_group_classes(registry, &node.config_group_ids())
        .intersection(&available)
        .copied()
        .collect()
}

/// Directly assigned classes not already contributed by a config group
pub fn individual_classes(
    tree: &HostgroupTree,
    registry: &Registry,
    node: &Hostgroup,
) -> BTreeSet<Uuid> {
    let in_groups = classes_in_groups(tree, registry, node);
    node.puppetclass_ids()
        .difference(&in_groups)
        .copied()
        .collect()
}

pub fn classes(tree: &HostgroupTree, registry: &Registry, node: &Hostgroup) -> BTreeSet<Uuid> {
    let mut all = individual_classes(tree, registry, node);
    all.extend(classes_in_groups(tree, registry, node));
    all
}

/// Direct and config group classes over the whole path of `node`, restricted
/// to the classes of `environment_id` when one is given.
pub fn all_classes(
    tree: &HostgroupTree,
    registry: &Registry,
    node: &Hostgroup,
    environment_id: Option<Uuid>,
) -> BTreeSet<Uuid> {
    let mut collected = BTreeSet::new();
    for level in tree.path(node) {
        collected.extend(level.puppetclass_ids());
        collected.extend(config_group_classes(registry, &level.config_group_ids()));
    }
    match environment_id {
        Some(env) => {
            let available = environment_classes(registry, env);
            collected.intersection(&available).copied().collect()
        }
        None => collected,
    }
}

/// Everything the parent path already provides, seen from the node's environment
pub fn parent_classes(tree: &HostgroupTree, registry: &Registry, node: &Hostgroup) -> BTreeSet<Uuid> {
    match tree.parent(node) {
        Some(parent) => all_classes(tree, registry, parent, effective_environment(tree, node)),
        None => BTreeSet::new(),
    }
}

/// Classes that may still be assigned to the node
pub fn available_classes(
    tree: &HostgroupTree,
    registry: &Registry,
    node: &Hostgroup,
) -> BTreeSet<Uuid> {
    match effective_environment(tree, node) {
        Some(environment_id) => {
            let inherited = parent_classes(tree, registry, node);
            environment_classes(registry, environment_id)
                .difference(&inherited)
                .copied()
                .collect()
        }
        None => registry.puppetclass_ids(),
    }
}

/// Config groups assigned anywhere above the node
pub fn parent_config_groups(tree: &HostgroupTree, node: &Hostgroup) -> BTreeSet<Uuid> {
    tree.ancestors(node)
        .into_iter()
        .flat_map(|ancestor| ancestor.config_group_ids())
        .collect()
}

/// Full membership view with names resolved through the registry
pub fn membership(tree: &HostgroupTree, registry: &Registry, node: &Hostgroup) -> ClassMembership {
    let environment_id = effective_environment(tree, node);
    let in_groups = classes_in_groups(tree, registry, node);
    let individual = individual_classes(tree, registry, node);
    let combined: BTreeSet<Uuid> = individual.union(&in_groups).copied().collect();

    ClassMembership {
        environment_id,
        classes: registry.named_classes(&combined),
        individual_classes: registry.named_classes(&individual),
        classes_in_groups: registry.named_classes(&in_groups),
        parent_classes: registry.named_classes(&parent_classes(tree, registry, node)),
        all_classes: registry.named_classes(&all_classes(tree, registry, node, environment_id)),
        available_classes: registry.named_classes(&available_classes(tree, registry, node)),
        config_groups: registry.named_config_groups(&node.config_group_ids()),
        parent_config_groups: registry.named_config_groups(&parent_config_groups(tree, node)),
    }
}
