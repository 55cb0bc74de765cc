//! Parameter resolution
//!
//! Each level of the path applies its own parameters root first, so the
//! nearest definition wins.

use std::collections::BTreeMap;

use crate::models::{Hostgroup, ParameterFlags, ResolvedParameter};
use crate::services::tree::HostgroupTree;
use crate::utils::cast::to_bool;

/// Effective `name -> value` map for `node`
pub fn effective_parameters(tree: &HostgroupTree, node: &Hostgroup) -> BTreeMap<String, String> {
    let mut params = parent_params(tree, node);
    for param in &node.parameters {
        params.insert(param.name.clone(), param.value.clone());
    }
    params
}

/// Parameters inherited from the ancestors only, ignoring the node's own overrides
pub fn parent_params(tree: &HostgroupTree, node: &Hostgroup) -> BTreeMap<String, String> {
    let mut params = BTreeMap::new();
    for ancestor in tree.ancestors(node) {
        for param in &ancestor.parameters {
            params.insert(param.name.clone(), param.value.clone());
        }
    }
    params
}

/// Effective parameters annotated with the hostgroup that supplied each value
pub fn effective_parameters_with_source(
    tree: &HostgroupTree,
    node: &Hostgroup,
) -> Vec<ResolvedParameter> {
    let mut resolved: BTreeMap<String, ResolvedParameter> = BTreeMap::new();
    let ancestors = tree.ancestors(node);
    for level in ancestors.into_iter().chain(std::iter::once(node)) {
        for param in &level.parameters {
            resolved.insert(
                param.name.clone(),
                ResolvedParameter {
                    name: param.name.clone(),
                    value: param.value.clone(),
                    source_id: level.id,
                    source_title: level.title.clone(),
                    inherited: level.id != node.id,
                },
            );
        }
    }
    resolved.into_values().collect()
}

/// Effective value of a single parameter
pub fn effective_parameter(tree: &HostgroupTree, node: &Hostgroup, name: &str) -> Option<String> {
    if let Some(own) = node.parameter(name) {
        return Some(own.value.clone());
    }
    tree.ancestors(node)
        .into_iter()
        .rev()
        .find_map(|ancestor| ancestor.parameter(name).map(|p| p.value.clone()))
}

/// True when the effective value of `name` is a truthy literal
pub fn param_true(tree: &HostgroupTree, node: &Hostgroup, name: &str) -> bool {
    effective_parameter(tree, node, name)
        .and_then(|value| to_bool(&value))
        .unwrap_or(false)
}

/// True when the effective value of `name` is a falsy literal.
///
/// An undefined parameter is neither true nor false.
pub fn param_false(tree: &HostgroupTree, node: &Hostgroup, name: &str) -> bool {
    effective_parameter(tree, node, name)
        .and_then(|value| to_bool(&value))
        .map(|b| !b)
        .unwrap_or(false)
}

pub fn parameter_flags(tree: &HostgroupTree, node: &Hostgroup, name: &str) -> ParameterFlags {
    let value = effective_parameter(tree, node, name);
    let coerced = value.as_deref().and_then(to_bool);
    ParameterFlags {
        name: name.to_string(),
        value,
        truthy: coerced == Some(true),
        falsy: coerced == Some(false),
    }
}
