//! Validation of structural writes
//!
//! Every create, update, clone persist and delete passes through these checks
//! before anything is written. Field errors are collected rather than
//! returned on the first failure.

use std::collections::HashSet;

use uuid::Uuid;

use crate::models::{
    Feature, Hostgroup, InheritedField, Registry, LOOKUP_MATCHER_PREFIX, MAX_MATCHER_LENGTH,
    TITLE_SEPARATOR,
};
use crate::services::tree::HostgroupTree;
use crate::utils::validation::{is_blank, normalize_name};
use crate::utils::{FieldErrors, HostgroupError};

/// Minimum length of a non-blank root password
pub const MIN_ROOT_PASS_LENGTH: usize = 8;

/// Trim the name and drop blank optional strings
pub fn normalize(hostgroup: &mut Hostgroup) {
    hostgroup.name = normalize_name(&hostgroup.name);
    if hostgroup.description.as_deref().is_some_and(is_blank) {
        hostgroup.description = None;
    }
    for param in &mut hostgroup.parameters {
        param.name = param.name.trim().to_string();
    }
}

/// Longest name allowed below `parent_id` so that the lookup matcher stays
/// within [`MAX_MATCHER_LENGTH`] characters
pub fn max_name_length(tree: &HostgroupTree, parent_id: Option<Uuid>) -> usize {
    let prefix = LOOKUP_MATCHER_PREFIX.chars().count();
    let parent = parent_id
        .and_then(|id| tree.get(id))
        .map(|p| p.title.chars().count() + TITLE_SEPARATOR.chars().count())
        .unwrap_or(0);
    MAX_MATCHER_LENGTH.saturating_sub(prefix + parent)
}

/// Validate a hostgroup about to be created or updated
pub fn validate(
    tree: &HostgroupTree,
    registry: &Registry,
    hostgroup: &Hostgroup,
) -> Result<(), HostgroupError> {
    let mut errors = FieldErrors::new();

    validate_name(tree, hostgroup, &mut errors);

    if let Some(parent_id) = hostgroup.parent_id {
        if !tree.contains(parent_id) {
            errors.add("parent_id", "does not exist");
        }
    }

    if let Some(root_pass) = hostgroup.root_pass.as_deref() {
        if !is_blank(root_pass) && root_pass.chars().count() < MIN_ROOT_PASS_LENGTH {
            errors.add(
                "root_pass",
                format!("should be {} characters or more", MIN_ROOT_PASS_LENGTH),
            );
        }
    }

    validate_parameters(hostgroup, &mut errors);
    validate_memberships(registry, hostgroup, &mut errors);
    validate_proxy(
        registry,
        hostgroup,
        InheritedField::PuppetProxy,
        Feature::Puppet,
        &mut errors,
    );
    validate_proxy(
        registry,
        hostgroup,
        InheritedField::PuppetCaProxy,
        Feature::PuppetCa,
        &mut errors,
    );

    if !errors.is_empty() {
        tracing::debug!(hostgroup = %hostgroup.id, errors = %errors, "Hostgroup validation failed");
    }
    errors.into_result()
}

fn validate_name(tree: &HostgroupTree, hostgroup: &Hostgroup, errors: &mut FieldErrors) {
    if is_blank(&hostgroup.name) {
        errors.add("name", "can't be blank");
        return;
    }

    if hostgroup.name.contains(TITLE_SEPARATOR) {
        errors.add("name", format!("can't contain {}", TITLE_SEPARATOR));
    }

    let max = max_name_length(tree, hostgroup.parent_id);
    if hostgroup.name.chars().count() > max {
        errors.add(
            "name",
            format!("is too long (maximum is {} characters)", max),
        );
    }

    if tree
        .siblings(hostgroup)
        .iter()
        .any(|sibling| sibling.name == hostgroup.name)
    {
        errors.add("name", "has already been taken");
    }
}

fn validate_parameters(hostgroup: &Hostgroup, errors: &mut FieldErrors) {
    let mut seen = HashSet::new();
    for param in &hostgroup.parameters {
        if is_blank(&param.name) {
            errors.add("parameters", "name can't be blank");
        } else if !seen.insert(param.name.as_str()) {
            errors.add(
                "parameters",
                format!("name '{}' has already been taken", param.name),
            );
        }
    }
}

fn validate_memberships(registry: &Registry, hostgroup: &Hostgroup, errors: &mut FieldErrors) {
    for class_id in hostgroup.puppetclass_ids() {
        if registry.puppetclass(class_id).is_none() {
            errors.add("puppetclass_ids", format!("unknown puppet class {}", class_id));
        }
    }
    for group_id in hostgroup.config_group_ids() {
        if registry.config_group(group_id).is_none() {
            errors.add("config_group_ids", format!("unknown config group {}", group_id));
        }
    }
}

fn validate_proxy(
    registry: &Registry,
    hostgroup: &Hostgroup,
    field: InheritedField,
    feature: Feature,
    errors: &mut FieldErrors,
) {
    let Some(proxy_id) = hostgroup.associations.get(field) else {
        return;
    };
    match registry.smart_proxy(proxy_id) {
        Some(proxy) if proxy.has_feature(feature) => {}
        Some(_) => errors.add(field.column(), format!("does not have the {} feature", feature)),
        None => errors.add(field.column(), "does not exist"),
    }
}

/// Refuse a parent change that would make `id` its own ancestor
pub fn check_reparent(
    tree: &HostgroupTree,
    id: Uuid,
    new_parent: Option<Uuid>,
) -> Result<(), HostgroupError> {
    match new_parent {
        Some(parent_id) if tree.would_create_cycle(id, parent_id) => {
            tracing::warn!(hostgroup = %id, parent = %parent_id, "Refusing cyclic parent assignment");
            Err(HostgroupError::Cycle { id, parent_id })
        }
        _ => Ok(()),
    }
}

/// Refuse deleting a hostgroup that still has children
pub fn check_destroy(tree: &HostgroupTree, id: Uuid) -> Result<(), HostgroupError> {
    let hostgroup = tree
        .get(id)
        .ok_or_else(|| HostgroupError::NotFound(format!("Hostgroup {} not found", id)))?;
    if tree.has_children(id) {
        tracing::warn!(hostgroup = %id, "Refusing to delete hostgroup with children");
        return Err(HostgroupError::HasChildren {
            id,
            name: hostgroup.name.clone(),
        });
    }
    Ok(())
}
