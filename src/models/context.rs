//! Explicit capability context for mutating operations
//!
//! Every structural write receives a [`MutationContext`] naming the actor and
//! the permissions granted to it. There is no ambient "current user".

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Permission to perform a class of hostgroup operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    ViewHostgroups,
    CreateHostgroups,
    EditHostgroups,
    DestroyHostgroups,
    EditSettings,
}

impl Permission {
    pub fn all() -> Vec<Permission> {
        vec![
            Permission::ViewHostgroups,
            Permission::CreateHostgroups,
            Permission::EditHostgroups,
            Permission::DestroyHostgroups,
            Permission::EditSettings,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Permission::ViewHostgroups => "view_hostgroups",
            Permission::CreateHostgroups => "create_hostgroups",
            Permission::EditHostgroups => "edit_hostgroups",
            Permission::DestroyHostgroups => "destroy_hostgroups",
            Permission::EditSettings => "edit_settings",
        }
    }
}

/// Who is performing a mutation and what they may do
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationContext {
    pub actor: String,
    permissions: BTreeSet<Permission>,
}

impl MutationContext {
    pub fn new(actor: impl Into<String>, permissions: impl IntoIterator<Item = Permission>) -> Self {
        Self {
            actor: actor.into(),
            permissions: permissions.into_iter().collect(),
        }
    }

    /// Context holding every permission
    pub fn admin(actor: impl Into<String>) -> Self {
        Self::new(actor, Permission::all())
    }

    /// Context that may only read
    pub fn viewer(actor: impl Into<String>) -> Self {
        Self::new(actor, [Permission::ViewHostgroups])
    }

    pub fn allows(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }
}
