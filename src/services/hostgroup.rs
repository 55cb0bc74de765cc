//! Hostgroup service
//!
//! Owns the in-memory snapshot (tree, registry, lookup values, settings)
//! behind an async `RwLock`. Readers share the read guard. Every mutation
//! holds the write guard across validation, the database transaction and the
//! in-memory apply, so concurrent readers never observe a half-applied
//! relabel cascade.

use std::collections::BTreeMap;

use anyhow::Context;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::db::{DbPool, HostgroupRepository, SettingsRepository};
use crate::models::{
    ClassMembership, CreateHostgroupRequest, GroupParameter, Hostgroup, HostgroupDetail,
    HostgroupDraft, HostgroupSummary, InheritedAssociation, LookupValue, MutationContext, NamedRef,
    ParameterFlags, Permission, Registry, ResolvedParameter, Setting, Settings, TreeIntegrity,
    UpdateHostgroupRequest, LOOKUP_MATCHER_PREFIX,
};
use crate::services::search::{self, SearchQuery};
use crate::services::tree::HostgroupTree;
use crate::services::{associations, classes, clone, guard, parameters};
use crate::utils::HostgroupError;

/// Consistent snapshot every resolver reads from
#[derive(Debug, Default)]
pub struct Inventory {
    pub tree: HostgroupTree,
    pub registry: Registry,
    pub lookup_values: Vec<LookupValue>,
    pub settings: Settings,
}

impl Inventory {
    fn lookup_values_for(&self, hostgroup: &Hostgroup) -> Vec<LookupValue> {
        let matcher = hostgroup.lookup_value_matcher();
        self.lookup_values
            .iter()
            .filter(|lv| lv.matcher == matcher)
            .cloned()
            .collect()
    }

    fn require(&self, id: Uuid) -> Result<&Hostgroup, HostgroupError> {
        self.tree
            .get(id)
            .ok_or_else(|| HostgroupError::NotFound(format!("Hostgroup {} not found", id)))
    }

    fn summarize(&self, hostgroup: &Hostgroup) -> HostgroupSummary {
        HostgroupSummary {
            id: hostgroup.id,
            name: hostgroup.name.clone(),
            title: hostgroup.title.clone(),
            parent_id: hostgroup.parent_id,
            to_param: hostgroup.to_param(),
            hosts_count: hostgroup.hosts_count,
            children_hosts_count: self.tree.children_hosts_count(hostgroup.id),
        }
    }
}

pub struct HostgroupService {
    db: DbPool,
    state: RwLock<Inventory>,
}

fn authorize(ctx: &MutationContext, permission: Permission) -> Result<(), HostgroupError> {
    if ctx.allows(permission) {
        Ok(())
    } else {
        warn!(actor = %ctx.actor, permission = permission.as_str(), "Mutation refused");
        Err(HostgroupError::Forbidden(format!(
            "{} lacks the {} permission",
            ctx.actor,
            permission.as_str()
        )))
    }
}

impl HostgroupService {
    /// Build the service from the database, seeding settings and lookup values first
    pub async fn load(
        db: DbPool,
        registry: Registry,
        lookup_values: &[LookupValue],
        setting_defaults: &BTreeMap<String, String>,
    ) -> anyhow::Result<Self> {
        let settings_repo = SettingsRepository::new(db.clone());
        let seeded = settings_repo.seed_defaults(setting_defaults).await?;
        let settings = settings_repo.snapshot().await?;

        let repo = HostgroupRepository::new(&db);
        let seeded_lookups = repo.seed_lookup_values(lookup_values).await?;
        let hostgroups = repo.list().await.context("Failed to load hostgroups")?;
        let lookup_values = repo.list_lookup_values().await?;

        let tree = HostgroupTree::from_hostgroups(hostgroups);
        info!(
            hostgroups = tree.len(),
            lookup_values = lookup_values.len(),
            seeded_settings = seeded,
            seeded_lookup_values = seeded_lookups,
            "Hostgroup inventory loaded"
        );

        Ok(Self {
            db,
            state: RwLock::new(Inventory {
                tree,
                registry,
                lookup_values,
                settings,
            }),
        })
    }

    // ---- reads ----

    pub async fn count(&self) -> usize {
        self.state.read().await.tree.len()
    }

    pub async fn integrity(&self) -> TreeIntegrity {
        self.state.read().await.tree.integrity()
    }

    /// All hostgroups ordered by title
    pub async fn list(&self) -> Vec<HostgroupSummary> {
        let state = self.state.read().await;
        state.tree.iter().map(|h| state.summarize(h)).collect()
    }

    /// Hostgroups matching a search expression such as `config_group = web`
    pub async fn search(&self, expression: &str) -> Result<Vec<HostgroupSummary>, HostgroupError> {
        let query = SearchQuery::parse(expression)?;
        let state = self.state.read().await;
        Ok(search::search(&state.tree, &state.registry, &query)
            .into_iter()
            .map(|h| state.summarize(h))
            .collect())
    }

    pub async fn get(&self, id: Uuid) -> Result<Hostgroup, HostgroupError> {
        let state = self.state.read().await;
        state.require(id).cloned()
    }

    /// Resolve an id, a path token (`{id}-{slug}`) or a title
    pub async fn find(&self, key: &str) -> Result<Hostgroup, HostgroupError> {
        let state = self.state.read().await;
        state
            .tree
            .find_by_param(key)
            .or_else(|| state.tree.find_by_title(key))
            .cloned()
            .ok_or_else(|| HostgroupError::NotFound(format!("Hostgroup '{}' not found", key)))
    }

    pub async fn children(&self, id: Uuid) -> Result<Vec<HostgroupSummary>, HostgroupError> {
        let state = self.state.read().await;
        state.require(id)?;
        Ok(state
            .tree
            .children(id)
            .into_iter()
            .map(|h| state.summarize(h))
            .collect())
    }

    pub async fn detail(&self, id: Uuid) -> Result<HostgroupDetail, HostgroupError> {
        let state = self.state.read().await;
        let hostgroup = state.require(id)?;
        Ok(HostgroupDetail {
            hostgroup: hostgroup.clone(),
            to_param: hostgroup.to_param(),
            ancestors: state
                .tree
                .ancestors(hostgroup)
                .into_iter()
                .map(|a| NamedRef {
                    id: a.id,
                    name: a.name.clone(),
                })
                .collect(),
            parameters: parameters::effective_parameters_with_source(&state.tree, hostgroup),
            associations: associations::inherited_associations(
                &state.tree,
                &state.registry,
                hostgroup,
            ),
            lookup_values: state.lookup_values_for(hostgroup),
            root_pass_resolved: associations::root_pass(&state.tree, hostgroup, &state.settings)
                .is_some(),
            children_hosts_count: state.tree.children_hosts_count(id),
        })
    }

    pub async fn effective_parameters(
        &self,
        id: Uuid,
    ) -> Result<Vec<ResolvedParameter>, HostgroupError> {
        let state = self.state.read().await;
        let hostgroup = state.require(id)?;
        Ok(parameters::effective_parameters_with_source(&state.tree, hostgroup))
    }

    pub async fn parent_parameters(
        &self,
        id: Uuid,
    ) -> Result<BTreeMap<String, String>, HostgroupError> {
        let state = self.state.read().await;
        let hostgroup = state.require(id)?;
        Ok(parameters::parent_params(&state.tree, hostgroup))
    }

    pub async fn parameter_flags(
        &self,
        id: Uuid,
        name: &str,
    ) -> Result<ParameterFlags, HostgroupError> {
        let state = self.state.read().await;
        let hostgroup = state.require(id)?;
        Ok(parameters::parameter_flags(&state.tree, hostgroup, name))
    }

    pub async fn param_true(&self, id: Uuid, name: &str) -> Result<bool, HostgroupError> {
        Ok(self.parameter_flags(id, name).await?.truthy)
    }

    pub async fn param_false(&self, id: Uuid, name: &str) -> Result<bool, HostgroupError> {
        Ok(self.parameter_flags(id, name).await?.falsy)
    }

    pub async fn inherited_associations(
        &self,
        id: Uuid,
    ) -> Result<Vec<InheritedAssociation>, HostgroupError> {
        let state = self.state.read().await;
        let hostgroup = state.require(id)?;
        Ok(associations::inherited_associations(
            &state.tree,
            &state.registry,
            hostgroup,
        ))
    }

    pub async fn membership(&self, id: Uuid) -> Result<ClassMembership, HostgroupError> {
        let state = self.state.read().await;
        let hostgroup = state.require(id)?;
        Ok(classes::membership(&state.tree, &state.registry, hostgroup))
    }

    /// Effective root password (never copied onto the hostgroup)
    pub async fn root_pass(&self, id: Uuid) -> Result<Option<String>, HostgroupError> {
        let state = self.state.read().await;
        let hostgroup = state.require(id)?;
        Ok(associations::root_pass(&state.tree, hostgroup, &state.settings))
    }

    pub async fn lookup_values(&self, id: Uuid) -> Result<Vec<LookupValue>, HostgroupError> {
        let state = self.state.read().await;
        let hostgroup = state.require(id)?;
        Ok(state.lookup_values_for(hostgroup))
    }

    pub async fn children_hosts_count(&self, id: Uuid) -> Result<u64, HostgroupError> {
        let state = self.state.read().await;
        state.require(id)?;
        Ok(state.tree.children_hosts_count(id))
    }

    /// Unsaved deep copy of a hostgroup. Nothing is written or validated.
    pub async fn build_clone(
        &self,
        id: Uuid,
        name: Option<&str>,
    ) -> Result<HostgroupDraft, HostgroupError> {
        let state = self.state.read().await;
        let source = state.require(id)?;
        Ok(clone::build_clone(
            &state.tree,
            &state.lookup_values,
            source,
            name,
        ))
    }

    pub async fn settings(&self) -> anyhow::Result<Vec<Setting>> {
        SettingsRepository::new(self.db.clone()).list_settings().await
    }

    // ---- mutations ----

    pub async fn create(
        &self,
        ctx: &MutationContext,
        req: CreateHostgroupRequest,
    ) -> Result<Hostgroup, HostgroupError> {
        authorize(ctx, Permission::CreateHostgroups)?;

        let mut hostgroup = Hostgroup {
            name: req.name,
            parent_id: req.parent_id,
            description: req.description,
            root_pass: req.root_pass,
            associations: req.associations,
            ..Default::default()
        };
        let id = hostgroup.id;
        hostgroup.parameters = req
            .parameters
            .into_iter()
            .map(|p| GroupParameter::new(id, p.name, p.value))
            .collect();
        hostgroup.set_puppetclasses(req.puppetclass_ids);
        hostgroup.set_config_groups(req.config_group_ids);

        let mut state = self.state.write().await;
        self.persist_locked(&mut state, ctx, HostgroupDraft::new(hostgroup))
            .await
    }

    /// Validate and save a draft produced by [`Self::build_clone`]
    pub async fn persist(
        &self,
        ctx: &MutationContext,
        draft: HostgroupDraft,
    ) -> Result<Hostgroup, HostgroupError> {
        authorize(ctx, Permission::CreateHostgroups)?;
        let mut state = self.state.write().await;
        self.persist_locked(&mut state, ctx, draft).await
    }

    /// Clone and persist in one step
    pub async fn clone_hostgroup(
        &self,
        ctx: &MutationContext,
        id: Uuid,
        name: Option<&str>,
    ) -> Result<Hostgroup, HostgroupError> {
        authorize(ctx, Permission::CreateHostgroups)?;
        let mut state = self.state.write().await;
        let draft = {
            let source = state.require(id)?;
            clone::build_clone(&state.tree, &state.lookup_values, source, name)
        };
        self.persist_locked(&mut state, ctx, draft).await
    }

    async fn persist_locked(
        &self,
        state: &mut Inventory,
        ctx: &MutationContext,
        mut draft: HostgroupDraft,
    ) -> Result<Hostgroup, HostgroupError> {
        if state.tree.contains(draft.hostgroup.id) {
            return Err(HostgroupError::invalid("id", "has already been taken"));
        }

        let hostgroup = &mut draft.hostgroup;
        guard::normalize(hostgroup);
        guard::validate(&state.tree, &state.registry, hostgroup)?;

        let now = Utc::now();
        hostgroup.title = state.tree.compose_title(hostgroup.parent_id, &hostgroup.name);
        hostgroup.hosts_count = 0;
        hostgroup.created_at = now;
        hostgroup.updated_at = now;
        let id = hostgroup.id;
        for param in &mut hostgroup.parameters {
            param.hostgroup_id = id;
        }
        for link in &mut hostgroup.puppetclasses {
            link.hostgroup_id = id;
        }
        for link in &mut hostgroup.config_groups {
            link.hostgroup_id = id;
        }
        let matcher = hostgroup.lookup_value_matcher();
        for value in &mut draft.lookup_values {
            value.matcher = matcher.clone();
        }

        HostgroupRepository::new(&self.db).create(&draft).await?;

        let HostgroupDraft {
            hostgroup,
            lookup_values,
        } = draft;
        let created = state.tree.insert(hostgroup).clone();
        state.lookup_values.extend(lookup_values);

        info!(
            actor = %ctx.actor,
            hostgroup = %created.id,
            title = %created.title,
            "Hostgroup created"
        );
        Ok(created)
    }

    pub async fn update(
        &self,
        ctx: &MutationContext,
        id: Uuid,
        req: UpdateHostgroupRequest,
    ) -> Result<Hostgroup, HostgroupError> {
        authorize(ctx, Permission::EditHostgroups)?;
        let mut state = self.state.write().await;
        let mut updated = state.require(id)?.clone();

        if let Some(name) = req.name {
            updated.name = name;
        }
        if let Some(parent_id) = req.parent_id {
            guard::check_reparent(&state.tree, id, parent_id)?;
            updated.parent_id = parent_id;
        }
        if let Some(description) = req.description {
            updated.description = description;
        }
        if let Some(root_pass) = req.root_pass {
            updated.root_pass = root_pass;
        }
        if let Some(associations) = req.associations {
            updated.associations = associations;
        }

        self.save_locked(&mut state, ctx, updated).await
    }

    /// Validate and save an edited hostgroup, cascading titles when needed
    async fn save_locked(
        &self,
        state: &mut Inventory,
        ctx: &MutationContext,
        mut updated: Hostgroup,
    ) -> Result<Hostgroup, HostgroupError> {
        let id = updated.id;
        let previous = state.require(id)?.clone();

        guard::normalize(&mut updated);
        guard::validate(&state.tree, &state.registry, &updated)?;
        updated.title = state.tree.compose_title(updated.parent_id, &updated.name);
        updated.updated_at = Utc::now();

        let (relabeled, matcher_moves) = if updated.title != previous.title {
            let relabeled = state.tree.preview_relabel(&updated);
            let moves: Vec<(String, String)> = relabeled
                .iter()
                .filter_map(|(node_id, title)| {
                    let old = state.tree.get(*node_id)?;
                    (old.title != *title).then(|| {
                        (
                            old.lookup_value_matcher(),
                            format!("{}{}", LOOKUP_MATCHER_PREFIX, title),
                        )
                    })
                })
                .collect();
            let descendants: Vec<(Uuid, String)> =
                relabeled.into_iter().filter(|(node_id, _)| *node_id != id).collect();
            (descendants, moves)
        } else {
            (vec![], vec![])
        };

        HostgroupRepository::new(&self.db)
            .update(&updated, &relabeled, &matcher_moves)
            .await?;

        state.tree.replace(updated);
        let changed = state.tree.relabel(id);
        for (old, new) in &matcher_moves {
            for value in state.lookup_values.iter_mut().filter(|lv| lv.matcher == *old) {
                value.matcher = new.clone();
            }
        }

        let saved = state.require(id)?.clone();
        if changed.is_empty() {
            info!(actor = %ctx.actor, hostgroup = %id, "Hostgroup updated");
        } else {
            info!(
                actor = %ctx.actor,
                hostgroup = %id,
                title = %saved.title,
                relabeled = changed.len(),
                "Hostgroup updated with relabel cascade"
            );
        }
        Ok(saved)
    }

    /// Delete a leaf hostgroup. Refused while children exist.
    pub async fn delete(&self, ctx: &MutationContext, id: Uuid) -> Result<(), HostgroupError> {
        authorize(ctx, Permission::DestroyHostgroups)?;
        let mut state = self.state.write().await;
        guard::check_destroy(&state.tree, id)?;
        let hostgroup = state.require(id)?.clone();

        HostgroupRepository::new(&self.db).delete(&hostgroup).await?;

        state.tree.remove(id)?;
        let matcher = hostgroup.lookup_value_matcher();
        state.lookup_values.retain(|lv| lv.matcher != matcher);

        info!(actor = %ctx.actor, hostgroup = %id, title = %hostgroup.title, "Hostgroup deleted");
        Ok(())
    }

    pub async fn set_parameter(
        &self,
        ctx: &MutationContext,
        id: Uuid,
        name: &str,
        value: &str,
    ) -> Result<Hostgroup, HostgroupError> {
        authorize(ctx, Permission::EditHostgroups)?;
        let mut state = self.state.write().await;
        let mut updated = state.require(id)?.clone();
        updated.set_parameter(name.trim(), value);
        self.save_locked(&mut state, ctx, updated).await
    }

    pub async fn remove_parameter(
        &self,
        ctx: &MutationContext,
        id: Uuid,
        name: &str,
    ) -> Result<Hostgroup, HostgroupError> {
        authorize(ctx, Permission::EditHostgroups)?;
        let mut state = self.state.write().await;
        let mut updated = state.require(id)?.clone();
        if !updated.remove_parameter(name) {
            return Err(HostgroupError::NotFound(format!(
                "Parameter '{}' not found on hostgroup {}",
                name, id
            )));
        }
        self.save_locked(&mut state, ctx, updated).await
    }

    pub async fn set_puppetclasses(
        &self,
        ctx: &MutationContext,
        id: Uuid,
        ids: Vec<Uuid>,
    ) -> Result<Hostgroup, HostgroupError> {
        authorize(ctx, Permission::EditHostgroups)?;
        let mut state = self.state.write().await;
        let mut updated = state.require(id)?.clone();
        updated.set_puppetclasses(ids);
        self.save_locked(&mut state, ctx, updated).await
    }

    pub async fn set_config_groups(
        &self,
        ctx: &MutationContext,
        id: Uuid,
        ids: Vec<Uuid>,
    ) -> Result<Hostgroup, HostgroupError> {
        authorize(ctx, Permission::EditHostgroups)?;
        let mut state = self.state.write().await;
        let mut updated = state.require(id)?.clone();
        updated.set_config_groups(ids);
        self.save_locked(&mut state, ctx, updated).await
    }

    /// Count one more host in the hostgroup
    pub async fn assign_host(
        &self,
        ctx: &MutationContext,
        id: Uuid,
    ) -> Result<Hostgroup, HostgroupError> {
        authorize(ctx, Permission::EditHostgroups)?;
        let mut state = self.state.write().await;
        let count = state.require(id)?.hosts_count.saturating_add(1);
        self.store_hosts_count(&mut state, id, count).await
    }

    pub async fn release_host(
        &self,
        ctx: &MutationContext,
        id: Uuid,
    ) -> Result<Hostgroup, HostgroupError> {
        authorize(ctx, Permission::EditHostgroups)?;
        let mut state = self.state.write().await;
        let current = state.require(id)?.hosts_count;
        if current == 0 {
            return Err(HostgroupError::invalid("hosts_count", "has no hosts to release"));
        }
        self.store_hosts_count(&mut state, id, current - 1).await
    }

    async fn store_hosts_count(
        &self,
        state: &mut Inventory,
        id: Uuid,
        count: u32,
    ) -> Result<Hostgroup, HostgroupError> {
        HostgroupRepository::new(&self.db)
            .set_hosts_count(id, count)
            .await?;
        let hostgroup = state
            .tree
            .get_mut(id)
            .ok_or_else(|| HostgroupError::NotFound(format!("Hostgroup {} not found", id)))?;
        hostgroup.hosts_count = count;
        hostgroup.updated_at = Utc::now();
        debug!(hostgroup = %id, hosts_count = count, "Hosts count changed");
        Ok(hostgroup.clone())
    }

    /// Store a global setting and refresh the snapshot used for fallbacks
    pub async fn update_setting(
        &self,
        ctx: &MutationContext,
        key: &str,
        value: &str,
        description: Option<&str>,
    ) -> Result<Setting, HostgroupError> {
        authorize(ctx, Permission::EditSettings)?;
        let mut state = self.state.write().await;
        let repo = SettingsRepository::new(self.db.clone());
        repo.set_setting(key, value, description).await?;
        let stored = repo
            .get_setting(key)
            .await?
            .ok_or_else(|| HostgroupError::NotFound(format!("Setting '{}' not found", key)))?;
        state.settings.set(key, value);
        info!(actor = %ctx.actor, setting = key, "Setting updated");
        Ok(stored)
    }
}
