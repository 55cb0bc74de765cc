//! Hostgroup repository
//!
//! Multi-row writes run inside a single transaction; callers update the
//! in-memory tree only after the commit succeeded.

use std::collections::HashMap;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::models::{
    Associations, GroupParameter, Hostgroup, HostgroupClass, HostgroupConfigGroup,
    HostgroupDraft, LookupValue,
};

#[derive(Debug, sqlx::FromRow)]
struct HostgroupRow {
    id: String,
    name: String,
    parent_id: Option<String>,
    title: String,
    description: Option<String>,
    root_pass: Option<String>,
    compute_profile_id: Option<String>,
    environment_id: Option<String>,
    domain_id: Option<String>,
    puppet_proxy_id: Option<String>,
    puppet_ca_proxy_id: Option<String>,
    operatingsystem_id: Option<String>,
    architecture_id: Option<String>,
    medium_id: Option<String>,
    ptable_id: Option<String>,
    subnet_id: Option<String>,
    hosts_count: i64,
    created_at: String,
    updated_at: String,
}

#[derive(Debug, sqlx::FromRow)]
struct ParameterRow {
    id: String,
    hostgroup_id: String,
    name: String,
    value: String,
}

#[derive(Debug, sqlx::FromRow)]
struct LinkRow {
    id: String,
    hostgroup_id: String,
    target_id: String,
}

#[derive(Debug, sqlx::FromRow)]
struct LookupValueRow {
    id: String,
    lookup_key: String,
    matcher: String,
    value: String,
}

pub struct HostgroupRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> HostgroupRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Load every hostgroup with its parameters and links
    pub async fn list(&self) -> Result<Vec<Hostgroup>> {
        let rows = sqlx::query_as::<_, HostgroupRow>(
            r#"
            SELECT id, name, parent_id, title, description, root_pass,
                   compute_profile_id, environment_id, domain_id, puppet_proxy_id,
                   puppet_ca_proxy_id, operatingsystem_id, architecture_id, medium_id,
                   ptable_id, subnet_id, hosts_count, created_at, updated_at
            FROM hostgroups
            ORDER BY title
            "#,
        )
        .fetch_all(self.pool)
        .await
        .context("Failed to list hostgroups")?;

        let parameters = sqlx::query_as::<_, ParameterRow>(
            "SELECT id, hostgroup_id, name, value FROM group_parameters ORDER BY name",
        )
        .fetch_all(self.pool)
        .await
        .context("Failed to list group parameters")?;

        let classes = sqlx::query_as::<_, LinkRow>(
            "SELECT id, hostgroup_id, puppetclass_id AS target_id FROM hostgroup_classes",
        )
        .fetch_all(self.pool)
        .await
        .context("Failed to list hostgroup classes")?;

        let config_groups = sqlx::query_as::<_, LinkRow>(
            "SELECT id, hostgroup_id, config_group_id AS target_id FROM hostgroup_config_groups",
        )
        .fetch_all(self.pool)
        .await
        .context("Failed to list hostgroup config groups")?;

        let mut hostgroups: Vec<Hostgroup> = rows.into_iter().map(row_to_hostgroup).collect();
        let index: HashMap<Uuid, usize> = hostgroups
            .iter()
            .enumerate()
            .map(|(i, h)| (h.id, i))
            .collect();

        for row in parameters {
            let hostgroup_id = parse_uuid(&row.hostgroup_id);
            if let Some(&i) = index.get(&hostgroup_id) {
                hostgroups[i].parameters.push(GroupParameter {
                    id: parse_uuid(&row.id),
                    hostgroup_id,
                    name: row.name,
                    value: row.value,
                });
            }
        }
        for row in classes {
            let hostgroup_id = parse_uuid(&row.hostgroup_id);
            if let Some(&i) = index.get(&hostgroup_id) {
                hostgroups[i].puppetclasses.push(HostgroupClass {
                    id: parse_uuid(&row.id),
                    hostgroup_id,
                    puppetclass_id: parse_uuid(&row.target_id),
                });
            }
        }
        for row in config_groups {
            let hostgroup_id = parse_uuid(&row.hostgroup_id);
            if let Some(&i) = index.get(&hostgroup_id) {
                hostgroups[i].config_groups.push(HostgroupConfigGroup {
                    id: parse_uuid(&row.id),
                    hostgroup_id,
                    config_group_id: parse_uuid(&row.target_id),
                });
            }
        }

        Ok(hostgroups)
    }

    pub async fn list_lookup_values(&self) -> Result<Vec<LookupValue>> {
        let rows = sqlx::query_as::<_, LookupValueRow>(
            "SELECT id, lookup_key, matcher, value FROM lookup_values ORDER BY lookup_key, matcher",
        )
        .fetch_all(self.pool)
        .await
        .context("Failed to list lookup values")?;

        Ok(rows.into_iter().map(row_to_lookup_value).collect())
    }

    /// Insert lookup values not stored yet, by id or by key and matcher
    pub async fn seed_lookup_values(&self, values: &[LookupValue]) -> Result<usize> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;
        let mut inserted = 0;
        for value in values {
            // Skip values already stored under the same id or key/matcher pair
            let result = sqlx::query(
                r#"
                INSERT INTO lookup_values (id, lookup_key, matcher, value)
                SELECT ?, ?, ?, ?
                WHERE NOT EXISTS (
                    SELECT 1 FROM lookup_values
                    WHERE id = ? OR (lookup_key = ? AND matcher = ?)
                )
                "#,
            )
            .bind(value.id.to_string())
            .bind(&value.lookup_key)
            .bind(&value.matcher)
            .bind(&value.value)
            .bind(value.id.to_string())
            .bind(&value.lookup_key)
            .bind(&value.matcher)
            .execute(&mut *tx)
            .await
            .context("Failed to seed lookup value")?;
            inserted += result.rows_affected() as usize;
        }
        tx.commit().await.context("Failed to commit lookup values")?;
        Ok(inserted)
    }

    /// Persist a new hostgroup together with its owned rows and lookup values
    pub async fn create(&self, draft: &HostgroupDraft) -> Result<()> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;
        let hostgroup = &draft.hostgroup;

        sqlx::query(
            r#"
            INSERT INTO hostgroups (
                id, name, parent_id, title, description, root_pass,
                compute_profile_id, environment_id, domain_id, puppet_proxy_id,
                puppet_ca_proxy_id, operatingsystem_id, architecture_id, medium_id,
                ptable_id, subnet_id, hosts_count, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(hostgroup.id.to_string())
        .bind(&hostgroup.name)
        .bind(hostgroup.parent_id.map(|id| id.to_string()))
        .bind(&hostgroup.title)
        .bind(&hostgroup.description)
        .bind(&hostgroup.root_pass)
        .bind(opt_id(hostgroup.associations.compute_profile_id))
        .bind(opt_id(hostgroup.associations.environment_id))
        .bind(opt_id(hostgroup.associations.domain_id))
        .bind(opt_id(hostgroup.associations.puppet_proxy_id))
        .bind(opt_id(hostgroup.associations.puppet_ca_proxy_id))
        .bind(opt_id(hostgroup.associations.operatingsystem_id))
        .bind(opt_id(hostgroup.associations.architecture_id))
        .bind(opt_id(hostgroup.associations.medium_id))
        .bind(opt_id(hostgroup.associations.ptable_id))
        .bind(opt_id(hostgroup.associations.subnet_id))
        .bind(hostgroup.hosts_count as i64)
        .bind(hostgroup.created_at.to_rfc3339())
        .bind(hostgroup.updated_at.to_rfc3339())
        .execute(&mut *tx)
        .await
        .context("Failed to insert hostgroup")?;

        insert_owned(&mut tx, hostgroup).await?;

        for value in &draft.lookup_values {
            sqlx::query(
                "INSERT INTO lookup_values (id, lookup_key, matcher, value) VALUES (?, ?, ?, ?)",
            )
            .bind(value.id.to_string())
            .bind(&value.lookup_key)
            .bind(&value.matcher)
            .bind(&value.value)
            .execute(&mut *tx)
            .await
            .context("Failed to insert lookup value")?;
        }

        tx.commit().await.context("Failed to commit hostgroup")?;
        Ok(())
    }

    /// Save an existing hostgroup, the relabeled titles of its subtree and the
    /// re-pointed lookup value matchers in one transaction
    pub async fn update(
        &self,
        hostgroup: &Hostgroup,
        relabeled: &[(Uuid, String)],
        matcher_moves: &[(String, String)],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        sqlx::query(
            r#"
            UPDATE hostgroups
            SET name = ?, parent_id = ?, title = ?, description = ?, root_pass = ?,
                compute_profile_id = ?, environment_id = ?, domain_id = ?,
                puppet_proxy_id = ?, puppet_ca_proxy_id = ?, operatingsystem_id = ?,
                architecture_id = ?, medium_id = ?, ptable_id = ?, subnet_id = ?,
                hosts_count = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&hostgroup.name)
        .bind(hostgroup.parent_id.map(|id| id.to_string()))
        .bind(&hostgroup.title)
        .bind(&hostgroup.description)
        .bind(&hostgroup.root_pass)
        .bind(opt_id(hostgroup.associations.compute_profile_id))
        .bind(opt_id(hostgroup.associations.environment_id))
        .bind(opt_id(hostgroup.associations.domain_id))
        .bind(opt_id(hostgroup.associations.puppet_proxy_id))
        .bind(opt_id(hostgroup.associations.puppet_ca_proxy_id))
        .bind(opt_id(hostgroup.associations.operatingsystem_id))
        .bind(opt_id(hostgroup.associations.architecture_id))
        .bind(opt_id(hostgroup.associations.medium_id))
        .bind(opt_id(hostgroup.associations.ptable_id))
        .bind(opt_id(hostgroup.associations.subnet_id))
        .bind(hostgroup.hosts_count as i64)
        .bind(hostgroup.updated_at.to_rfc3339())
        .bind(hostgroup.id.to_string())
        .execute(&mut *tx)
        .await
        .context("Failed to update hostgroup")?;

        delete_owned(&mut tx, hostgroup.id).await?;
        insert_owned(&mut tx, hostgroup).await?;

        for (id, title) in relabeled {
            sqlx::query("UPDATE hostgroups SET title = ? WHERE id = ?")
                .bind(title)
                .bind(id.to_string())
                .execute(&mut *tx)
                .await
                .context("Failed to relabel hostgroup")?;
        }

        for (old, new) in matcher_moves {
            sqlx::query("UPDATE lookup_values SET matcher = ? WHERE matcher = ?")
                .bind(new)
                .bind(old)
                .execute(&mut *tx)
                .await
                .context("Failed to re-point lookup values")?;
        }

        tx.commit().await.context("Failed to commit hostgroup update")?;
        Ok(())
    }

    /// Delete a hostgroup with its parameters, links and lookup values
    pub async fn delete(&self, hostgroup: &Hostgroup) -> Result<bool> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        sqlx::query("DELETE FROM lookup_values WHERE matcher = ?")
            .bind(hostgroup.lookup_value_matcher())
            .execute(&mut *tx)
            .await
            .context("Failed to delete lookup values")?;

        delete_owned(&mut tx, hostgroup.id).await?;

        let result = sqlx::query("DELETE FROM hostgroups WHERE id = ?")
            .bind(hostgroup.id.to_string())
            .execute(&mut *tx)
            .await
            .context("Failed to delete hostgroup")?;

        tx.commit().await.context("Failed to commit hostgroup delete")?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn set_hosts_count(&self, id: Uuid, hosts_count: u32) -> Result<()> {
        sqlx::query("UPDATE hostgroups SET hosts_count = ?, updated_at = ? WHERE id = ?")
            .bind(hosts_count as i64)
            .bind(Utc::now().to_rfc3339())
            .bind(id.to_string())
            .execute(self.pool)
            .await
            .context("Failed to update hosts count")?;
        Ok(())
    }
}

async fn insert_owned(conn: &mut SqliteConnection, hostgroup: &Hostgroup) -> Result<()> {
    for param in &hostgroup.parameters {
        sqlx::query("INSERT INTO group_parameters (id, hostgroup_id, name, value) VALUES (?, ?, ?, ?)")
            .bind(param.id.to_string())
            .bind(hostgroup.id.to_string())
            .bind(&param.name)
            .bind(&param.value)
            .execute(&mut *conn)
            .await
            .context("Failed to insert group parameter")?;
    }
    for link in &hostgroup.puppetclasses {
        sqlx::query("INSERT INTO hostgroup_classes (id, hostgroup_id, puppetclass_id) VALUES (?, ?, ?)")
            .bind(link.id.to_string())
            .bind(hostgroup.id.to_string())
            .bind(link.puppetclass_id.to_string())
            .execute(&mut *conn)
            .await
            .context("Failed to insert hostgroup class")?;
    }
    for link in &hostgroup.config_groups {
        sqlx::query(
            "INSERT INTO hostgroup_config_groups (id, hostgroup_id, config_group_id) VALUES (?, ?, ?)",
        )
        .bind(link.id.to_string())
        .bind(hostgroup.id.to_string())
        .bind(link.config_group_id.to_string())
        .execute(&mut *conn)
        .await
        .context("Failed to insert hostgroup config group")?;
    }
    Ok(())
}

async fn delete_owned(conn: &mut SqliteConnection, hostgroup_id: Uuid) -> Result<()> {
    for table in ["group_parameters", "hostgroup_classes", "hostgroup_config_groups"] {
        sqlx::query(&format!("DELETE FROM {} WHERE hostgroup_id = ?", table))
            .bind(hostgroup_id.to_string())
            .execute(&mut *conn)
            .await
            .with_context(|| format!("Failed to delete from {}", table))?;
    }
    Ok(())
}

fn opt_id(id: Option<Uuid>) -> Option<String> {
    id.map(|id| id.to_string())
}

fn parse_uuid(value: &str) -> Uuid {
    Uuid::parse_str(value).unwrap_or_else(|_| Uuid::nil())
}

fn parse_opt_uuid(value: Option<String>) -> Option<Uuid> {
    value.and_then(|v| Uuid::parse_str(&v).ok())
}

fn parse_db_timestamp(ts: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(ts) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(ts, "%Y-%m-%d %H:%M:%S") {
        return DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc);
    }
    Utc::now()
}

fn row_to_hostgroup(row: HostgroupRow) -> Hostgroup {
    Hostgroup {
        id: parse_uuid(&row.id),
        name: row.name,
        parent_id: parse_opt_uuid(row.parent_id),
        title: row.title,
        description: row.description,
        root_pass: row.root_pass,
        associations: Associations {
            compute_profile_id: parse_opt_uuid(row.compute_profile_id),
            environment_id: parse_opt_uuid(row.environment_id),
            domain_id: parse_opt_uuid(row.domain_id),
            puppet_proxy_id: parse_opt_uuid(row.puppet_proxy_id),
            puppet_ca_proxy_id: parse_opt_uuid(row.puppet_ca_proxy_id),
            operatingsystem_id: parse_opt_uuid(row.operatingsystem_id),
            architecture_id: parse_opt_uuid(row.architecture_id),
            medium_id: parse_opt_uuid(row.medium_id),
            ptable_id: parse_opt_uuid(row.ptable_id),
            subnet_id: parse_opt_uuid(row.subnet_id),
        },
        parameters: vec![],
        puppetclasses: vec![],
        config_groups: vec![],
        hosts_count: row.hosts_count.max(0) as u32,
        created_at: parse_db_timestamp(&row.created_at),
        updated_at: parse_db_timestamp(&row.updated_at),
    }
}

fn row_to_lookup_value(row: LookupValueRow) -> LookupValue {
    LookupValue {
        id: parse_uuid(&row.id),
        lookup_key: row.lookup_key,
        matcher: row.matcher,
        value: row.value,
    }
}
