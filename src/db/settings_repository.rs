//! Settings repository - database operations for settings

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::{Pool, Sqlite};

use crate::models::{Setting, Settings};

pub struct SettingsRepository {
    pool: Pool<Sqlite>,
}

impl SettingsRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Get a setting by key
    pub async fn get_setting(&self, key: &str) -> Result<Option<Setting>> {
        let setting = sqlx::query_as::<_, Setting>(
            r#"
            SELECT key, value, description, created_at, updated_at
            FROM settings
            WHERE key = ?
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to get setting")?;

        Ok(setting)
    }

    /// Get all settings ordered by key
    pub async fn list_settings(&self) -> Result<Vec<Setting>> {
        let settings = sqlx::query_as::<_, Setting>(
            r#"
            SELECT key, value, description, created_at, updated_at
            FROM settings
            ORDER BY key
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list settings")?;

        Ok(settings)
    }

    /// Set or update a setting
    pub async fn set_setting(
        &self,
        key: &str,
        value: &str,
        description: Option<&str>,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO settings (key, value, description, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                description = COALESCE(excluded.description, description),
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(description)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to save setting '{}'", key))?;

        Ok(())
    }

    /// Insert configured defaults for keys that are not stored yet
    pub async fn seed_defaults(&self, defaults: &BTreeMap<String, String>) -> Result<usize> {
        let now = Utc::now().to_rfc3339();
        let mut inserted = 0;

        for (key, value) in defaults {
            let result = sqlx::query(
                r#"
                INSERT OR IGNORE INTO settings (key, value, description, created_at, updated_at)
                VALUES (?, ?, NULL, ?, ?)
                "#,
            )
            .bind(key)
            .bind(value)
            .bind(&now)
            .bind(&now)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to seed setting '{}'", key))?;
            inserted += result.rows_affected() as usize;
        }

        Ok(inserted)
    }

    /// Snapshot of every stored setting
    pub async fn snapshot(&self) -> Result<Settings> {
        let settings = self.list_settings().await?;
        Ok(Settings::from_pairs(
            settings.into_iter().map(|s| (s.key, s.value)),
        ))
    }
}
