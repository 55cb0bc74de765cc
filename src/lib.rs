//! OpenVox Hostgroups Library
//!
//! Hostgroup hierarchy with inherited parameters, associations, puppet
//! classes and config groups, served over a small JSON API.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
pub mod utils;

pub use config::AppConfig;
pub use db::DbPool;
pub use services::HostgroupService;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Database connection pool
    pub db: DbPool,
    /// Hostgroup engine holding the in-memory snapshot
    pub hostgroups: Arc<HostgroupService>,
}

impl AppState {
    /// Mutation context applied to API requests
    pub fn mutation_context(&self) -> models::MutationContext {
        self.config.api.mutation_context()
    }
}
