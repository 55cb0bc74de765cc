//! Configuration management
//!
//! This module provides YAML-based configuration management with support for:
//! - Environment variable overrides
//! - Multiple configuration file locations
//! - Default values for all settings
//! - The inventory of classes, environments and proxies (loaded from separate file)

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{
    ConfigGroup, Environment, Feature, LookupValue, MutationContext, NamedReference, Permission,
    Puppetclass, ReferenceKind, Registry, SmartProxy,
};

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Global settings seeded into the settings table when absent (e.g. `root_pass`)
    #[serde(default)]
    pub settings: BTreeMap<String, String>,
    #[serde(default)]
    pub api: ApiConfig,
    /// Path to the inventory file (classes, environments, config groups, proxies)
    #[serde(default)]
    pub inventory_path: Option<PathBuf>,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5052
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_idle_timeout() -> u64 {
    600
}

impl DatabaseConfig {
    /// In-memory database, used by tests
    pub fn in_memory() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            min_connections: 1,
            connect_timeout_secs: default_connect_timeout(),
            idle_timeout_secs: 0,
        }
    }

    pub fn is_memory(&self) -> bool {
        self.url.contains(":memory:")
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    /// Log output target (console or file)
    #[serde(default = "default_log_target")]
    pub target: LogTarget,
    /// Directory for log files (used when target is "file")
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// Log file name prefix (default: "openvox-hostgroups")
    #[serde(default = "default_log_prefix")]
    pub log_prefix: String,
    /// Enable daily log rotation (default: true for production)
    #[serde(default = "default_log_rotation")]
    pub daily_rotation: bool,
    /// Maximum number of log files to keep (0 = unlimited)
    #[serde(default = "default_max_log_files")]
    pub max_log_files: usize,
}

/// Log output target
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogTarget {
    /// Log to console (stdout/stderr) - default for development
    #[default]
    Console,
    /// Log to file with optional rotation - recommended for production
    File,
    /// Log to both console and file
    Both,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}

fn default_log_target() -> LogTarget {
    LogTarget::Console
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("/var/log/openvox/hostgroups")
}

fn default_log_prefix() -> String {
    "openvox-hostgroups".to_string()
}

fn default_log_rotation() -> bool {
    true
}

fn default_max_log_files() -> usize {
    30 // Keep 30 days of logs by default
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            target: default_log_target(),
            log_dir: default_log_dir(),
            log_prefix: default_log_prefix(),
            daily_rotation: default_log_rotation(),
            max_log_files: default_max_log_files(),
        }
    }
}

/// Identity and permissions applied to mutations made through the HTTP API
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    #[serde(default = "default_actor")]
    pub actor: String,
    #[serde(default = "Permission::all")]
    pub permissions: Vec<Permission>,
}

fn default_actor() -> String {
    "api".to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            actor: default_actor(),
            permissions: Permission::all(),
        }
    }
}

impl ApiConfig {
    pub fn mutation_context(&self) -> MutationContext {
        MutationContext::new(self.actor.clone(), self.permissions.iter().copied())
    }
}

/// Inventory of records referenced by hostgroups (loaded from separate file)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct InventoryConfig {
    #[serde(default)]
    pub puppetclasses: Vec<PuppetclassDefinition>,
    #[serde(default)]
    pub environments: Vec<MembershipDefinition>,
    #[serde(default)]
    pub config_groups: Vec<MembershipDefinition>,
    #[serde(default)]
    pub smart_proxies: Vec<SmartProxyDefinition>,
    #[serde(default)]
    pub references: ReferenceDefinitions,
    /// Smart class parameter overrides
    #[serde(default)]
    pub lookup_values: Vec<LookupValueDefinition>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PuppetclassDefinition {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub name: String,
}

/// Environment or config group, listing its classes by name
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MembershipDefinition {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub name: String,
    #[serde(default)]
    pub puppetclasses: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SmartProxyDefinition {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub features: BTreeSet<Feature>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReferenceDefinition {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub name: String,
}

/// Plain named records grouped by kind
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ReferenceDefinitions {
    #[serde(default)]
    pub compute_profiles: Vec<ReferenceDefinition>,
    #[serde(default)]
    pub domains: Vec<ReferenceDefinition>,
    #[serde(default)]
    pub operatingsystems: Vec<ReferenceDefinition>,
    #[serde(default)]
    pub architectures: Vec<ReferenceDefinition>,
    #[serde(default)]
    pub media: Vec<ReferenceDefinition>,
    #[serde(default)]
    pub ptables: Vec<ReferenceDefinition>,
    #[serde(default)]
    pub subnets: Vec<ReferenceDefinition>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LookupValueDefinition {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub lookup_key: String,
    #[serde(rename = "match")]
    pub matcher: String,
    pub value: String,
}

impl InventoryConfig {
    /// Load inventory from file
    pub fn load(path: &PathBuf) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read inventory file: {:?}", path))?;
        serde_norway::from_str(&contents)
            .with_context(|| format!("Failed to parse inventory file: {:?}", path))
    }

    /// Find inventory file in standard locations
    pub fn find_config_file() -> Option<PathBuf> {
        let paths = [
            PathBuf::from("inventory.yaml"),
            PathBuf::from("config/inventory.yaml"),
            PathBuf::from("/etc/openvox-hostgroups/inventory.yaml"),
            dirs::config_dir()
                .map(|p| p.join("openvox-hostgroups/inventory.yaml"))
                .unwrap_or_default(),
        ];

        paths.into_iter().find(|p| p.exists())
    }

    /// Build the registry, resolving class names. Records without an id get one
    /// derived from their kind and name, so it is stable across restarts.
    pub fn to_registry(&self) -> Result<Registry> {
        let mut registry = Registry::new();
        let mut classes_by_name: HashMap<&str, Uuid> = HashMap::new();

        for class in &self.puppetclasses {
            let id = class.id.unwrap_or_else(|| inventory_id("puppetclass", &class.name));
            classes_by_name.insert(class.name.as_str(), id);
            registry.add_puppetclass(Puppetclass {
                id,
                name: class.name.clone(),
            });
        }

        let resolve = |owner: &str, names: &[String]| -> Result<BTreeSet<Uuid>> {
            names
                .iter()
                .map(|name| {
                    classes_by_name
                        .get(name.as_str())
                        .copied()
                        .with_context(|| format!("{} references unknown puppet class '{}'", owner, name))
                })
                .collect()
        };

        for env in &self.environments {
            registry.add_environment(Environment {
                id: env.id.unwrap_or_else(|| inventory_id("environment", &env.name)),
                name: env.name.clone(),
                puppetclass_ids: resolve(&format!("Environment '{}'", env.name), &env.puppetclasses)?,
            });
        }

        for group in &self.config_groups {
            registry.add_config_group(ConfigGroup {
                id: group.id.unwrap_or_else(|| inventory_id("config_group", &group.name)),
                name: group.name.clone(),
                puppetclass_ids: resolve(
                    &format!("Config group '{}'", group.name),
                    &group.puppetclasses,
                )?,
            });
        }

        for proxy in &self.smart_proxies {
            registry.add_smart_proxy(SmartProxy {
                id: proxy.id.unwrap_or_else(|| inventory_id("smart_proxy", &proxy.name)),
                name: proxy.name.clone(),
                url: proxy.url.clone(),
                features: proxy.features.clone(),
            });
        }

        let refs = &self.references;
        let kinds = [
            (ReferenceKind::ComputeProfile, "compute_profile", &refs.compute_profiles),
            (ReferenceKind::Domain, "domain", &refs.domains),
            (ReferenceKind::Operatingsystem, "operatingsystem", &refs.operatingsystems),
            (ReferenceKind::Architecture, "architecture", &refs.architectures),
            (ReferenceKind::Medium, "medium", &refs.media),
            (ReferenceKind::Ptable, "ptable", &refs.ptables),
            (ReferenceKind::Subnet, "subnet", &refs.subnets),
        ];
        for (kind, label, definitions) in kinds {
            for definition in definitions {
                registry.add_reference(
                    kind,
                    NamedReference {
                        id: definition.id.unwrap_or_else(|| inventory_id(label, &definition.name)),
                        name: definition.name.clone(),
                    },
                );
            }
        }

        Ok(registry)
    }

    pub fn lookup_values(&self) -> Vec<LookupValue> {
        self.lookup_values
            .iter()
            .map(|lv| {
                let mut value = LookupValue::new(&lv.lookup_key, &lv.matcher, &lv.value);
                value.id = lv.id.unwrap_or_else(|| {
                    inventory_id("lookup_value", &format!("{}|{}", lv.lookup_key, lv.matcher))
                });
                value
            })
            .collect()
    }
}

/// Name-based id for inventory records declared without one
fn inventory_id(kind: &str, name: &str) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, format!("openvox-hostgroups/{}/{}", kind, name).as_bytes())
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig {
                url: "sqlite://./data/hostgroups.db".to_string(),
                max_connections: default_max_connections(),
                min_connections: default_min_connections(),
                connect_timeout_secs: default_connect_timeout(),
                idle_timeout_secs: default_idle_timeout(),
            },
            logging: LoggingConfig::default(),
            settings: BTreeMap::new(),
            api: ApiConfig::default(),
            inventory_path: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values
    /// 2. Configuration file (YAML)
    /// 3. Environment variables (prefixed with OPENVOX_)
    pub fn load() -> Result<Self> {
        // Try to load .env file if it exists
        let _ = dotenvy::dotenv();

        // Check for config path override from environment
        let config_path = std::env::var("OPENVOX_HOSTGROUPS_CONFIG")
            .map(PathBuf::from)
            .ok()
            .or_else(Self::find_config_file);

        let mut config = if let Some(ref path) = config_path {
            if path.exists() {
                eprintln!("[CONFIG] Loading configuration from: {:?}", path);
                Self::from_file(path)?
            } else {
                eprintln!("[CONFIG] Config file path exists but file not found: {:?}", path);
                AppConfig::default()
            }
        } else {
            eprintln!("[CONFIG] No config file found, using defaults");
            AppConfig::default()
        };

        // Apply environment variable overrides
        config.apply_env_overrides();

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    pub fn from_file(path: &PathBuf) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        serde_norway::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    /// Find the configuration file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let paths = [
            // Current directory
            PathBuf::from("config.yaml"),
            PathBuf::from("config/config.yaml"),
            // System config directory
            PathBuf::from("/etc/openvox-hostgroups/config.yaml"),
            // User config directory
            dirs::config_dir()
                .map(|p| p.join("openvox-hostgroups/config.yaml"))
                .unwrap_or_default(),
        ];

        paths.into_iter().find(|p| p.exists())
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // Server overrides
        if let Ok(host) = std::env::var("OPENVOX_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("OPENVOX_PORT") {
            if let Ok(p) = port.parse() {
                self.server.port = p;
            }
        }

        // Database overrides
        if let Ok(url) = std::env::var("DATABASE_URL") {
            self.database.url = url;
        }

        // Logging overrides
        if let Ok(level) = std::env::var("RUST_LOG") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("OPENVOX_LOG_FORMAT") {
            self.logging.format = match format.to_lowercase().as_str() {
                "json" => LogFormat::Json,
                "compact" => LogFormat::Compact,
                _ => LogFormat::Pretty,
            };
        }

        if let Ok(path) = std::env::var("OPENVOX_INVENTORY") {
            self.inventory_path = Some(PathBuf::from(path));
        }
        if let Ok(root_pass) = std::env::var("OPENVOX_ROOT_PASS") {
            self.settings
                .insert(crate::models::ROOT_PASS_SETTING.to_string(), root_pass);
        }
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        // Validate port
        if self.server.port == 0 {
            anyhow::bail!("Server port cannot be 0");
        }

        // Validate database URL
        if self.database.url.is_empty() {
            anyhow::bail!("Database URL cannot be empty");
        }

        if self.database.max_connections == 0 {
            anyhow::bail!("Database max_connections must be at least 1");
        }

        if let Some(ref path) = self.inventory_path {
            if !path.exists() {
                anyhow::bail!("Inventory file not found: {:?}", path);
            }
        }

        if self.api.actor.trim().is_empty() {
            anyhow::bail!("API actor cannot be empty");
        }

        Ok(())
    }

    /// Load the inventory named by `inventory_path`, falling back to standard locations
    pub fn load_inventory(&self) -> Result<InventoryConfig> {
        match self
            .inventory_path
            .clone()
            .or_else(InventoryConfig::find_config_file)
        {
            Some(path) => {
                tracing::info!("Loading inventory from {:?}", path);
                InventoryConfig::load(&path)
            }
            None => {
                tracing::warn!("No inventory file found, starting with an empty registry");
                Ok(InventoryConfig::default())
            }
        }
    }
}
