//! Hostgroup search expressions
//!
//! Supported form: `config_group = NAME`, spaces around `=` optional and the
//! name optionally wrapped in single or double quotes.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::{Hostgroup, Registry};
use crate::services::tree::HostgroupTree;
use crate::utils::validation::squish;
use crate::utils::HostgroupError;

static SEARCH_EXPR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^(?P<field>[a-z_]+)\s*=\s*(?:"(?P<dq>[^"]*)"|'(?P<sq>[^']*)'|(?P<bare>.+))$"#)
        .unwrap()
});

/// Parsed search expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchQuery {
    /// Hostgroups that directly carry the named config group
    ConfigGroup(String),
}

impl SearchQuery {
    pub fn parse(expression: &str) -> Result<Self, HostgroupError> {
        let expression = squish(expression);
        let captures = SEARCH_EXPR.captures(&expression).ok_or_else(|| {
            HostgroupError::invalid("search", format!("cannot parse '{}'", expression))
        })?;
        let value = ["dq", "sq", "bare"]
            .iter()
            .find_map(|name| captures.name(name))
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default();

        match &captures["field"] {
            "config_group" => Ok(SearchQuery::ConfigGroup(value)),
            other => Err(HostgroupError::invalid(
                "search",
                format!("unsupported field '{}'", other),
            )),
        }
    }
}

/// Hostgroups matching `query`, ordered by title
pub fn search<'a>(
    tree: &'a HostgroupTree,
    registry: &Registry,
    query: &SearchQuery,
) -> Vec<&'a Hostgroup> {
    match query {
        SearchQuery::ConfigGroup(name) => match registry.config_group_by_name(name) {
            Some(group) => tree
                .iter()
                .filter(|h| h.config_groups.iter().any(|g| g.config_group_id == group.id))
                .collect(),
            None => vec![],
        },
    }
}
