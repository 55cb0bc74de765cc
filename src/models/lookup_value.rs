//! Lookup value data model

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Override of a smart class parameter for a matcher such as `hostgroup=Common/db`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupValue {
    pub id: Uuid,
    /// Name of the overridden class parameter (e.g. `ntp::servers`)
    pub lookup_key: String,
    #[serde(rename = "match")]
    pub matcher: String,
    pub value: String,
}

impl LookupValue {
    pub fn new(
        lookup_key: impl Into<String>,
        matcher: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            lookup_key: lookup_key.into(),
            matcher: matcher.into(),
            value: value.into(),
        }
    }
}
