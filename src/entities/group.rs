// 🗂️ Group Entity - a named budget owned by exactly one user
//
// The movements total is always derived from the child rows, never stored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::movement::Movement;
use super::{scalar_text, Amount};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: String,

    /// Group name (3–65 characters)
    pub name: String,

    /// One of the bundled group icons
    pub icon: String,

    /// Owner (immutable after creation)
    pub user_id: String,

    pub created_at: DateTime<Utc>,
}

impl Group {
    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.user_id == user_id
    }
}

/// Untrusted group attributes.
///
/// Only `name` and `icon` exist here; any `id` or `user_id` a client sends
/// is dropped during deserialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroupParams {
    #[serde(default, deserialize_with = "scalar_text")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "scalar_text")]
    pub icon: Option<String>,
}

/// A group with its derived aggregates, as listed on the dashboard
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSummary {
    #[serde(flatten)]
    pub group: Group,
    pub movements_total: Amount,
    pub movements_count: i64,
}

/// A group with its movements, newest first
#[derive(Debug, Clone, Serialize)]
pub struct GroupDetail {
    #[serde(flatten)]
    pub group: Group,
    pub movements_total: Amount,
    pub movements: Vec<Movement>,
}

impl GroupDetail {
    pub fn new(group: Group, movements: Vec<Movement>) -> Self {
        let movements_total = movements.iter().map(|m| m.amount).sum();
        GroupDetail {
            group,
            movements_total,
            movements,
        }
    }
}
