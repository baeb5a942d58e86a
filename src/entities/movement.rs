// 💸 Movement Entity - a single monetary entry inside a group

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{scalar_text, Amount};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movement {
    pub id: String,

    /// Movement name (3–65 characters)
    pub name: String,

    /// Strictly positive
    pub amount: Amount,

    /// Containing group (immutable)
    pub group_id: String,

    /// Acting principal at creation time, never client-supplied
    pub author_id: String,

    pub created_at: DateTime<Utc>,
}

/// Untrusted movement attributes.
///
/// `amount` stays a raw JSON value until validation so that strings,
/// numbers and garbage all get the same treatment. `group_id` is only
/// honoured by the top-level form, and only after it resolves through
/// the principal's own groups.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MovementParams {
    #[serde(default, deserialize_with = "scalar_text")]
    pub name: Option<String>,
    #[serde(default)]
    pub amount: Option<serde_json::Value>,
    #[serde(default, deserialize_with = "scalar_text")]
    pub group_id: Option<String>,
}
