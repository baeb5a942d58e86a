// Entity Models
//
// User owns groups, a group contains movements, a movement is authored by a user.
// Ownership fields are never taken from client input: the access layer forces them.

pub mod amount;
pub mod user;
pub mod group;
pub mod movement;

pub use amount::{Amount, AmountError};
pub use user::{Principal, User};
pub use group::{Group, GroupDetail, GroupParams, GroupSummary};
pub use movement::{Movement, MovementParams};

use serde::{Deserialize, Deserializer};
use serde_json::Value;

pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Form field that accepts any JSON scalar.
///
/// Text is kept as is, numbers and booleans become their literal text,
/// `null`, arrays and objects count as absent.
pub(crate) fn scalar_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(text) => Some(text),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    })
}
