// 🚧 Error Taxonomy - every failure is a per-request outcome
//
// Unauthenticated → no principal
// Forbidden       → principal lacks ownership
// NotFound        → no such id within the principal's scope
// ValidationFailed → field constraints violated, form state preserved

use serde::Serialize;
use thiserror::Error;

use crate::validation::ValidationError;

/// Library result type
pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("authentication required")]
    Unauthenticated,

    #[error("not authorized to {action} this {resource}")]
    Forbidden {
        action: &'static str,
        resource: &'static str,
    },

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("validation failed: {}", summarize(.errors))]
    ValidationFailed {
        errors: Vec<ValidationError>,
        form: FormState,
    },

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn invalid(errors: Vec<ValidationError>, form: FormState) -> Self {
        AppError::ValidationFailed { errors, form }
    }

    /// Forbidden and NotFound are presented identically to callers.
    pub fn is_blocked(&self) -> bool {
        matches!(self, AppError::Forbidden { .. } | AppError::NotFound(_))
    }

    pub fn validation_errors(&self) -> Option<&[ValidationError]> {
        match self {
            AppError::ValidationFailed { errors, .. } => Some(errors),
            _ => None,
        }
    }
}

fn summarize(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Everything needed to re-render a rejected form
#[derive(Debug, Clone, Default, Serialize)]
pub struct FormState {
    /// The submitted input, as received
    pub input: serde_json::Value,

    /// Groups the principal may choose from (movement form without a pre-selected group)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_choices: Option<Vec<GroupChoice>>,
}

impl FormState {
    pub fn from_input<T: Serialize>(input: &T) -> Self {
        FormState {
            input: serde_json::to_value(input).unwrap_or(serde_json::Value::Null),
            group_choices: None,
        }
    }

    pub fn with_group_choices(mut self, choices: Vec<GroupChoice>) -> Self {
        self.group_choices = Some(choices);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupChoice {
    pub id: String,
    pub name: String,
    pub icon: String,
}
