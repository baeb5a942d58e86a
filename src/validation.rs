// 📐 Shape Layer - Field Validation
// Validates groups, movements and registrations before anything is persisted

use serde::Serialize;
use serde_json::Value;

use crate::assets;
use crate::entities::Amount;

pub const NAME_MIN_LEN: usize = 3;
pub const NAME_MAX_LEN: usize = 65;
pub const PASSWORD_MIN_LEN: usize = 6;
pub const PASSWORD_MAX_LEN: usize = 128;

// ============================================================================
// VALIDATION RESULT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
    pub context: String,
}

impl ValidationError {
    pub fn new(field: &str, message: impl Into<String>, context: &str) -> Self {
        ValidationError {
            field: field.to_string(),
            message: message.into(),
            context: context.to_string(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.context, self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult = Result<(), Vec<ValidationError>>;

fn finish(errors: Vec<ValidationError>) -> ValidationResult {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

// ============================================================================
// FIELD RULES
// ============================================================================

/// Required display name, 3–65 characters
pub fn check_name(value: Option<&str>, context: &str, errors: &mut Vec<ValidationError>) {
    let value = value.unwrap_or("");
    if value.trim().is_empty() {
        errors.push(ValidationError::new("name", "can't be blank", context));
        return;
    }

    let len = value.chars().count();
    if len < NAME_MIN_LEN {
        errors.push(ValidationError::new(
            "name",
            format!("is too short (minimum is {} characters)", NAME_MIN_LEN),
            context,
        ));
    } else if len > NAME_MAX_LEN {
        errors.push(ValidationError::new(
            "name",
            format!("is too long (maximum is {} characters)", NAME_MAX_LEN),
            context,
        ));
    }
}

/// Parse an untrusted amount. Accepts JSON numbers and numeric strings,
/// both read exactly through their decimal text.
pub fn parse_amount(value: Option<&Value>) -> Result<Amount, &'static str> {
    let parsed = match value {
        None | Some(Value::Null) => return Err("can't be blank"),
        Some(Value::Number(n)) => n.to_string().parse::<Amount>(),
        Some(Value::String(s)) => {
            if s.trim().is_empty() {
                return Err("can't be blank");
            }
            s.parse::<Amount>()
        }
        Some(_) => return Err("is not a number"),
    };

    let amount = parsed.map_err(|e| e.message())?;
    if !amount.is_positive() {
        return Err("must be greater than 0");
    }
    Ok(amount)
}

// ============================================================================
// ENTITY VALIDATORS
// ============================================================================

pub fn validate_group(name: Option<&str>, icon: Option<&str>) -> ValidationResult {
    let mut errors = Vec::new();
    check_name(name, "Group", &mut errors);

    match icon {
        None | Some("") => errors.push(ValidationError::new("icon", "can't be blank", "Group")),
        Some(icon) if !assets::is_group_icon(icon) => {
            errors.push(ValidationError::new("icon", "is not included in the list", "Group"))
        }
        Some(_) => {}
    }

    finish(errors)
}

/// Returns the parsed amount when both fields pass.
pub fn validate_movement(
    name: Option<&str>,
    amount: Option<&Value>,
) -> Result<Amount, Vec<ValidationError>> {
    let mut errors = Vec::new();
    check_name(name, "Movement", &mut errors);

    let parsed = match parse_amount(amount) {
        Ok(v) => Some(v),
        Err(message) => {
            errors.push(ValidationError::new("amount", message, "Movement"));
            None
        }
    };

    match (finish(errors), parsed) {
        (Ok(()), Some(amount)) => Ok(amount),
        (Err(errors), _) => Err(errors),
        (Ok(()), None) => Err(vec![ValidationError::new("amount", "is not a number", "Movement")]),
    }
}

pub fn validate_profile_image(image: Option<&str>, errors: &mut Vec<ValidationError>) {
    match image {
        None | Some("") => {
            errors.push(ValidationError::new("profile_image", "can't be blank", "User"))
        }
        Some(image) if !assets::is_profile_image(image) => errors.push(ValidationError::new(
            "profile_image",
            "is not included in the list",
            "User",
        )),
        Some(_) => {}
    }
}

/// Loose shape check: one `@`, non-empty local part, dotted domain, no spaces
pub fn looks_like_email(email: &str) -> bool {
    let mut parts = email.split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => {
            !local.is_empty()
                && !email.chars().any(char::is_whitespace)
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        _ => false,
    }
}

pub fn validate_registration(
    name: Option<&str>,
    email: &str,
    password: &str,
    profile_image: Option<&str>,
) -> ValidationResult {
    let mut errors = Vec::new();
    check_name(name, "User", &mut errors);

    if email.is_empty() {
        errors.push(ValidationError::new("email", "can't be blank", "User"));
    } else if !looks_like_email(email) {
        errors.push(ValidationError::new("email", "is invalid", "User"));
    }

    let pw_len = password.chars().count();
    if pw_len == 0 {
        errors.push(ValidationError::new("password", "can't be blank", "User"));
    } else if pw_len < PASSWORD_MIN_LEN {
        errors.push(ValidationError::new(
            "password",
            format!("is too short (minimum is {} characters)", PASSWORD_MIN_LEN),
            "User",
        ));
    } else if pw_len > PASSWORD_MAX_LEN {
        errors.push(ValidationError::new(
            "password",
            format!("is too long (maximum is {} characters)", PASSWORD_MAX_LEN),
            "User",
        ));
    }

    validate_profile_image(profile_image, &mut errors);
    finish(errors)
}

// ============================================================================
// TESTS
// ============================================================================
