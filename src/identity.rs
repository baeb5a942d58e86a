// 🪪 Identity - registration, confirmation, sessions
//
// The rest of the crate only ever sees the `Principal` this module hands out.
// Passwords are stored as Argon2 PHC strings; confirmation and session tokens
// are random UUIDs of which only the SHA-256 digest is persisted.

use argon2::password_hash::{
    rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use argon2::Argon2;
use chrono::Utc;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::OnceLock;
use tracing::{info, warn};

use crate::ability::{Ability, Action, ResourceKind};
use crate::db;
use crate::entities::{new_id, scalar_text, Principal, User};
use crate::error::{AppError, FormState, Result};
use crate::validation::{self, ValidationError};

// ============================================================================
// INPUT / OUTPUT
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistrationParams {
    #[serde(default, deserialize_with = "scalar_text")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "scalar_text")]
    pub email: Option<String>,
    #[serde(default, skip_serializing, deserialize_with = "scalar_text")]
    pub password: Option<String>,
    #[serde(default, deserialize_with = "scalar_text")]
    pub profile_image: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountParams {
    #[serde(default, deserialize_with = "scalar_text")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "scalar_text")]
    pub profile_image: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub user: User,
    /// Delivered out of band (email); redeemed with `confirm`
    pub confirmation_token: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub token: String,
    pub user: User,
}

// ============================================================================
// TOKENS & PASSWORDS
// ============================================================================

fn generate_token() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

pub fn token_digest(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Argon2 PHC string for `password`. CPU-bound: callers on an async runtime
/// run it off the request thread.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("password hashing failed: {}", e)))
}

fn verify_password(password: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Verified against when the email is unknown, so both branches cost one Argon2 run
fn dummy_hash() -> &'static str {
    static DUMMY_HASH: OnceLock<String> = OnceLock::new();
    DUMMY_HASH.get_or_init(|| hash_password("no account behind this").unwrap_or_default())
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

// ============================================================================
// REGISTRATION & CONFIRMATION
// ============================================================================

/// Registration input that passed validation and awaits its password hash
#[derive(Debug)]
pub struct PendingRegistration {
    params: RegistrationParams,
    user: User,
}

impl PendingRegistration {
    pub fn password(&self) -> &str {
        self.params.password.as_deref().unwrap_or("")
    }
}

fn email_taken_error(params: &RegistrationParams) -> AppError {
    AppError::invalid(
        vec![ValidationError::new("email", "has already been taken", "User")],
        FormState::from_input(params),
    )
}

/// Validate a registration. Nothing is written yet.
pub fn prepare_registration(
    conn: &Connection,
    params: RegistrationParams,
) -> Result<PendingRegistration> {
    let email = normalize_email(params.email.as_deref().unwrap_or(""));
    let password = params.password.as_deref().unwrap_or("");
    let name = params.name.as_deref().map(str::trim);

    let mut errors = match validation::validate_registration(
        name,
        &email,
        password,
        params.profile_image.as_deref(),
    ) {
        Ok(()) => Vec::new(),
        Err(errors) => errors,
    };
    if !email.is_empty() && db::email_taken(conn, &email)? {
        errors.push(ValidationError::new("email", "has already been taken", "User"));
    }
    if !errors.is_empty() {
        return Err(AppError::invalid(errors, FormState::from_input(&params)));
    }

    let user = User {
        id: new_id(),
        name: name.unwrap_or_default().to_string(),
        email,
        profile_image: params.profile_image.clone().unwrap_or_default(),
        confirmed_at: None,
        created_at: Utc::now(),
    };
    Ok(PendingRegistration { params, user })
}

/// Persist a prepared registration with its password hash.
///
/// The email is checked again: another registration may have claimed it
/// while the hash was being computed.
pub fn complete_registration(
    conn: &Connection,
    pending: PendingRegistration,
    encrypted_password: &str,
) -> Result<Registration> {
    let PendingRegistration { params, user } = pending;
    if db::email_taken(conn, &user.email)? {
        return Err(email_taken_error(&params));
    }

    let confirmation_token = generate_token();
    db::insert_user(
        conn,
        &user,
        encrypted_password,
        Some(&token_digest(&confirmation_token)),
    )?;

    info!(user_id = %user.id, "registered account awaiting confirmation");
    Ok(Registration {
        user,
        confirmation_token,
    })
}

/// Create an unconfirmed account
pub fn register(conn: &Connection, params: RegistrationParams) -> Result<Registration> {
    let pending = prepare_registration(conn, params)?;
    let encrypted_password = hash_password(pending.password())?;
    complete_registration(conn, pending, &encrypted_password)
}

/// Redeem a confirmation token
pub fn confirm(conn: &Connection, token: &str) -> Result<User> {
    let user_id = db::confirm_user(conn, &token_digest(token), &Utc::now())?
        .ok_or(AppError::NotFound("confirmation token"))?;
    let user = db::user_by_id(conn, &user_id)?.ok_or(AppError::NotFound("user"))?;

    info!(user_id = %user.id, "account confirmed");
    Ok(user)
}

// ============================================================================
// SESSIONS
// ============================================================================

/// Stored credentials for one sign-in, looked up ahead of the password check
#[derive(Debug)]
pub struct SignInAttempt {
    found: Option<(User, String)>,
}

pub fn lookup_credentials(conn: &Connection, email: &str) -> Result<SignInAttempt> {
    let found = db::user_credentials(conn, &normalize_email(email))?;
    Ok(SignInAttempt { found })
}

impl SignInAttempt {
    /// Check the password. Unknown email, wrong password and unconfirmed
    /// account all fail the same way.
    pub fn verify(self, password: &str) -> Result<User> {
        let Some((user, stored)) = self.found else {
            verify_password(password, dummy_hash());
            warn!("sign-in for unknown email");
            return Err(AppError::Unauthenticated);
        };

        if !verify_password(password, &stored) {
            warn!(user_id = %user.id, "sign-in with wrong password");
            return Err(AppError::Unauthenticated);
        }
        if !user.is_confirmed() {
            warn!(user_id = %user.id, "sign-in before confirmation");
            return Err(AppError::Unauthenticated);
        }
        Ok(user)
    }
}

/// Issue a session token for a verified user
pub fn open_session(conn: &Connection, user: &User) -> Result<Session> {
    let token = generate_token();
    db::insert_session(conn, &token_digest(&token), &user.id, &Utc::now())?;

    info!(user_id = %user.id, "session opened");
    Ok(Session {
        token,
        user: user.clone(),
    })
}

/// Verify credentials and open a session
pub fn sign_in(conn: &Connection, email: &str, password: &str) -> Result<Session> {
    let user = lookup_credentials(conn, email)?.verify(password)?;
    open_session(conn, &user)
}

/// Principal behind a session token; anonymous when missing or unknown
pub fn resolve_session(conn: &Connection, token: Option<&str>) -> Result<Principal> {
    let Some(token) = token.filter(|t| !t.is_empty()) else {
        return Ok(Principal::Anonymous);
    };

    match db::session_user(conn, &token_digest(token))? {
        Some(user) if user.is_confirmed() => Ok(Principal::User(user)),
        _ => Ok(Principal::Anonymous),
    }
}

pub fn sign_out(conn: &Connection, token: &str) -> Result<()> {
    if db::delete_session(conn, &token_digest(token))? {
        info!("session closed");
    }
    Ok(())
}

// ============================================================================
// ACCOUNT
// ============================================================================

/// Change display name and/or profile image
pub fn update_account(
    conn: &Connection,
    principal: &Principal,
    params: AccountParams,
) -> Result<User> {
    let current = principal.require_user()?;
    Ability::for_principal(principal).authorize(Action::Update, ResourceKind::User, &current.id)?;

    let mut updated = current.clone();
    if let Some(name) = &params.name {
        updated.name = name.trim().to_string();
    }
    if let Some(image) = &params.profile_image {
        updated.profile_image = image.clone();
    }

    let mut errors = Vec::new();
    validation::check_name(Some(&updated.name), "User", &mut errors);
    validation::validate_profile_image(Some(&updated.profile_image), &mut errors);
    if !errors.is_empty() {
        return Err(AppError::invalid(errors, FormState::from_input(&params)));
    }

    db::update_user_profile(conn, &updated)?;
    info!(user_id = %updated.id, "account updated");
    Ok(updated)
}

/// Delete the principal's account with everything it owns
pub fn destroy_account(conn: &Connection, principal: &Principal) -> Result<()> {
    let user = principal.require_user()?;
    Ability::for_principal(principal).authorize(Action::Destroy, ResourceKind::User, &user.id)?;

    if !db::delete_user_cascade(conn, &user.id)? {
        return Err(AppError::NotFound("user"));
    }
    info!(user_id = %user.id, "account destroyed");
    Ok(())
}

// ============================================================================
// ADMINISTRATION (CLI)
// ============================================================================

pub fn confirm_by_email(conn: &Connection, email: &str) -> Result<User> {
    let user = db::user_by_email(conn, &normalize_email(email))?.ok_or(AppError::NotFound("user"))?;
    db::force_confirm_user(conn, &user.id, &Utc::now())?;
    db::user_by_id(conn, &user.id)?.ok_or(AppError::NotFound("user"))
}

pub fn destroy_by_email(conn: &Connection, email: &str) -> Result<User> {
    let user = db::user_by_email(conn, &normalize_email(email))?.ok_or(AppError::NotFound("user"))?;
    db::delete_user_cascade(conn, &user.id)?;
    Ok(user)
}

/// Every account with its group count
pub fn list_accounts(conn: &Connection) -> Result<Vec<(User, i64)>> {
    db::list_users(conn)
}

// ============================================================================
// TESTS
// ============================================================================
