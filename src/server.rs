// 🌐 HTTP Surface - JSON API over the access layer
//
// Handlers stay thin: resolve the principal, pass path parameters through
// untouched, map `AppError` onto a status code. Forbidden and NotFound
// produce byte-identical responses.

use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Path, Request, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use parking_lot::Mutex;
use rusqlite::Connection;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, warn};

use crate::access;
use crate::assets;
use crate::entities::{scalar_text, GroupParams, MovementParams, Principal, User};
use crate::error::{AppError, FormState};
use crate::identity::{self, AccountParams, RegistrationParams};
use crate::validation::ValidationError;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
}

impl AppState {
    pub fn new(conn: Connection) -> Self {
        AppState {
            db: Arc::new(Mutex::new(conn)),
        }
    }
}

// ============================================================================
// RESPONSES
// ============================================================================

/// API Response wrapper
#[derive(Serialize)]
pub struct ApiResponse<T> {
    success: bool,
    data: T,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data,
        })
    }
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<Vec<ValidationError>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    form: Option<FormState>,
}

impl ErrorBody {
    fn new(error: &'static str, message: &str) -> Self {
        ErrorBody {
            success: false,
            error,
            message: message.to_string(),
            errors: None,
            form: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                ErrorBody::new("unauthenticated", "You need to sign in before continuing"),
            ),
            AppError::Forbidden { .. } | AppError::NotFound(_) => {
                warn!(reason = %self, "request blocked");
                (
                    StatusCode::NOT_FOUND,
                    ErrorBody::new("not_found", "The requested resource was not found"),
                )
            }
            AppError::ValidationFailed { errors, form } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorBody {
                    errors: Some(errors),
                    form: Some(form),
                    ..ErrorBody::new("validation_failed", "The submitted data is invalid")
                },
            ),
            AppError::Storage(_) | AppError::Internal(_) => {
                error!(error = %self, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody::new("internal", "Something went wrong"),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

// ============================================================================
// PRINCIPAL EXTRACTION
// ============================================================================

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
}

/// Principal behind the request (anonymous without a valid session)
pub struct CurrentPrincipal {
    pub principal: Principal,
    pub token: Option<String>,
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentPrincipal {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers);
        let principal = {
            let conn = state.db.lock();
            identity::resolve_session(&conn, token.as_deref())?
        };
        Ok(CurrentPrincipal { principal, token })
    }
}

// ============================================================================
// REQUEST BODIES
// ============================================================================

/// JSON request body whose failures come back as `ValidationFailed`
/// rather than axum's plain-text rejection
pub struct FormJson<T>(pub T);

fn body_error(message: impl Into<String>, input: Value) -> AppError {
    AppError::invalid(
        vec![ValidationError::new("base", message, "Request")],
        FormState {
            input,
            group_choices: None,
        },
    )
}

#[async_trait]
impl<T, S> FromRequest<S> for FormJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<Value>::from_request(req, state)
            .await
            .map_err(|rejection| body_error(rejection.body_text(), Value::Null))?;
        if !value.is_object() {
            return Err(body_error("must be a JSON object", Value::Null));
        }

        match T::deserialize(&value) {
            Ok(params) => Ok(FormJson(params)),
            Err(err) => {
                let mut input = value;
                if let Some(fields) = input.as_object_mut() {
                    // Never echoed back
                    fields.remove("password");
                }
                Err(body_error(err.to_string(), input))
            }
        }
    }
}

type ApiResult<T> = Result<T, AppError>;

/// Run CPU-heavy work (password hashing) off the async workers
async fn run_blocking<T, F>(task: F) -> ApiResult<T>
where
    F: FnOnce() -> ApiResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| AppError::Internal(format!("blocking task failed: {}", e)))?
}

// ============================================================================
// HEALTH & ASSETS
// ============================================================================

/// GET /api/health
async fn health_check() -> impl IntoResponse {
    ApiResponse::ok("OK")
}

/// GET /api/icons
async fn list_assets() -> impl IntoResponse {
    ApiResponse::ok(assets::catalog())
}

// ============================================================================
// ACCOUNT HANDLERS
// ============================================================================

#[derive(Deserialize)]
struct ConfirmationRequest {
    #[serde(default, deserialize_with = "scalar_text")]
    token: Option<String>,
}

#[derive(Deserialize)]
struct SignInRequest {
    #[serde(default, deserialize_with = "scalar_text")]
    email: Option<String>,
    #[serde(default, deserialize_with = "scalar_text")]
    password: Option<String>,
}

/// POST /users
async fn register(
    State(state): State<AppState>,
    FormJson(params): FormJson<RegistrationParams>,
) -> ApiResult<impl IntoResponse> {
    let pending = {
        let conn = state.db.lock();
        identity::prepare_registration(&conn, params)?
    };

    let (pending, encrypted_password) = run_blocking(move || {
        let hash = identity::hash_password(pending.password())?;
        Ok((pending, hash))
    })
    .await?;

    let registration = {
        let conn = state.db.lock();
        identity::complete_registration(&conn, pending, &encrypted_password)?
    };

    // Stand-in for the confirmation mail
    debug!(
        user_id = %registration.user.id,
        email = %registration.user.email,
        token = %registration.confirmation_token,
        "confirmation instructions issued"
    );
    Ok((StatusCode::CREATED, ApiResponse::ok(registration.user)))
}

/// POST /users/confirmation
async fn confirm(
    State(state): State<AppState>,
    FormJson(request): FormJson<ConfirmationRequest>,
) -> ApiResult<Json<ApiResponse<User>>> {
    let token = request.token.unwrap_or_default();
    let conn = state.db.lock();
    Ok(ApiResponse::ok(identity::confirm(&conn, &token)?))
}

/// POST /users/sign_in
async fn sign_in(
    State(state): State<AppState>,
    FormJson(request): FormJson<SignInRequest>,
) -> ApiResult<impl IntoResponse> {
    let email = request.email.unwrap_or_default();
    let password = request.password.unwrap_or_default();

    let attempt = {
        let conn = state.db.lock();
        identity::lookup_credentials(&conn, &email)?
    };
    let user = run_blocking(move || attempt.verify(&password)).await?;

    let conn = state.db.lock();
    Ok(ApiResponse::ok(identity::open_session(&conn, &user)?))
}

/// DELETE /users/sign_out
async fn sign_out(
    State(state): State<AppState>,
    current: CurrentPrincipal,
) -> ApiResult<StatusCode> {
    let token = current.token.ok_or(AppError::Unauthenticated)?;
    let conn = state.db.lock();
    identity::sign_out(&conn, &token)?;
    Ok(StatusCode::NO_CONTENT)
}

/// PATCH /users
async fn update_account(
    State(state): State<AppState>,
    current: CurrentPrincipal,
    FormJson(params): FormJson<AccountParams>,
) -> ApiResult<Json<ApiResponse<User>>> {
    let conn = state.db.lock();
    Ok(ApiResponse::ok(identity::update_account(&conn, &current.principal, params)?))
}

/// DELETE /users
async fn destroy_account(
    State(state): State<AppState>,
    current: CurrentPrincipal,
) -> ApiResult<StatusCode> {
    let conn = state.db.lock();
    identity::destroy_account(&conn, &current.principal)?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// GROUP HANDLERS
// ============================================================================

/// GET / - authenticated root
async fn dashboard(
    State(state): State<AppState>,
    current: CurrentPrincipal,
) -> ApiResult<impl IntoResponse> {
    let conn = state.db.lock();
    Ok(ApiResponse::ok(access::list_groups(&current.principal, &conn)?))
}

/// GET /users/:user_id/groups
async fn list_groups(
    State(state): State<AppState>,
    current: CurrentPrincipal,
    Path(user_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    access::check_user_param(&current.principal, &user_id)?;
    let conn = state.db.lock();
    Ok(ApiResponse::ok(access::list_groups(&current.principal, &conn)?))
}

/// POST /users/:user_id/groups
async fn create_group(
    State(state): State<AppState>,
    current: CurrentPrincipal,
    Path(user_id): Path<String>,
    FormJson(params): FormJson<GroupParams>,
) -> ApiResult<impl IntoResponse> {
    access::check_user_param(&current.principal, &user_id)?;
    let conn = state.db.lock();
    let group = access::create_group(&current.principal, &conn, &params)?;
    Ok((StatusCode::CREATED, ApiResponse::ok(group)))
}

/// GET /users/:user_id/groups/:group_id
async fn show_group(
    State(state): State<AppState>,
    current: CurrentPrincipal,
    Path((user_id, group_id)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    access::check_user_param(&current.principal, &user_id)?;
    let conn = state.db.lock();
    Ok(ApiResponse::ok(access::show_group(&current.principal, &conn, &group_id)?))
}

/// PATCH /users/:user_id/groups/:group_id
async fn update_group(
    State(state): State<AppState>,
    current: CurrentPrincipal,
    Path((user_id, group_id)): Path<(String, String)>,
    FormJson(params): FormJson<GroupParams>,
) -> ApiResult<impl IntoResponse> {
    access::check_user_param(&current.principal, &user_id)?;
    let conn = state.db.lock();
    Ok(ApiResponse::ok(access::update_group(&current.principal, &conn, &group_id, &params)?))
}

/// DELETE /users/:user_id/groups/:group_id
async fn destroy_group(
    State(state): State<AppState>,
    current: CurrentPrincipal,
    Path((user_id, group_id)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    access::check_user_param(&current.principal, &user_id)?;
    let conn = state.db.lock();
    access::destroy_group(&current.principal, &conn, &group_id)?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// MOVEMENT HANDLERS
// ============================================================================

/// POST /users/:user_id/groups/:group_id/movements
async fn create_movement(
    State(state): State<AppState>,
    current: CurrentPrincipal,
    Path((user_id, group_id)): Path<(String, String)>,
    FormJson(params): FormJson<MovementParams>,
) -> ApiResult<impl IntoResponse> {
    access::check_user_param(&current.principal, &user_id)?;
    let conn = state.db.lock();
    let movement = access::create_movement(&current.principal, &conn, &group_id, &params)?;
    Ok((StatusCode::CREATED, ApiResponse::ok(movement)))
}

/// GET /users/:user_id/groups/:group_id/movements/:id
async fn show_movement(
    State(state): State<AppState>,
    current: CurrentPrincipal,
    Path((user_id, group_id, movement_id)): Path<(String, String, String)>,
) -> ApiResult<impl IntoResponse> {
    access::check_user_param(&current.principal, &user_id)?;
    let conn = state.db.lock();
    Ok(ApiResponse::ok(access::find_owned_movement(
        &current.principal,
        &conn,
        &group_id,
        &movement_id,
    )?))
}

/// PATCH /users/:user_id/groups/:group_id/movements/:id
async fn update_movement(
    State(state): State<AppState>,
    current: CurrentPrincipal,
    Path((user_id, group_id, movement_id)): Path<(String, String, String)>,
    FormJson(params): FormJson<MovementParams>,
) -> ApiResult<impl IntoResponse> {
    access::check_user_param(&current.principal, &user_id)?;
    let conn = state.db.lock();
    Ok(ApiResponse::ok(access::update_movement(
        &current.principal,
        &conn,
        &group_id,
        &movement_id,
        &params,
    )?))
}

/// DELETE /users/:user_id/groups/:group_id/movements/:id
async fn destroy_movement(
    State(state): State<AppState>,
    current: CurrentPrincipal,
    Path((user_id, group_id, movement_id)): Path<(String, String, String)>,
) -> ApiResult<StatusCode> {
    access::check_user_param(&current.principal, &user_id)?;
    let conn = state.db.lock();
    access::destroy_movement(&current.principal, &conn, &group_id, &movement_id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /movements/new - groups to pick from
async fn new_movement(
    State(state): State<AppState>,
    current: CurrentPrincipal,
) -> ApiResult<impl IntoResponse> {
    let conn = state.db.lock();
    Ok(ApiResponse::ok(access::movement_form(&current.principal, &conn)?))
}

/// POST /movements - create in a group picked from the form
async fn create_selected_movement(
    State(state): State<AppState>,
    current: CurrentPrincipal,
    body: Result<FormJson<MovementParams>, AppError>,
) -> ApiResult<impl IntoResponse> {
    let conn = state.db.lock();
    // A rejected body still gets the group choices for re-rendering
    let params = match body {
        Ok(FormJson(params)) => params,
        Err(AppError::ValidationFailed { errors, form }) => {
            let choices = access::group_choices(&current.principal, &conn)?;
            return Err(AppError::invalid(errors, form.with_group_choices(choices)));
        }
        Err(other) => return Err(other),
    };
    let movement = access::create_movement_in_selected_group(&current.principal, &conn, &params)?;
    Ok((StatusCode::CREATED, ApiResponse::ok(movement)))
}

// ============================================================================
// ROUTER
// ============================================================================

pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/icons", get(list_assets));

    Router::new()
        .route("/", get(dashboard))
        .route("/users", post(register).patch(update_account).delete(destroy_account))
        .route("/users/confirmation", post(confirm))
        .route("/users/sign_in", post(sign_in))
        .route("/users/sign_out", delete(sign_out))
        .route("/users/:user_id/groups", get(list_groups).post(create_group))
        .route(
            "/users/:user_id/groups/:group_id",
            get(show_group).patch(update_group).delete(destroy_group),
        )
        .route("/users/:user_id/groups/:group_id/movements", post(create_movement))
        .route(
            "/users/:user_id/groups/:group_id/movements/:id",
            get(show_movement).patch(update_movement).delete(destroy_movement),
        )
        .route("/movements/new", get(new_movement))
        .route("/movements", post(create_selected_movement))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ============================================================================
// TESTS
// ============================================================================
