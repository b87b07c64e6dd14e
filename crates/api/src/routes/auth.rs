//! Account routes: registration, login and email validation

use axum::{
    extract::{Extension, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Form, Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    auth::{
        hash_password, tokens, validate_password_strength, verify_password, TokenError,
    },
    error::{ApiError, ApiResult},
    forms::{FormErrors, FormSuccess},
    routing::HostDetails,
    state::AppState,
};

pub const REQUIRED_MESSAGE: &str = "This field is required.";
pub const USERNAME_TAKEN_MESSAGE: &str = "Please choose a different username";
pub const INVALID_USERNAME_MESSAGE: &str = "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.";
pub const INVALID_EMAIL_MESSAGE: &str = "Enter a valid email address.";
pub const EMAIL_TAKEN_MESSAGE: &str = "Email is already in use";
pub const PASSWORD_MISMATCH_MESSAGE: &str = "The two password fields didn't match.";
pub const LOGIN_FAILED_MESSAGE: &str = "Login Failed";
pub const NO_TOKEN_MESSAGE: &str = "The URL is invalid. No token.";
pub const INVALID_TOKEN_MESSAGE: &str = "Invalid token";

const USERNAME_MAX_LENGTH: usize = 150;

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password1: String,
    pub password2: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ValidateQuery {
    pub token: Option<String>,
}

/// Error page payload, served with a 200 status
#[derive(Debug, Serialize)]
pub struct ErrorPage {
    pub result: &'static str,
    pub error: &'static str,
}

impl ErrorPage {
    fn new(error: &'static str) -> Self {
        Self {
            result: "failed",
            error,
        }
    }
}

#[derive(sqlx::FromRow)]
struct LoginRow {
    id: Uuid,
    username: String,
    email: String,
    password_hash: String,
}

// =============================================================================
// Validation helpers
// =============================================================================

fn is_valid_username(username: &str) -> bool {
    username
        .chars()
        .all(|c| c.is_alphanumeric() || "@.+-_".contains(c))
}

/// Structural email check: one `@`, sane local part, dotted domain with an
/// alphabetic TLD
pub fn is_valid_email(email: &str) -> bool {
    if email.len() > 254 {
        return false;
    }

    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if domain.contains('@') {
        return false;
    }

    // Local part
    if local.is_empty() || local.len() > 64 {
        return false;
    }
    if local.starts_with('.') || local.ends_with('.') || local.contains("..") {
        return false;
    }
    if !local
        .chars()
        .all(|c| c.is_alphanumeric() || ".+-_".contains(c))
    {
        return false;
    }

    // Domain
    if domain.is_empty() || domain.len() > 255 {
        return false;
    }
    if domain.starts_with('-') || domain.ends_with('-') {
        return false;
    }
    if domain.starts_with('.') || domain.ends_with('.') || domain.contains("..") {
        return false;
    }
    if !domain
        .chars()
        .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        return false;
    }

    match domain.rsplit_once('.') {
        Some((_, tld)) => tld.len() >= 2 && tld.chars().all(char::is_alphabetic),
        None => false,
    }
}

/// Field checks that need no database access
fn check_registration(req: &RegisterRequest) -> FormErrors {
    let mut errors = FormErrors::new();

    let username = req.username.trim();
    if username.is_empty() {
        errors.add("username", REQUIRED_MESSAGE);
    } else if username.chars().count() > USERNAME_MAX_LENGTH || !is_valid_username(username) {
        errors.add("username", INVALID_USERNAME_MESSAGE);
    }

    let email = req.email.trim();
    if email.is_empty() {
        errors.add("email", REQUIRED_MESSAGE);
    } else if !is_valid_email(email) {
        errors.add("email", INVALID_EMAIL_MESSAGE);
    }

    if req.password1.is_empty() {
        errors.add("password1", REQUIRED_MESSAGE);
    }
    if req.password2.is_empty() {
        errors.add("password2", REQUIRED_MESSAGE);
    }
    if !req.password1.is_empty() && !req.password2.is_empty() {
        if req.password1 != req.password2 {
            errors.add("password2", PASSWORD_MISMATCH_MESSAGE);
        } else {
            for problem in validate_password_strength(&req.password1) {
                errors.add("password1", problem.to_string());
            }
        }
    }

    errors
}

/// Map a unique violation on `users` to the field it concerns
fn registration_conflict(err: sqlx::Error) -> ApiError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            let mut errors = FormErrors::new();
            match db_err.constraint() {
                Some(constraint) if constraint.contains("email") => {
                    errors.add("email", EMAIL_TAKEN_MESSAGE)
                }
                _ => errors.add("username", USERNAME_TAKEN_MESSAGE),
            }
            return ApiError::Form(errors);
        }
    }
    err.into()
}

// =============================================================================
// Handlers
// =============================================================================

/// Register a new account and send the validation email
pub async fn register(
    State(state): State<AppState>,
    Extension(host): Extension<HostDetails>,
    Form(req): Form<RegisterRequest>,
) -> ApiResult<Json<FormSuccess>> {
    if !state.config.enable_signup {
        return Err(FormErrors::non_field("Registration is currently disabled").into());
    }

    let mut errors = check_registration(&req);
    let username = req.username.trim();
    let email = req.email.trim().to_lowercase();

    if !errors.has("username") {
        let taken: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE username = $1)")
                .bind(username)
                .fetch_one(&state.pool)
                .await?;
        if taken {
            errors.add("username", USERNAME_TAKEN_MESSAGE);
        }
    }
    if !errors.has("email") {
        let taken: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
            .bind(&email)
            .fetch_one(&state.pool)
            .await?;
        if taken {
            errors.add("email", EMAIL_TAKEN_MESSAGE);
        }
    }
    errors.into_result()?;

    let password_hash = hash_password(&req.password1)?;

    let mut tx = state.pool.begin().await?;

    let user_id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO users (username, email, password_hash)
        VALUES ($1, $2, $3)
        RETURNING id
        "#,
    )
    .bind(username)
    .bind(&email)
    .bind(&password_hash)
    .fetch_one(&mut *tx)
    .await
    .map_err(registration_conflict)?;

    let token = tokens::create_validation(&mut *tx, user_id).await?;

    // A failed delivery rolls the account back
    state
        .mailer
        .send_registration(&email, username, &host.canonical_url, &token)
        .await?;

    tx.commit().await?;

    let access_token = state
        .jwt_manager
        .generate_access_token(user_id, username, &email)?;

    tracing::info!(user_id = %user_id, username = %username, "User registered");

    Ok(Json(
        FormSuccess::redirect("/user_cp").with_access_token(access_token),
    ))
}

/// Log in with username and password
pub async fn login(
    State(state): State<AppState>,
    Form(req): Form<LoginRequest>,
) -> ApiResult<Json<FormSuccess>> {
    // Keep response time independent of whether the user exists
    let start = std::time::Instant::now();
    const MIN_RESPONSE_TIME: std::time::Duration = std::time::Duration::from_millis(250);

    let result = login_inner(&state, &req).await;

    let elapsed = start.elapsed();
    if elapsed < MIN_RESPONSE_TIME {
        tokio::time::sleep(MIN_RESPONSE_TIME - elapsed).await;
    }

    result
}

/// Log in from the inline login form
pub async fn login_form(
    state: State<AppState>,
    form: Form<LoginRequest>,
) -> ApiResult<Json<FormSuccess>> {
    login(state, form).await
}

async fn login_inner(state: &AppState, req: &LoginRequest) -> ApiResult<Json<FormSuccess>> {
    let failed = || ApiError::Form(FormErrors::non_field(LOGIN_FAILED_MESSAGE));

    let username = req.username.trim();
    if username.is_empty() || req.password.is_empty() {
        return Err(failed());
    }

    let user: Option<LoginRow> = sqlx::query_as(
        "SELECT id, username, email, password_hash FROM users WHERE username = $1",
    )
    .bind(username)
    .fetch_optional(&state.pool)
    .await?;

    let Some(user) = user else {
        tracing::warn!(username = %username, "login: User not found");
        return Err(failed());
    };

    if !verify_password(&req.password, &user.password_hash)? {
        tracing::warn!(user_id = %user.id, "login: Wrong password");
        return Err(failed());
    }

    let access_token = state
        .jwt_manager
        .generate_access_token(user.id, &user.username, &user.email)?;

    tracing::info!(user_id = %user.id, "login: Success");
    Ok(Json(FormSuccess::redirect("/").with_access_token(access_token)))
}

/// Validate an email address from the emailed link
pub async fn validate(
    State(state): State<AppState>,
    Query(query): Query<ValidateQuery>,
) -> ApiResult<Response> {
    let Some(token) = query.token.filter(|token| !token.is_empty()) else {
        return Ok((StatusCode::OK, Json(ErrorPage::new(NO_TOKEN_MESSAGE))).into_response());
    };

    match tokens::consume_token(&state.pool, &token).await {
        Ok(_) => Ok(Redirect::to("/user_cp").into_response()),
        Err(TokenError::InvalidToken) => {
            tracing::warn!("validate: Unknown token");
            Ok((StatusCode::OK, Json(ErrorPage::new(INVALID_TOKEN_MESSAGE))).into_response())
        }
        Err(TokenError::Database(e)) => Err(e.into()),
    }
}
