use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    async_trait,
    body::Body,
    extract::{FromRequestParts, State},
    http::{request::Parts, HeaderMap, Request, StatusCode},
    middleware::Next,
    response::Response,
    Json,
};
use rand::Rng;
use serde_json::json;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use subtle::ConstantTimeEq;

use crate::access::validation::{validate_email, validate_password};
use crate::access::{AccessError, Identity, Mutation, Role};
use crate::config::{AuthConfig, Config};
use crate::db::{
    actions, delete_session, find_active_session, find_employee_by_owner, find_user_by_email,
    find_user_by_id, insert_session, insert_user, load_snapshot, normalize_email,
    resource_types, CreateEmployeeRequest, DbPool, LoginRequest, LoginResponse, RegisterRequest,
    User, UserResponse,
};
use crate::AppState;

use super::audit::audit_log;
use super::error::{ApiError, ValidationErrorBuilder};
use super::extract::ApiJson;
use super::response::ApiResponse;
use super::view::commit_mutation;

/// Id of the synthetic admin behind the static API token
pub const SYSTEM_USER_ID: &str = "system";

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2.hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a password against a hash
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Generate a random token
fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();
    hex::encode(bytes)
}

/// Hash a token for storage
fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Extract the token from request headers
fn extract_token(headers: &HeaderMap) -> Option<String> {
    // Try Authorization header first
    if let Some(auth_header) = headers.get("Authorization").and_then(|h| h.to_str().ok()) {
        if let Some(token) = auth_header.strip_prefix("Bearer ") {
            return Some(token.trim().to_string());
        }
    }

    // Fall back to X-API-Key header
    headers
        .get("X-API-Key")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string())
}

/// Constant-time comparison against the configured static token
fn matches_api_token(config: &Config, token: &str) -> bool {
    let Some(api_token) = config.auth.api_token.as_deref() else {
        return false;
    };
    let expected = api_token.as_bytes();
    let provided = token.as_bytes();

    // Only compare if lengths match (constant-time check)
    !expected.is_empty() && expected.len() == provided.len() && expected.ct_eq(provided).into()
}

fn system_identity() -> Identity {
    Identity {
        id: SYSTEM_USER_ID.to_string(),
        email: "system@taskdesk.local".to_string(),
        name: "System Admin".to_string(),
        role: Role::Admin,
        employee_id: None,
    }
}

/// Identity of an account, with its linked employee profile resolved
async fn identity_for_user(pool: &DbPool, user: &User) -> Result<Identity, ApiError> {
    let employee = find_employee_by_owner(pool, &user.id).await?;
    Ok(user.identity(employee.map(|e| e.id)))
}

/// Get the current identity from a token
pub async fn get_current_identity(
    pool: &DbPool,
    config: &Config,
    token: &str,
) -> Result<Identity, ApiError> {
    if matches_api_token(config, token) {
        return Ok(system_identity());
    }

    // Look up session and user
    let token_hash = hash_token(token);
    let session = find_active_session(pool, &token_hash)
        .await?
        .ok_or(AccessError::Authentication)?;

    let user = find_user_by_id(pool, &session.user_id)
        .await?
        .ok_or(AccessError::Authentication)?;

    identity_for_user(pool, &user).await
}

/// Create a session for `user` and return the bearer token
async fn open_session(pool: &DbPool, auth: &AuthConfig, user: &User) -> Result<String, ApiError> {
    let token = generate_token();
    let token_hash = hash_token(&token);

    let expires_at = chrono::Utc::now()
        .checked_add_signed(chrono::Duration::days(auth.session_ttl_days))
        .ok_or_else(|| ApiError::internal("Session expiry out of range"))?
        .to_rfc3339();

    insert_session(pool, &user.id, &token_hash, &expires_at).await?;
    Ok(token)
}

/// Auth middleware that resolves the caller and stores the identity in the
/// request extensions for the [`Identity`] extractor
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_token(request.headers()).ok_or(AccessError::Authentication)?;
    let identity = get_current_identity(&state.db, &state.config, &token).await?;
    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

/// Extractor for getting the current authenticated identity from a request
#[async_trait]
impl FromRequestParts<Arc<AppState>> for Identity {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        if let Some(identity) = parts.extensions.get::<Identity>() {
            return Ok(identity.clone());
        }
        let token = extract_token(&parts.headers).ok_or(AccessError::Authentication)?;
        get_current_identity(&state.db, &state.config, &token).await
    }
}

/// Register endpoint: creates a `user` account, its employee profile and a session
pub async fn register(
    State(state): State<Arc<AppState>>,
    ApiJson(request): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<LoginResponse>), ApiError> {
    let name = request.name.trim().to_string();
    let email = normalize_email(&request.email);

    let mut errors = ValidationErrorBuilder::new();
    if name.is_empty() {
        errors.add("name", "Name is required");
    }
    errors.check("email", validate_email(&email));
    errors.check(
        "password",
        validate_password(&request.password, state.config.auth.min_password_length),
    );
    errors.finish()?;

    if find_user_by_email(&state.db, &email).await?.is_some() {
        return Err(ApiError::conflict("An account with this email already exists"));
    }

    let password_hash = hash_password(&request.password)
        .map_err(|e| ApiError::internal(format!("Failed to hash password: {}", e)))?;
    let user = insert_user(&state.db, &email, &password_hash, &name, Role::User).await?;

    tracing::info!(user_id = %user.id, "Registered new account");
    audit_log(
        &state,
        actions::AUTH_REGISTER,
        resource_types::USER,
        Some(&user.id),
        Some(&user.id),
        None,
    )
    .await;

    if state.config.auth.create_profile_on_register {
        // Self-registration goes through the gateway like any other create.
        let identity = user.identity(None);
        let profile = CreateEmployeeRequest {
            name: Some(name.clone()),
            email: Some(email.clone()),
            ..Default::default()
        };
        let snapshot = load_snapshot(&state.db).await?;
        if let Err(e) = commit_mutation(
            &state,
            &identity,
            Mutation::CreateEmployee(&profile),
            &snapshot,
            Some(json!({ "source": "register" })),
        )
        .await
        {
            // The account stays usable; the client will prompt for a profile.
            tracing::warn!(user_id = %user.id, error = %e, "Failed to create profile on register");
        }
    }

    let token = open_session(&state.db, &state.config.auth, &user).await?;
    let identity = identity_for_user(&state.db, &user).await?;

    Ok((
        StatusCode::CREATED,
        Json(LoginResponse {
            success: true,
            token,
            user: UserResponse::from(identity),
        }),
    ))
}

/// Login endpoint
pub async fn login(
    State(state): State<Arc<AppState>>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let user = find_user_by_email(&state.db, &request.email)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid credentials"))?;

    // Verify password
    if !verify_password(&request.password, &user.password_hash) {
        return Err(ApiError::unauthorized("Invalid credentials"));
    }

    let token = open_session(&state.db, &state.config.auth, &user).await?;
    let identity = identity_for_user(&state.db, &user).await?;

    audit_log(
        &state,
        actions::AUTH_LOGIN,
        resource_types::USER,
        Some(&user.id),
        Some(&user.id),
        None,
    )
    .await;

    Ok(Json(LoginResponse {
        success: true,
        token,
        user: UserResponse::from(identity),
    }))
}

/// Current identity
///
/// GET /api/auth/me
pub async fn me(identity: Identity) -> Json<ApiResponse<UserResponse>> {
    Json(ApiResponse::ok(UserResponse::from(identity)))
}

/// Delete the caller's session
///
/// POST /api/auth/logout
pub async fn logout(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let token = extract_token(&headers).ok_or(AccessError::Authentication)?;
    let removed = delete_session(&state.db, &hash_token(&token)).await?;

    if removed > 0 {
        audit_log(
            &state,
            actions::AUTH_LOGOUT,
            resource_types::USER,
            Some(&identity.id),
            Some(&identity.id),
            None,
        )
        .await;
    }

    Ok(Json(ApiResponse::ok(json!({ "loggedOut": removed > 0 }))))
}

/// Create the configured bootstrap admin account if it does not exist yet
pub async fn ensure_admin_user(pool: &DbPool, auth: &AuthConfig) -> anyhow::Result<()> {
    let (Some(email), Some(password)) = (auth.admin_email.as_deref(), auth.admin_password.as_deref())
    else {
        return Ok(());
    };

    let email = normalize_email(email);
    if let Some(existing) = find_user_by_email(pool, &email).await? {
        if !existing.role_enum().is_admin() {
            tracing::warn!(
                email = %email,
                "Configured admin email belongs to a non-admin account"
            );
        }
        return Ok(());
    }

    let password_hash = hash_password(password)
        .map_err(|e| anyhow::anyhow!("Failed to hash admin password: {}", e))?;
    insert_user(pool, &email, &password_hash, &auth.admin_name, Role::Admin).await?;

    tracing::info!("Created admin user: {}", email);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hash_round_trip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
        assert!(!verify_password("correct horse", "not-a-hash"));
    }

    #[test]
    fn test_tokens_are_random_hex() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
        assert_eq!(hash_token(&a), hash_token(&a));
        assert_ne!(hash_token(&a), a);
    }

    #[test]
    fn test_extract_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_token(&headers), None);

        headers.insert("X-API-Key", "key123".parse().unwrap());
        assert_eq!(extract_token(&headers).as_deref(), Some("key123"));

        headers.insert("Authorization", "Bearer abc".parse().unwrap());
        assert_eq!(extract_token(&headers).as_deref(), Some("abc"));
    }

    #[test]
    fn test_api_token_requires_configuration() {
        let mut config = Config::default();
        assert!(!matches_api_token(&config, ""));
        assert!(!matches_api_token(&config, "anything"));

        config.auth.api_token = Some("s3cret".to_string());
        assert!(matches_api_token(&config, "s3cret"));
        assert!(!matches_api_token(&config, "s3cre"));
        assert!(!matches_api_token(&config, "s3cret!"));
    }
}
