/*!
 * # Authentication and Authorization
 *
 * HS256 access tokens, argon2 password hashes and role guards.
 *
 * Every authenticated request carries an [`AuthUser`] in its extensions. Route
 * groups are protected with [`AuthRouterExt::with_roles`], and list operations
 * narrow their results with the caller's [`Scope`].
 */

use crate::config::AppConfig;
use crate::entities::user;
use crate::errors::{ErrorResponse, ServiceError};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use axum::{
    async_trait,
    extract::{DefaultBodyLimit, FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{decode, encode, Algorithm as JwtAlgorithm, DecodingKey, EncodingKey, Header, Validation};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

mod roles;

pub use roles::{role_allowed, Role, Scope};

/// Claim structure for JWT tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supplier_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver_id: Option<Uuid>,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
    pub nbf: i64,
    pub iss: String,
    pub aud: String,
}

/// Authenticated caller extracted from the bearer token
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub supplier_id: Option<Uuid>,
    pub driver_id: Option<Uuid>,
}

impl AuthUser {
    /// Tenant filter for this caller
    pub fn scope(&self) -> Result<Scope, ServiceError> {
        Scope::for_role(self.role, self.user_id, self.supplier_id, self.driver_id)
    }
}

impl TryFrom<Claims> for AuthUser {
    type Error = AuthError;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?;
        Ok(AuthUser {
            user_id,
            email: claims.email,
            name: claims.name,
            role: claims.role,
            supplier_id: claims.supplier_id,
            driver_id: claims.driver_id,
        })
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or(AuthError::MissingAuth)
    }
}

/// Authentication configuration
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_audience: String,
    pub jwt_issuer: String,
    pub access_token_expiration: Duration,
    /// Argon2 memory cost in KiB
    pub hash_memory_kib: u32,
    pub hash_iterations: u32,
}

impl AuthConfig {
    pub fn new(
        jwt_secret: String,
        jwt_audience: String,
        jwt_issuer: String,
        access_token_expiration: Duration,
    ) -> Self {
        Self {
            jwt_secret,
            jwt_audience,
            jwt_issuer,
            access_token_expiration,
            hash_memory_kib: Params::DEFAULT_M_COST,
            hash_iterations: Params::DEFAULT_T_COST,
        }
    }

    /// Overrides the argon2 cost parameters
    pub fn with_hash_cost(mut self, memory_kib: u32, iterations: u32) -> Self {
        self.hash_memory_kib = memory_kib;
        self.hash_iterations = iterations;
        self
    }
}

impl From<&AppConfig> for AuthConfig {
    fn from(cfg: &AppConfig) -> Self {
        AuthConfig::new(
            cfg.jwt_secret.clone(),
            cfg.auth_audience.clone(),
            cfg.auth_issuer.clone(),
            Duration::from_secs(cfg.jwt_expiration),
        )
    }
}

/// Token response returned by login and registration
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: AuthUser,
}

/// Login credentials
#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct LoginCredentials {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

/// Public sign-up; always creates a `client` account
#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
}

/// Authentication error types
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing authentication")]
    MissingAuth,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Token creation failed: {0}")]
    TokenCreation(String),

    #[error("Insufficient permissions")]
    InsufficientPermissions,

    #[error(transparent)]
    Service(#[from] ServiceError),
}

impl AuthError {
    fn code(&self) -> &'static str {
        match self {
            Self::MissingAuth => "AUTH_MISSING",
            Self::InvalidCredentials => "AUTH_INVALID_CREDENTIALS",
            Self::InvalidToken => "AUTH_INVALID_TOKEN",
            Self::TokenExpired => "AUTH_TOKEN_EXPIRED",
            Self::TokenCreation(_) => "AUTH_TOKEN_CREATION_FAILED",
            Self::InsufficientPermissions => "AUTH_INSUFFICIENT_PERMISSIONS",
            Self::Service(_) => "AUTH_SERVICE_ERROR",
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match self {
            Self::Service(err) => return err.into_response(),
            Self::MissingAuth
            | Self::InvalidCredentials
            | Self::InvalidToken
            | Self::TokenExpired => StatusCode::UNAUTHORIZED,
            Self::InsufficientPermissions => StatusCode::FORBIDDEN,
            Self::TokenCreation(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = match &self {
            Self::TokenCreation(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };

        let body = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message,
            details: Some(self.code().to_string()),
            request_id: crate::tracing::current_request_id().map(|id| id.to_string()),
            timestamp: Utc::now().to_rfc3339(),
        };

        (status, Json(body)).into_response()
    }
}

/// Issues and validates tokens, hashes passwords and authenticates logins
#[derive(Debug, Clone)]
pub struct AuthService {
    pub config: AuthConfig,
    pub db: Arc<DatabaseConnection>,
}

impl AuthService {
    pub fn new(config: AuthConfig, db: Arc<DatabaseConnection>) -> Self {
        Self { config, db }
    }

    fn hasher(&self) -> Result<Argon2<'static>, ServiceError> {
        let params = Params::new(
            self.config.hash_memory_kib,
            self.config.hash_iterations,
            Params::DEFAULT_P_COST,
            None,
        )
        .map_err(|e| ServiceError::HashError(e.to_string()))?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }

    /// Hash a password into a PHC string
    pub fn hash_password(&self, password: &str) -> Result<String, ServiceError> {
        let salt = SaltString::generate(&mut OsRng);
        self.hasher()?
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| ServiceError::HashError(e.to_string()))
    }

    /// Check a password against a stored PHC string. Malformed hashes never verify.
    pub fn verify_password(&self, password: &str, password_hash: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(password_hash) else {
            warn!("stored password hash is not a valid PHC string");
            return false;
        };
        // Params come from the PHC string; the configured cost only matters when hashing.
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    }

    /// Generate an access token for a user
    pub fn issue_token(&self, user: &user::Model) -> Result<TokenResponse, AuthError> {
        let now = Utc::now();
        let expires = now
            + ChronoDuration::from_std(self.config.access_token_expiration)
                .map_err(|_| AuthError::TokenCreation("Invalid token duration".to_string()))?;

        let claims = Claims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role,
            supplier_id: user.supplier_id,
            driver_id: user.driver_id,
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: expires.timestamp(),
            nbf: now.timestamp(),
            iss: self.config.jwt_issuer.clone(),
            aud: self.config.jwt_audience.clone(),
        };

        let access_token = encode(
            &Header::new(JwtAlgorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(|e| AuthError::TokenCreation(e.to_string()))?;

        let user = AuthUser::try_from(claims)?;

        Ok(TokenResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: self.config.access_token_expiration.as_secs() as i64,
            user,
        })
    }

    /// Validate a JWT and extract the claims
    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(JwtAlgorithm::HS256);
        validation.set_issuer(&[self.config.jwt_issuer.as_str()]);
        validation.set_audience(&[self.config.jwt_audience.as_str()]);

        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken,
        })
    }

    /// Authenticate by email and password.
    ///
    /// Unknown emails, wrong passwords and deactivated accounts all look the same to the caller.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<TokenResponse, AuthError> {
        let email = normalize_email(email);
        let user = user::Entity::find()
            .filter(user::Column::Email.eq(email.as_str()))
            .one(&*self.db)
            .await
            .map_err(ServiceError::from)?;

        let Some(user) = user else {
            debug!("login for unknown email");
            return Err(AuthError::InvalidCredentials);
        };

        if !user.is_active || !self.verify_password(password, &user.password_hash) {
            debug!(user_id = %user.id, "login rejected");
            return Err(AuthError::InvalidCredentials);
        }

        info!(user_id = %user.id, role = %user.role, "user logged in");
        self.issue_token(&user)
    }

    /// Public sign-up. Creates a `client` account and logs it in.
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn register_client(&self, request: RegisterRequest) -> Result<TokenResponse, AuthError> {
        request.validate().map_err(ServiceError::from)?;
        let password_hash = self.hash_password(&request.password)?;

        let user = crate::services::users::insert_user(
            &*self.db,
            crate::services::users::NewUser {
                email: request.email,
                name: request.name,
                password_hash,
                role: Role::Client,
                supplier_id: None,
                driver_id: None,
            },
        )
        .await?;

        info!(user_id = %user.id, "client registered");
        self.issue_token(&user)
    }

    /// Load the current account; a deactivated account is treated as signed out
    pub async fn current_user(&self, user_id: Uuid) -> Result<user::Model, AuthError> {
        let user = user::Entity::find_by_id(user_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::from)?
            .ok_or(AuthError::InvalidToken)?;
        if !user.is_active {
            return Err(AuthError::InvalidToken);
        }
        Ok(user)
    }
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Authentication middleware that validates the bearer token
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let auth_service = match request.extensions().get::<Arc<AuthService>>() {
        Some(service) => service.clone(),
        None => {
            return ServiceError::InternalError("Authentication service not available".into())
                .into_response();
        }
    };

    let user = match extract_auth_from_headers(request.headers(), &auth_service) {
        Ok(user) => user,
        Err(e) => return e.into_response(),
    };

    // a deactivated account is cut off before its token expires
    if let Err(e) = auth_service.current_user(user.user_id).await {
        debug!(user_id = %user.user_id, "token for missing or deactivated account");
        return e.into_response();
    }

    request.extensions_mut().insert(user);
    next.run(request).await
}

fn extract_auth_from_headers(
    headers: &HeaderMap,
    auth_service: &AuthService,
) -> Result<AuthUser, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingAuth)?;

    let token = value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::MissingAuth)?;

    let claims = auth_service.validate_token(token)?;
    AuthUser::try_from(claims)
}

/// Role middleware: the caller's role must be in the allowed set
pub async fn role_middleware(
    State(allowed): State<Arc<[Role]>>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let user = request
        .extensions()
        .get::<AuthUser>()
        .ok_or(AuthError::MissingAuth)?;

    if !role_allowed(user.role, &allowed) {
        debug!(role = %user.role, "role not permitted for route");
        return Err(AuthError::InsufficientPermissions);
    }

    Ok(next.run(request).await)
}

/// Extension methods for Router to add auth middleware
pub trait AuthRouterExt {
    fn with_auth(self) -> Self;
    fn with_roles(self, roles: &[Role]) -> Self;
}

impl<S> AuthRouterExt for Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_auth(self) -> Self {
        self.layer(axum::middleware::from_fn(auth_middleware))
    }

    fn with_roles(self, roles: &[Role]) -> Self {
        let allowed: Arc<[Role]> = Arc::from(roles);
        self.layer(axum::middleware::from_fn_with_state(allowed, role_middleware))
            .with_auth()
    }
}

/// Authentication routes, mounted under `/auth`
pub fn auth_routes() -> Router<Arc<AuthService>> {
    let protected = Router::new().route("/me", get(me_handler)).with_auth();

    Router::new()
        .route("/login", post(login_handler))
        .route("/register", post(register_handler))
        .merge(protected)
        .layer(DefaultBodyLimit::max(1024 * 64))
}

/// Login handler
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginCredentials,
    responses(
        (status = 200, description = "Authenticated", body = TokenResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn login_handler(
    State(auth_service): State<Arc<AuthService>>,
    Json(credentials): Json<LoginCredentials>,
) -> Result<Json<TokenResponse>, AuthError> {
    credentials
        .validate()
        .map_err(|_| AuthError::InvalidCredentials)?;
    let token = auth_service
        .login(&credentials.email, &credentials.password)
        .await?;
    Ok(Json(token))
}

/// Registration handler
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Client account created", body = TokenResponse),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 409, description = "Email already registered", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn register_handler(
    State(auth_service): State<Arc<AuthService>>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<TokenResponse>), AuthError> {
    let token = auth_service.register_client(request).await?;
    Ok((StatusCode::CREATED, Json(token)))
}

/// Current account
#[utoipa::path(
    get,
    path = "/auth/me",
    responses(
        (status = 200, description = "Current user", body = crate::entities::user::Model),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "auth"
)]
pub async fn me_handler(
    State(auth_service): State<Arc<AuthService>>,
    user: AuthUser,
) -> Result<Json<user::Model>, AuthError> {
    Ok(Json(auth_service.current_user(user.user_id).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn service() -> AuthService {
        let config = AuthConfig::new(
            "q8Vx2LmN7pR4tY1wZ6bC3dF9gH5jK0sA".into(),
            "bakery-clients".into(),
            "bakery-api".into(),
            Duration::from_secs(3600),
        )
        .with_hash_cost(1024, 1);
        AuthService::new(config, Arc::new(DatabaseConnection::Disconnected))
    }

    fn user(role: Role) -> user::Model {
        user::Model {
            id: Uuid::new_v4(),
            email: "baker@example.com".into(),
            name: "Baker".into(),
            password_hash: String::new(),
            role,
            supplier_id: (role == Role::Supplier).then(Uuid::new_v4),
            driver_id: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn password_hash_round_trip() {
        let svc = service();
        let hash = svc.hash_password("sourdough-starter").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(svc.verify_password("sourdough-starter", &hash));
        assert!(!svc.verify_password("rye", &hash));
        assert!(!svc.verify_password("rye", "not-a-phc-string"));
    }

    #[test]
    fn issued_token_validates_and_carries_tenant() {
        let svc = service();
        let supplier = user(Role::Supplier);
        let token = svc.issue_token(&supplier).unwrap();
        let claims = svc.validate_token(&token.access_token).unwrap();
        assert_eq!(claims.role, Role::Supplier);
        assert_eq!(claims.supplier_id, supplier.supplier_id);
        assert_eq!(token.user.user_id, supplier.id);
    }

    #[test]
    fn token_from_other_secret_is_rejected() {
        let svc = service();
        let token = svc.issue_token(&user(Role::Client)).unwrap();

        let mut other = service();
        other.config.jwt_secret = "Zt7wP2kLm9Qx4Rv8Nb3Hc6Jd1Fg5Sa0Y".into();
        assert_matches!(
            other.validate_token(&token.access_token),
            Err(AuthError::InvalidToken)
        );
    }

    #[test]
    fn expired_token_is_reported_as_expired() {
        let svc = service();
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: Uuid::new_v4().to_string(),
            email: "late@example.com".into(),
            name: "Late".into(),
            role: Role::Client,
            supplier_id: None,
            driver_id: None,
            jti: Uuid::new_v4().to_string(),
            iat: now - 7200,
            exp: now - 3600,
            nbf: now - 7200,
            iss: svc.config.jwt_issuer.clone(),
            aud: svc.config.jwt_audience.clone(),
        };
        let token = encode(
            &Header::new(JwtAlgorithm::HS256),
            &claims,
            &EncodingKey::from_secret(svc.config.jwt_secret.as_bytes()),
        )
        .unwrap();
        assert_matches!(svc.validate_token(&token), Err(AuthError::TokenExpired));
    }

    #[test]
    fn bearer_header_is_required() {
        let svc = service();
        let headers = HeaderMap::new();
        assert_matches!(
            extract_auth_from_headers(&headers, &svc),
            Err(AuthError::MissingAuth)
        );

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Basic abc".parse().unwrap());
        assert_matches!(
            extract_auth_from_headers(&headers, &svc),
            Err(AuthError::MissingAuth)
        );
    }

    #[test]
    fn auth_error_statuses() {
        assert_eq!(
            AuthError::MissingAuth.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::InsufficientPermissions.into_response().status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AuthError::Service(ServiceError::Conflict("email".into()))
                .into_response()
                .status(),
            StatusCode::CONFLICT
        );
    }
}
