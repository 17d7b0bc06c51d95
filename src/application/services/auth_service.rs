//! Authentication Service
//!
//! Handles registration, login, JWT access tokens and rotated refresh
//! sessions.

use std::sync::Arc;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, instrument};

use super::EmailService;
use crate::application::dto::request::{LoginRequest, RefreshTokenRequest, RegisterRequest};
use crate::application::dto::response::{AuthResponse, TokenResponse, UserResponse};
use crate::config::JwtSettings;
use crate::domain::{Session, SessionRepository, User, UserRepository, UserRole};
use crate::shared::error::AppError;
use crate::shared::snowflake::SnowflakeGenerator;
use crate::shared::validation::{normalize_email, validate};

/// Authentication service trait for dependency injection
#[async_trait]
pub trait AuthService: Send + Sync {
    /// Create a customer account and sign it in
    async fn register(&self, request: RegisterRequest) -> Result<AuthResponse, AuthError>;

    /// Authenticate user with credentials
    async fn login(&self, request: LoginRequest) -> Result<AuthResponse, AuthError>;

    /// Exchange a refresh token for a new token pair
    async fn refresh(&self, request: RefreshTokenRequest) -> Result<TokenResponse, AuthError>;

    /// Revoke a refresh token (logout)
    async fn logout(&self, request: RefreshTokenRequest) -> Result<(), AuthError>;

    /// Validate an access token and return its claims
    fn validate_token(&self, access_token: &str) -> Result<Claims, AuthError>;
}

/// Freshly issued token pair
#[derive(Debug, Clone, Serialize)]
pub struct AuthTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub token_type: String,
}

impl From<AuthTokens> for TokenResponse {
    fn from(tokens: AuthTokens) -> Self {
        Self {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            expires_in: tokens.expires_in,
            token_type: tokens.token_type,
        }
    }
}

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    pub role: UserRole,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at time (Unix timestamp)
    pub iat: i64,
    /// JWT ID
    pub jti: String,
}

impl Claims {
    pub fn user_id(&self) -> Result<i64, AuthError> {
        self.sub.parse().map_err(|_| AuthError::InvalidToken)
    }
}

/// Authentication errors
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Account is disabled")]
    AccountDisabled,

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Session not found or expired")]
    SessionNotFound,

    #[error("Email already registered")]
    EmailExists,

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Repository(#[from] AppError),
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials
            | AuthError::TokenExpired
            | AuthError::InvalidToken
            | AuthError::SessionNotFound => AppError::Unauthorized(err.to_string()),
            AuthError::AccountDisabled => AppError::Forbidden(err.to_string()),
            AuthError::EmailExists => AppError::Conflict(err.to_string()),
            AuthError::Internal(msg) => AppError::Internal(msg),
            AuthError::Repository(e) => e,
        }
    }
}

/// Hash a password using Argon2id
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
}

/// Verify a password against its hash
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| AppError::Internal(format!("Invalid password hash: {}", e)))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Hash refresh token for storage
pub fn hash_refresh_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Sign an access token for a user.
pub fn issue_access_token(
    settings: &JwtSettings,
    user_id: i64,
    role: UserRole,
) -> Result<String, AppError> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id.to_string(),
        role,
        exp: (now + Duration::minutes(settings.access_token_expiry_minutes)).timestamp(),
        iat: now.timestamp(),
        jti: uuid::Uuid::new_v4().to_string(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(settings.secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))
}

/// Decode and validate an access token
pub fn decode_access_token(settings: &JwtSettings, token: &str) -> Result<Claims, AuthError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(settings.secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        _ => AuthError::InvalidToken,
    })?;

    Ok(token_data.claims)
}

/// AuthService implementation
pub struct AuthServiceImpl<U, S>
where
    U: UserRepository,
    S: SessionRepository,
{
    user_repo: Arc<U>,
    session_repo: Arc<S>,
    id_generator: Arc<SnowflakeGenerator>,
    jwt_settings: JwtSettings,
    email: EmailService,
}

impl<U, S> AuthServiceImpl<U, S>
where
    U: UserRepository,
    S: SessionRepository,
{
    pub fn new(
        user_repo: Arc<U>,
        session_repo: Arc<S>,
        id_generator: Arc<SnowflakeGenerator>,
        jwt_settings: JwtSettings,
        email: EmailService,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            id_generator,
            jwt_settings,
            email,
        }
    }

    /// Generate access and refresh tokens
    fn generate_tokens(&self, user: &User) -> Result<AuthTokens, AuthError> {
        let access_token = issue_access_token(&self.jwt_settings, user.id, user.role)?;

        // Opaque refresh token, only its hash is stored
        let refresh_token = format!("{}.{}", uuid::Uuid::new_v4(), uuid::Uuid::new_v4());

        Ok(AuthTokens {
            access_token,
            refresh_token,
            expires_in: self.jwt_settings.access_token_expiry_minutes * 60,
            token_type: "Bearer".to_string(),
        })
    }

    fn refresh_expiry(&self) -> chrono::DateTime<Utc> {
        Utc::now() + Duration::days(self.jwt_settings.refresh_token_expiry_days)
    }

    /// Issue tokens and persist a new refresh session.
    async fn start_session(&self, user: &User) -> Result<AuthTokens, AuthError> {
        let tokens = self.generate_tokens(user)?;
        let session = Session::new(
            user.id,
            hash_refresh_token(&tokens.refresh_token),
            self.refresh_expiry(),
        );
        self.session_repo.create(&session).await?;
        Ok(tokens)
    }
}

#[async_trait]
impl<U, S> AuthService for AuthServiceImpl<U, S>
where
    U: UserRepository + 'static,
    S: SessionRepository + 'static,
{
    #[instrument(skip(self, request), fields(email = %request.email))]
    async fn register(&self, request: RegisterRequest) -> Result<AuthResponse, AuthError> {
        validate(&request)?;
        let email = normalize_email(&request.email);

        if self.user_repo.email_exists(&email).await? {
            return Err(AuthError::EmailExists);
        }

        let now = Utc::now();
        let user = User {
            id: self.id_generator.generate(),
            email,
            password_hash: hash_password(&request.password)?,
            full_name: request.full_name.trim().to_string(),
            phone: request.phone.filter(|p| !p.trim().is_empty()),
            role: UserRole::Customer,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        // The unique index still catches a concurrent registration
        let created = self.user_repo.create(&user).await.map_err(|e| match e {
            AppError::Conflict(_) => AuthError::EmailExists,
            e => AuthError::Repository(e),
        })?;

        let tokens = self.start_session(&created).await?;
        info!(user_id = created.id, "User registered");

        self.email.send_welcome(&created).await;

        Ok(AuthResponse {
            user: UserResponse::from(created),
            tokens: tokens.into(),
        })
    }

    #[instrument(skip(self, request), fields(email = %request.email))]
    async fn login(&self, request: LoginRequest) -> Result<AuthResponse, AuthError> {
        validate(&request)?;
        let user = self
            .user_repo
            .find_by_email(&normalize_email(&request.email))
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !verify_password(&request.password, &user.password_hash)? {
            return Err(AuthError::InvalidCredentials);
        }
        if !user.is_active {
            return Err(AuthError::AccountDisabled);
        }

        let tokens = self.start_session(&user).await?;
        Ok(AuthResponse {
            user: UserResponse::from(user),
            tokens: tokens.into(),
        })
    }

    async fn refresh(&self, request: RefreshTokenRequest) -> Result<TokenResponse, AuthError> {
        validate(&request)?;
        let session = self
            .session_repo
            .find_by_token_hash(&hash_refresh_token(&request.refresh_token))
            .await?
            .ok_or(AuthError::SessionNotFound)?;

        if !session.is_active() {
            return Err(AuthError::TokenExpired);
        }

        let user = self
            .user_repo
            .find_by_id(session.user_id)
            .await?
            .ok_or(AuthError::SessionNotFound)?;
        if !user.is_active {
            self.session_repo.revoke(session.id).await?;
            return Err(AuthError::AccountDisabled);
        }

        // Token rotation: the presented refresh token stops working
        let tokens = self.generate_tokens(&user)?;
        self.session_repo
            .rotate(
                session.id,
                &hash_refresh_token(&tokens.refresh_token),
                self.refresh_expiry(),
            )
            .await
            .map_err(|e| match e {
                AppError::Unauthorized(_) => AuthError::SessionNotFound,
                e => AuthError::Repository(e),
            })?;

        Ok(tokens.into())
    }

    async fn logout(&self, request: RefreshTokenRequest) -> Result<(), AuthError> {
        validate(&request)?;
        if let Some(session) = self
            .session_repo
            .find_by_token_hash(&hash_refresh_token(&request.refresh_token))
            .await?
        {
            self.session_repo.revoke(session.id).await?;
        }
        Ok(())
    }

    fn validate_token(&self, access_token: &str) -> Result<Claims, AuthError> {
        decode_access_token(&self.jwt_settings, access_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::test_support::{jwt_settings, InMemoryDb};
    use crate::infrastructure::email::LogEmailSender;

    fn service(db: &InMemoryDb) -> AuthServiceImpl<InMemoryDb, InMemoryDb> {
        AuthServiceImpl::new(
            Arc::new(db.clone()),
            Arc::new(db.clone()),
            Arc::new(SnowflakeGenerator::new(1, 1)),
            jwt_settings(),
            EmailService::new(Arc::new(LogEmailSender)),
        )
    }

    fn register_request(email: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.into(),
            password: "correct horse battery".into(),
            full_name: "Jane Doe".into(),
            phone: None,
        }
    }

    #[test]
    fn test_password_hashing() {
        let hash = hash_password("secret-password").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("secret-password", &hash).unwrap());
        assert!(!verify_password("wrong-password", &hash).unwrap());
    }

    #[test]
    fn test_access_token_roundtrip() {
        let settings = jwt_settings();
        let token = issue_access_token(&settings, 42, UserRole::Admin).unwrap();
        let claims = decode_access_token(&settings, &token).unwrap();
        assert_eq!(claims.user_id().unwrap(), 42);
        assert_eq!(claims.role, UserRole::Admin);

        let mut other = settings.clone();
        other.secret = "another-secret-that-is-long-enough-000".into();
        assert!(matches!(
            decode_access_token(&other, &token),
            Err(AuthError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_register_normalizes_email_and_rejects_duplicates() {
        let db = InMemoryDb::default();
        let auth = service(&db);

        let response = auth.register(register_request("Jane@Example.com")).await.unwrap();
        assert_eq!(response.user.email, "jane@example.com");
        assert_eq!(response.user.role, UserRole::Customer);

        let duplicate = auth.register(register_request("jane@example.com")).await;
        assert!(matches!(duplicate, Err(AuthError::EmailExists)));
    }

    #[tokio::test]
    async fn test_login_checks_password_and_active_flag() {
        let db = InMemoryDb::default();
        let auth = service(&db);
        let registered = auth.register(register_request("jane@example.com")).await.unwrap();

        let wrong = auth
            .login(LoginRequest {
                email: "jane@example.com".into(),
                password: "not the password".into(),
            })
            .await;
        assert!(matches!(wrong, Err(AuthError::InvalidCredentials)));

        db.set_user_active(registered.user.id.parse().unwrap(), false);
        let disabled = auth
            .login(LoginRequest {
                email: "jane@example.com".into(),
                password: "correct horse battery".into(),
            })
            .await;
        assert!(matches!(disabled, Err(AuthError::AccountDisabled)));
    }

    #[tokio::test]
    async fn test_refresh_rotates_token() {
        let db = InMemoryDb::default();
        let auth = service(&db);
        let registered = auth.register(register_request("jane@example.com")).await.unwrap();
        let original = registered.tokens.refresh_token.clone();

        let rotated = auth
            .refresh(RefreshTokenRequest {
                refresh_token: original.clone(),
            })
            .await
            .unwrap();
        assert_ne!(rotated.refresh_token, original);

        // The old token is gone after rotation
        let replay = auth
            .refresh(RefreshTokenRequest {
                refresh_token: original,
            })
            .await;
        assert!(matches!(replay, Err(AuthError::SessionNotFound)));
    }

    #[tokio::test]
    async fn test_logout_revokes_session() {
        let db = InMemoryDb::default();
        let auth = service(&db);
        let registered = auth.register(register_request("jane@example.com")).await.unwrap();
        let token = registered.tokens.refresh_token;

        auth.logout(RefreshTokenRequest {
            refresh_token: token.clone(),
        })
        .await
        .unwrap();

        let after = auth.refresh(RefreshTokenRequest { refresh_token: token }).await;
        assert!(after.is_err());
    }
}
