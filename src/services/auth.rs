//! Authentication service: credentials, registration and bearer tokens

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use crate::{
    config::AuthConfig,
    error::{AppError, AppResult},
    models::{
        user::{LoginRequest, Profile, RegisterRequest, UserClaims},
        Identity, Role, User,
    },
    repository::Repository,
};

const ARGON2_PREFIX: &str = "$argon2";
const BCRYPT_PREFIXES: [&str; 3] = ["$2a$", "$2b$", "$2y$"];

fn is_bcrypt_hash(value: &str) -> bool {
    BCRYPT_PREFIXES.iter().any(|prefix| value.starts_with(prefix))
}

/// Whether a stored or submitted password is already a hash: an argon2 PHC
/// string, or a bcrypt hash carried over from older accounts
pub fn is_password_hash(value: &str) -> bool {
    value.starts_with(ARGON2_PREFIX) || is_bcrypt_hash(value)
}

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
    Ok(hash.to_string())
}

/// Check a candidate against the stored value. Accounts created before
/// hashing keep a plaintext password, compared as is.
pub fn verify_password(stored: Option<&str>, candidate: &str) -> AppResult<bool> {
    let Some(stored) = stored else {
        return Ok(false);
    };

    if is_bcrypt_hash(stored) {
        return bcrypt::verify(candidate, stored)
            .map_err(|e| AppError::Internal(format!("Invalid password hash: {}", e)));
    }

    if !is_password_hash(stored) {
        return Ok(stored == candidate);
    }

    let parsed_hash =
        PasswordHash::new(stored).map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
    Ok(Argon2::default()
        .verify_password(candidate.as_bytes(), &parsed_hash)
        .is_ok())
}

#[derive(Clone)]
pub struct AuthService {
    repository: Repository,
    config: AuthConfig,
}

impl AuthService {
    pub fn new(repository: Repository, config: AuthConfig) -> Self {
        Self { repository, config }
    }

    /// Authenticate by email (or the `username` alias) and issue a token
    pub async fn login(&self, request: LoginRequest) -> AppResult<Profile> {
        let email = [request.email.as_deref(), request.username.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|v| !v.is_empty());
        let password = request.password.as_deref().map(str::trim).filter(|p| !p.is_empty());

        let (Some(email), Some(password)) = (email, password) else {
            return Err(AppError::Validation("Email and password are required".to_string()));
        };

        let user = self
            .repository
            .users
            .find_by_email(email)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::Authentication("Invalid credentials".to_string()))?;

        if !verify_password(user.password.as_deref(), password)? {
            tracing::info!("Login rejected for user {}", user.id);
            return Err(AppError::Authentication("Invalid credentials".to_string()));
        }

        let token = self.issue_token(&user)?;
        tracing::info!("User {} logged in", user.id);
        Ok(Profile::new(&user, Some(token)))
    }

    /// Self-registration always yields a plain member account
    pub async fn register(&self, request: RegisterRequest) -> AppResult<Profile> {
        let request = RegisterRequest {
            name: request.name.trim().to_string(),
            email: request.email.trim().to_string(),
            password: request.password.trim().to_string(),
        };
        request.validate()?;

        if !self.repository.users.find_by_email(&request.email).await?.is_empty() {
            return Err(AppError::Conflict("Email already exists".to_string()));
        }

        let user = User {
            id: Uuid::new_v4().to_string(),
            name: request.name,
            email: request.email,
            password: Some(hash_password(&request.password)?),
            role: Role::User,
            favorites: Vec::new(),
        };
        let user = self.repository.users.save(&user).await?;

        let token = self.issue_token(&user)?;
        tracing::info!("User {} registered", user.id);
        Ok(Profile::new(&user, Some(token)))
    }

    /// Profile of the caller; a token for a deleted account is rejected
    pub async fn me(&self, caller: &Identity) -> AppResult<Profile> {
        let user = self
            .repository
            .users
            .get(&caller.user_id)
            .await?
            .ok_or_else(|| AppError::Authentication("Unauthorized".to_string()))?;
        Ok(Profile::new(&user, None))
    }

    pub fn issue_token(&self, user: &User) -> AppResult<String> {
        let now = Utc::now().timestamp();
        let exp = now + (self.config.jwt_expiration_minutes as i64 * 60);

        let claims = UserClaims {
            sub: user.id.clone(),
            email: user.email.clone(),
            role: user.role.as_str().to_string(),
            exp,
            iat: now,
        };

        claims
            .create_token(&self.config.jwt_secret)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))
    }

    /// Bad, expired or foreign tokens are simply no identity
    pub fn verify(&self, token: &str) -> Option<Identity> {
        match UserClaims::from_token(token, &self.config.jwt_secret) {
            Ok(claims) => Some(Identity::from(claims)),
            Err(e) => {
                tracing::debug!("Ignoring bearer token: {}", e);
                None
            }
        }
    }
}
