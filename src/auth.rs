use argon2::{
    Argon2, PasswordHasher, PasswordVerifier,
    password_hash::{PasswordHash, SaltString},
};
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::{AppConfig, Env},
    error::{ServiceError, ServiceResult},
    models::{Role, User},
    repository::{RepositoryState, UserRepository},
};

/// Claims
///
/// Payload of the HS256 access tokens issued by login and OTP verification.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user's id.
    pub sub: Uuid,
    pub exp: usize,
    pub iat: usize,
}

/// AuthUser
///
/// The resolved identity of an authenticated request. Roles are re-read from the
/// repository on every request, so a role change takes effect without a new token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub roles: Vec<Role>,
}

impl AuthUser {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }

    pub fn require_role(&self, role: Role) -> ServiceResult<()> {
        if self.has_role(role) {
            Ok(())
        } else {
            Err(ServiceError::forbidden())
        }
    }

    pub fn require_any(&self, roles: &[Role]) -> ServiceResult<()> {
        if roles.iter().any(|r| self.has_role(*r)) {
            Ok(())
        } else {
            Err(ServiceError::forbidden())
        }
    }
}

impl From<User> for AuthUser {
    fn from(user: User) -> Self {
        AuthUser { id: user.id, roles: user.roles }
    }
}

fn unauthorized() -> ServiceError {
    ServiceError::Unauthorized("Missing or invalid credentials".to_string())
}

/// AuthUser Extractor
///
/// 1. Local bypass: in `Env::Local` an `x-user-id` header naming an existing user is accepted.
/// 2. Otherwise a `Bearer` JWT is required and validated against `jwt_secret`.
/// 3. The user is re-loaded and must still exist and be active.
///
/// Rejection: a `ServiceError` rendered in the standard envelope (401, or 403 when inactive).
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        if config.env == Env::Local {
            let bypass_id = parts
                .headers
                .get("x-user-id")
                .and_then(|value| value.to_str().ok())
                .and_then(|value| Uuid::parse_str(value).ok());
            if let Some(user_id) = bypass_id {
                if let Some(user) = repo.get_user(user_id).await? {
                    return active(user);
                }
            }
        }

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or_else(unauthorized)?;

        let claims = decode_token(token, &config.jwt_secret)?;

        let user = repo.get_user(claims.sub).await?.ok_or_else(unauthorized)?;
        active(user)
    }
}

fn active(user: User) -> Result<AuthUser, ServiceError> {
    if !user.is_active {
        return Err(ServiceError::Forbidden("Account has not been activated".to_string()));
    }
    Ok(AuthUser::from(user))
}

pub fn decode_token(token: &str, secret: &str) -> ServiceResult<Claims> {
    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let mut validation = Validation::default();
    validation.validate_exp = true;

    decode::<Claims>(token, &decoding_key, &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => ServiceError::Unauthorized("Token expired".to_string()),
            _ => unauthorized(),
        })
}

/// issue_token
///
/// Signs an access token for `user_id` valid for `jwt_ttl_hours`.
pub fn issue_token(user_id: Uuid, config: &AppConfig, now: DateTime<Utc>) -> ServiceResult<String> {
    let claims = Claims {
        sub: user_id,
        iat: now.timestamp() as usize,
        exp: (now + Duration::hours(config.jwt_ttl_hours)).timestamp() as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| ServiceError::Internal(format!("token signing failed: {}", e)))
}

/// hash_password
///
/// Argon2id with default parameters and a random 16-byte salt.
pub fn hash_password(password: &str) -> ServiceResult<String> {
    let mut salt_bytes = [0u8; 16];
    rand::rng().fill(&mut salt_bytes);
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| ServiceError::Internal(format!("salt encoding failed: {}", e)))?;

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ServiceError::Internal(format!("password hashing failed: {}", e)))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}
