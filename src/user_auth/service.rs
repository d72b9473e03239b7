use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use thiserror::Error;
use utoipa::ToSchema;
use validator::Validate;

/// Token lifetime: one week, as the legacy cookie sessions had.
const TOKEN_TTL_DAYS: i64 = 7;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Email already registered")]
    EmailInUse,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Password hashing failed: {0}")]
    Hashing(String),
}

/// JWT Claims structure
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String, // Subject (user id as string)
    pub exp: usize,  // Expiration time (as UTC timestamp)
    pub iat: usize,  // Issued at
}

impl Claims {
    pub fn user_id(&self) -> Option<i64> {
        self.sub.parse().ok()
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[validate(length(min = 1))]
    #[schema(example = "Ana Souza")]
    pub name: String,
    #[validate(email)]
    #[schema(example = "ana@example.com")]
    pub email: String,
    #[validate(length(min = 8))]
    #[schema(example = "password123")]
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    #[schema(example = "ana@example.com")]
    pub email: String,
    #[schema(example = "password123")]
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserInfo {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub is_admin: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub ok: bool,
    pub token: String,
    pub user: UserInfo,
}

pub struct UserAuthService {
    db: PgPool,
    jwt_secret: String,
}

impl UserAuthService {
    pub fn new(db: PgPool, jwt_secret: String) -> Self {
        Self { db, jwt_secret }
    }

    /// Register a new user and issue a token
    pub async fn register(&self, req: RegisterRequest) -> Result<AuthResponse, AuthError> {
        let email = req.email.trim().to_lowercase();

        let dupe = sqlx::query(r#"SELECT 1 AS one FROM users WHERE lower(email) = $1"#)
            .bind(&email)
            .fetch_optional(&self.db)
            .await?;
        if dupe.is_some() {
            return Err(AuthError::EmailInUse);
        }

        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(req.password.as_bytes(), &salt)
            .map_err(|e| AuthError::Hashing(e.to_string()))?
            .to_string();

        let row = sqlx::query(
            r#"INSERT INTO users (name, email, password_hash)
               VALUES ($1, $2, $3)
            RETURNING id, name, email, is_admin"#,
        )
        .bind(req.name.trim())
        .bind(&email)
        .bind(password_hash)
        .fetch_one(&self.db)
        .await?;

        let user = UserInfo {
            id: row.get("id"),
            name: row.get("name"),
            email: row.get("email"),
            is_admin: row.get("is_admin"),
        };
        let token = self.issue_token(user.id)?;

        tracing::info!(user_id = user.id, "user registered");
        Ok(AuthResponse {
            ok: true,
            token,
            user,
        })
    }

    /// Login and issue a JWT
    pub async fn login(&self, req: LoginRequest) -> Result<AuthResponse, AuthError> {
        let email = req.email.trim().to_lowercase();

        let row = sqlx::query(
            r#"SELECT id, name, email, password_hash, is_admin
                 FROM users WHERE lower(email) = $1"#,
        )
        .bind(&email)
        .fetch_optional(&self.db)
        .await?
        .ok_or(AuthError::InvalidCredentials)?;

        let password_hash: String = row.get("password_hash");
        let parsed_hash =
            PasswordHash::new(&password_hash).map_err(|e| AuthError::Hashing(e.to_string()))?;

        Argon2::default()
            .verify_password(req.password.as_bytes(), &parsed_hash)
            .map_err(|_| AuthError::InvalidCredentials)?;

        let user = UserInfo {
            id: row.get("id"),
            name: row.get("name"),
            email: row.get("email"),
            is_admin: row.get("is_admin"),
        };
        let token = self.issue_token(user.id)?;

        Ok(AuthResponse {
            ok: true,
            token,
            user,
        })
    }

    /// Verify JWT token
    pub fn verify_token(&self, token: &str) -> Result<Claims, AuthError> {
        let decoding_key = DecodingKey::from_secret(self.jwt_secret.as_bytes());
        let validation = Validation::new(Algorithm::HS256);
        let token_data =
            decode::<Claims>(token, &decoding_key, &validation).map_err(|_| AuthError::InvalidToken)?;
        Ok(token_data.claims)
    }

    /// Fixed identity-lookup contract: JWT subject -> user row.
    pub async fn get_user(&self, user_id: i64) -> Result<Option<UserInfo>, AuthError> {
        let row = sqlx::query(r#"SELECT id, name, email, is_admin FROM users WHERE id = $1"#)
            .bind(user_id)
            .fetch_optional(&self.db)
            .await?;

        Ok(row.map(|r| UserInfo {
            id: r.get("id"),
            name: r.get("name"),
            email: r.get("email"),
            is_admin: r.get("is_admin"),
        }))
    }

    pub async fn is_admin(&self, user_id: i64) -> Result<bool, AuthError> {
        Ok(self
            .get_user(user_id)
            .await?
            .map(|u| u.is_admin)
            .unwrap_or(false))
    }

    /// Bootstrap helper: create an admin account if the email is free.
    pub async fn ensure_admin(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<(), AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AuthError::Hashing(e.to_string()))?
            .to_string();

        let inserted = sqlx::query(
            r#"INSERT INTO users (name, email, password_hash, is_admin)
               VALUES ($1, $2, $3, TRUE)
               ON CONFLICT (email) DO NOTHING"#,
        )
        .bind(name)
        .bind(email.trim().to_lowercase())
        .bind(password_hash)
        .execute(&self.db)
        .await?
        .rows_affected();

        if inserted == 1 {
            tracing::info!(email, "seeded admin user");
        }
        Ok(())
    }

    fn issue_token(&self, user_id: i64) -> Result<String, AuthError> {
        let now = Utc::now();
        let expiration = (now + Duration::days(TOKEN_TTL_DAYS)).timestamp();

        let claims = Claims {
            sub: user_id.to_string(),
            exp: expiration as usize,
            iat: now.timestamp() as usize,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|_| AuthError::InvalidToken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> UserAuthService {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .unwrap();
        UserAuthService::new(pool, "test-secret".to_string())
    }

    #[tokio::test]
    async fn test_token_roundtrip() {
        let svc = service();
        let token = svc.issue_token(42).unwrap();
        let claims = svc.verify_token(&token).unwrap();
        assert_eq!(claims.sub, "42");
        assert_eq!(claims.user_id(), Some(42));
    }

    #[tokio::test]
    async fn test_token_rejected_with_wrong_secret() {
        let svc = service();
        let token = svc.issue_token(42).unwrap();

        let other = UserAuthService::new(
            sqlx::postgres::PgPoolOptions::new()
                .connect_lazy("postgres://localhost/unused")
                .unwrap(),
            "other-secret".to_string(),
        );
        assert!(matches!(
            other.verify_token(&token),
            Err(AuthError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_garbage_token_rejected() {
        let svc = service();
        assert!(matches!(
            svc.verify_token("not-a-jwt"),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn test_register_request_validation() {
        let ok = RegisterRequest {
            name: "Ana".to_string(),
            email: "ana@example.com".to_string(),
            password: "password123".to_string(),
        };
        assert!(ok.validate().is_ok());

        let bad_email = RegisterRequest {
            name: "Ana".to_string(),
            email: "not-an-email".to_string(),
            password: "password123".to_string(),
        };
        assert!(bad_email.validate().is_err());

        let short_password = RegisterRequest {
            name: "Ana".to_string(),
            email: "ana@example.com".to_string(),
            password: "short".to_string(),
        };
        assert!(short_password.validate().is_err());
    }
}
