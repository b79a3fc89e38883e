//! Authentication and user management service

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;

use crate::{
    config::AuthConfig,
    error::{AppError, AppResult},
    models::user::{CreateUser, Role, User, UserClaims, UserRow},
    repository::Repository,
};

#[derive(Clone)]
pub struct UsersService {
    repository: Repository,
    config: AuthConfig,
}

impl UsersService {
    pub fn new(repository: Repository, config: AuthConfig) -> Self {
        Self { repository, config }
    }

    /// Authenticate by username (case-insensitive) and return a JWT with the user
    pub async fn authenticate(&self, username: &str, password: &str) -> AppResult<(String, User)> {
        let row = self
            .repository
            .users
            .get_by_username(username)
            .await?
            .ok_or_else(|| AppError::Authentication("Invalid username or password".to_string()))?;

        if !verify_password(&row, password)? {
            return Err(AppError::Authentication("Invalid username or password".to_string()));
        }

        let user = User::from(row);
        let token = self.create_token_for_user(&user)?;
        Ok((token, user))
    }

    fn create_token_for_user(&self, user: &User) -> AppResult<String> {
        let now = Utc::now().timestamp();
        let exp = now + (self.config.jwt_expiration_hours as i64 * 3600);

        let claims = UserClaims {
            sub: user.id.to_string(),
            user_id: user.id,
            username: user.username.clone(),
            role: user.role,
            exp,
            iat: now,
        };

        claims
            .create_token(&self.config.jwt_secret)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))
    }

    pub async fn get_by_id(&self, id: i32) -> AppResult<User> {
        self.repository.users.get_by_id(id).await
    }

    pub async fn list(&self) -> AppResult<Vec<User>> {
        self.repository.users.list().await
    }

    pub async fn create_user(&self, data: &CreateUser) -> AppResult<User> {
        let hash = hash_password(&data.password)?;
        self.repository
            .users
            .create(&data.username, data.name.as_deref(), &hash, data.role)
            .await
    }

    /// Create the configured administrator account when it does not exist yet
    pub async fn ensure_admin(&self) -> AppResult<()> {
        let username = self.config.admin_username.trim();
        if username.is_empty() || self.config.admin_password.is_empty() {
            return Ok(());
        }
        if self.repository.users.get_by_username(username).await?.is_some() {
            return Ok(());
        }

        let hash = hash_password(&self.config.admin_password)?;
        self.repository
            .users
            .create(username, Some("Administrator"), &hash, Role::Admin)
            .await?;
        tracing::info!("Created administrator account '{}'", username);
        Ok(())
    }
}

fn verify_password(user: &UserRow, password: &str) -> AppResult<bool> {
    let parsed_hash = PasswordHash::new(&user.password_hash)
        .map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
    Ok(hash.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_then_verify() {
        let hash = hash_password("s3cret").unwrap();
        let row = UserRow {
            id: 1,
            username: "admin".into(),
            name: None,
            password_hash: hash,
            role: Role::Admin,
            crea_date: Utc::now(),
        };
        assert!(verify_password(&row, "s3cret").unwrap());
        assert!(!verify_password(&row, "wrong").unwrap());
    }
}
