//! Users repository for database operations

use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::user::{Role, User, UserRow},
};

#[derive(Clone)]
pub struct UsersRepository {
    pool: Pool<Postgres>,
}

impl UsersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get user by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<User> {
        sqlx::query_as::<_, User>("SELECT id, username, name, role FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))
    }

    /// Get user by username, case-insensitively, with its password hash
    pub async fn get_by_username(&self, username: &str) -> AppResult<Option<UserRow>> {
        let user = sqlx::query_as::<_, UserRow>(
            "SELECT * FROM users WHERE LOWER(username) = LOWER($1)",
        )
        .bind(username.trim())
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    /// Users matching any of the given usernames
    pub async fn find_by_usernames(&self, usernames: &[String]) -> AppResult<Vec<User>> {
        if usernames.is_empty() {
            return Ok(Vec::new());
        }
        let lowered: Vec<String> = usernames.iter().map(|u| u.to_lowercase()).collect();
        let users = sqlx::query_as::<_, User>(
            "SELECT id, username, name, role FROM users WHERE LOWER(username) = ANY($1)",
        )
        .bind(&lowered)
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    pub async fn list(&self) -> AppResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(
            "SELECT id, username, name, role FROM users ORDER BY username",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    pub async fn create(
        &self,
        username: &str,
        name: Option<&str>,
        password_hash: &str,
        role: Role,
    ) -> AppResult<User> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, name, password_hash, role)
            VALUES ($1, $2, $3, $4)
            RETURNING id, username, name, role
            "#,
        )
        .bind(username.trim())
        .bind(name)
        .bind(password_hash)
        .bind(role)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::from_unique_violation(
                e,
                &[("users_username_lower_idx", "Username already exists")],
            )
        })
    }
}
