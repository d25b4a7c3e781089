//! Authentication Module
//!
//! Handles user signup, login, and session management.
//! Users and sessions live in the shared SQLite database; sessions are
//! also cached in memory.

pub mod handlers;
pub mod middleware;

use async_trait::async_trait;
use bcrypt::{hash, verify};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Email already registered")]
    EmailTaken,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Invalid or expired session")]
    SessionInvalid,

    #[error("{0}")]
    Validation(String),

    #[error("Password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type Result<T> = core::result::Result<T, AuthError>;

/// User record stored in database
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub username: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
    pub is_active: bool,
}

/// Session token for authenticated requests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    fn is_live(&self) -> bool {
        self.expires_at > Utc::now()
    }
}

/// Identity lookup by primary key.
#[async_trait]
pub trait IdentityProvider: Send + Sync + 'static {
    async fn load_by_id(&self, id: i64) -> Result<Option<User>>;
}

const USER_COLUMNS: &str = "id, email, username, password_hash, created_at, last_login, is_active";

/// Auth manager handles all authentication
pub struct AuthManager {
    pool: SqlitePool,
    hash_cost: u32,
    session_ttl: Duration,
    /// In-memory session cache
    sessions: RwLock<HashMap<String, Session>>,
}

impl AuthManager {
    pub fn new(pool: SqlitePool, hash_cost: u32, session_days: i64) -> Self {
        info!("[Auth] Initialized (session ttl {} days)", session_days);
        Self {
            pool,
            hash_cost,
            session_ttl: Duration::days(session_days),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new user
    pub async fn signup(&self, email: &str, username: &str, password: &str) -> Result<User> {
        let email = email.trim().to_lowercase();
        let username = username.trim();

        if !email.contains('@') {
            return Err(AuthError::Validation("Invalid email address".into()));
        }
        if username.is_empty() {
            return Err(AuthError::Validation("Username is required".into()));
        }
        if password.len() < 8 {
            return Err(AuthError::Validation(
                "Password must be at least 8 characters".into(),
            ));
        }

        let existing: Option<(i64,)> = sqlx::query_as("SELECT id FROM users WHERE email = ?")
            .bind(&email)
            .fetch_optional(&self.pool)
            .await?;
        if existing.is_some() {
            return Err(AuthError::EmailTaken);
        }

        let password_hash = hash(password, self.hash_cost)?;
        let created_at = Utc::now();

        let id = sqlx::query(
            "INSERT INTO users (email, username, password_hash, created_at, is_active) VALUES (?, ?, ?, ?, 1)",
        )
        .bind(&email)
        .bind(username)
        .bind(&password_hash)
        .bind(created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            // A concurrent signup may win between the check and the insert
            if e
                .as_database_error()
                .is_some_and(|d| d.is_unique_violation())
            {
                AuthError::EmailTaken
            } else {
                AuthError::Database(e)
            }
        })?
        .last_insert_rowid();

        info!("[Auth] User registered: {} ({})", username, email);

        Ok(User {
            id,
            email,
            username: username.to_string(),
            password_hash,
            created_at,
            last_login: None,
            is_active: true,
        })
    }

    /// Login user and create session
    pub async fn login(&self, email: &str, password: &str) -> Result<(User, Session)> {
        let email = email.trim().to_lowercase();

        let user: Option<User> = sqlx::query_as(&format!(
            "SELECT {} FROM users WHERE email = ? AND is_active = 1",
            USER_COLUMNS
        ))
        .bind(&email)
        .fetch_optional(&self.pool)
        .await?;

        let mut user = user.ok_or(AuthError::InvalidCredentials)?;

        if !verify(password, &user.password_hash)? {
            warn!("[Auth] Failed login attempt for {}", email);
            return Err(AuthError::InvalidCredentials);
        }

        let now = Utc::now();
        sqlx::query("UPDATE users SET last_login = ? WHERE id = ?")
            .bind(now)
            .bind(user.id)
            .execute(&self.pool)
            .await?;
        user.last_login = Some(now);

        let session = self.create_session(user.id).await?;

        info!("[Auth] User logged in: {}", user.username);
        Ok((user, session))
    }

    async fn create_session(&self, user_id: i64) -> Result<Session> {
        let now = Utc::now();
        let session = Session {
            token: Uuid::new_v4().to_string(),
            user_id,
            created_at: now,
            expires_at: now + self.session_ttl,
        };

        sqlx::query(
            "INSERT INTO sessions (token, user_id, created_at, expires_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&session.token)
        .bind(session.user_id)
        .bind(session.created_at)
        .bind(session.expires_at)
        .execute(&self.pool)
        .await?;

        self.sessions
            .write()
            .await
            .insert(session.token.clone(), session.clone());

        Ok(session)
    }

    /// Validate session token, returning the session's user
    pub async fn validate_session(&self, token: &str) -> Result<User> {
        let cached = self.sessions.read().await.get(token).cloned();

        let session = match cached {
            Some(session) => session,
            None => {
                let row: Option<(String, i64, DateTime<Utc>, DateTime<Utc>)> = sqlx::query_as(
                    "SELECT token, user_id, created_at, expires_at FROM sessions WHERE token = ?",
                )
                .bind(token)
                .fetch_optional(&self.pool)
                .await?;

                let (token, user_id, created_at, expires_at) =
                    row.ok_or(AuthError::SessionInvalid)?;
                let session = Session {
                    token,
                    user_id,
                    created_at,
                    expires_at,
                };
                self.sessions
                    .write()
                    .await
                    .insert(session.token.clone(), session.clone());
                session
            }
        };

        if !session.is_live() {
            self.sessions.write().await.remove(token);
            return Err(AuthError::SessionInvalid);
        }

        match self.load_by_id(session.user_id).await? {
            Some(user) if user.is_active => Ok(user),
            _ => Err(AuthError::SessionInvalid),
        }
    }

    /// Logout user (invalidate session)
    pub async fn logout(&self, token: &str) -> Result<()> {
        self.sessions.write().await.remove(token);

        sqlx::query("DELETE FROM sessions WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await?;

        info!("[Auth] Session invalidated");
        Ok(())
    }

    /// Drop expired sessions from cache and database.
    pub async fn purge_expired(&self) -> Result<u64> {
        let now = Utc::now();
        self.sessions.write().await.retain(|_, s| s.expires_at > now);

        let removed = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
            .bind(now)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if removed > 0 {
            info!("[Auth] Purged {} expired sessions", removed);
        }
        Ok(removed)
    }
}

#[async_trait]
impl IdentityProvider for AuthManager {
    async fn load_by_id(&self, id: i64) -> Result<Option<User>> {
        let user: Option<User> =
            sqlx::query_as(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }
}
