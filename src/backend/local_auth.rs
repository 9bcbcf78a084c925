//! Email/password accounts stored in SQLite.
//!
//! The signed-in identity is persisted in a single-row `current_session`
//! table so that separate CLI invocations share one session, and is
//! published to subscribers through a `watch` channel.

use super::{AuthError, IdentityCallback, SessionProvider, Subscription};
use crate::models::identity::Identity;
use argon2::password_hash::{PasswordHash, SaltString, rand_core::OsRng};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;
use uuid::Uuid;

pub const MIN_PASSWORD_LEN: usize = 6;

pub struct LocalSessionProvider {
    db: Arc<SqlitePool>,
    current: watch::Sender<Option<Identity>>,
}

impl LocalSessionProvider {
    /// Build a provider, restoring any session left by a previous run.
    pub async fn open(db: Arc<SqlitePool>) -> Result<Self, AuthError> {
        let row = sqlx::query(
            "SELECT u.id, u.email, s.token
             FROM current_session s JOIN users u ON u.id = s.user_id
             WHERE s.slot = 0",
        )
        .fetch_optional(&*db)
        .await?;

        let identity = row.map(|row| Identity {
            uid: row.get("id"),
            email: row.get("email"),
            token: Some(row.get("token")),
        });
        if let Some(identity) = &identity {
            info!("restored session for {}", identity.email);
        }

        let (current, _) = watch::channel(identity);
        Ok(Self { db, current })
    }

    async fn establish(&self, uid: String, email: String) -> Result<Identity, AuthError> {
        let token = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO current_session (slot, user_id, token, signed_in_at)
             VALUES (0, ?, ?, ?)
             ON CONFLICT(slot) DO UPDATE SET
                 user_id = excluded.user_id,
                 token = excluded.token,
                 signed_in_at = excluded.signed_in_at",
        )
        .bind(&uid)
        .bind(&token)
        .bind(Utc::now())
        .execute(&*self.db)
        .await?;

        let identity = Identity {
            uid,
            email,
            token: Some(token),
        };
        self.current.send_replace(Some(identity.clone()));
        Ok(identity)
    }
}

#[async_trait]
impl SessionProvider for LocalSessionProvider {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let email = normalize_email(email)?;
        let row = sqlx::query("SELECT id, password_hash FROM users WHERE email = ?")
            .bind(&email)
            .fetch_optional(&*self.db)
            .await?
            .ok_or(AuthError::InvalidCredential)?;

        let hash: String = row.get("password_hash");
        if !verify_password(&hash, password) {
            return Err(AuthError::InvalidCredential);
        }

        let identity = self.establish(row.get("id"), email).await?;
        info!("signed in {}", identity.email);
        Ok(identity)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let email = normalize_email(email)?;
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::WeakPassword(MIN_PASSWORD_LEN));
        }

        let uid = Uuid::new_v4().simple().to_string();
        let result = sqlx::query(
            "INSERT INTO users (id, email, password_hash, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&uid)
        .bind(&email)
        .bind(hash_password(password)?)
        .bind(Utc::now())
        .execute(&*self.db)
        .await;

        match result {
            Ok(_) => {}
            Err(sqlx::Error::Database(db_err))
                if db_err.message().to_ascii_lowercase().contains("unique") =>
            {
                return Err(AuthError::EmailInUse(email));
            }
            Err(err) => return Err(AuthError::Sqlx(err)),
        }

        let identity = self.establish(uid, email).await?;
        info!("registered {}", identity.email);
        Ok(identity)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        sqlx::query("DELETE FROM current_session WHERE slot = 0")
            .execute(&*self.db)
            .await?;
        self.current.send_replace(None);
        Ok(())
    }

    fn subscribe(&self, callback: IdentityCallback) -> Subscription {
        Subscription::from_watch(self.current.subscribe(), callback)
    }

    fn current_identity(&self) -> Option<Identity> {
        self.current.borrow().clone()
    }
}

fn normalize_email(email: &str) -> Result<String, AuthError> {
    let email = email.trim().to_ascii_lowercase();
    let mut parts = email.split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None)
            if !local.is_empty()
                && !domain.is_empty()
                && !email.chars().any(char::is_whitespace) =>
        {
            Ok(email)
        }
        _ => Err(AuthError::InvalidEmail),
    }
}

fn hash_password(plain: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|err| AuthError::Hashing(err.to_string()))?
        .to_string())
}

fn verify_password(hash: &str, plain: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}
