use std::env;

use axum::{Extension, Json};
use chrono::Utc;
use pbkdf2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use pbkdf2::Pbkdf2;
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::err::{proceeds, Error, Payload};
use crate::models::Admin;
use crate::store::StudentStore;

const DEFAULT_ADMIN_USERNAME: &str = "admin";
const DEFAULT_ADMIN_PASSWORD: &str = "admin123";

pub async fn login_admin(
    Json(body): Json<LoginRequest>,
    Extension(pg): Extension<PgPool>,
) -> Payload<LoggedIn> {
    let username = login(&pg, &body.username, &body.password).await?;
    proceeds(LoggedIn {
        message: "Login successful",
        user: AdminUser { username },
    })
}

/// Credentials are stored as PHC hash strings; an unknown username and a
/// wrong password are deliberately indistinguishable to the caller.
pub async fn login<S: StudentStore>(
    store: &S,
    username: &str,
    password: &str,
) -> Result<String, Error> {
    let admin = store
        .find_admin(username.trim())
        .await?
        .ok_or_else(invalid_credentials)?;
    let hash = PasswordHash::new(&admin.password_hash)?;
    if Pbkdf2
        .verify_password(password.as_bytes(), &hash)
        .is_err()
    {
        return Err(invalid_credentials());
    }
    Ok(admin.username)
}

/// One-time bootstrap: if no admin exists yet, seed the configured (or
/// default) account with a freshly salted hash.
pub async fn seed_default_admin<S: StudentStore>(store: &S) -> Result<(), Error> {
    if store.count_admins().await? > 0 {
        return Ok(());
    }

    let username =
        env::var("ADMIN_USERNAME").unwrap_or_else(|_| DEFAULT_ADMIN_USERNAME.to_string());
    let password = match env::var("ADMIN_PASSWORD") {
        Ok(password) => password,
        Err(_) => {
            log::warn!("ADMIN_PASSWORD is not set, seeding the default admin password");
            DEFAULT_ADMIN_PASSWORD.to_string()
        }
    };

    let password_hash = Pbkdf2
        .hash_password(password.as_bytes(), &SaltString::generate(&mut OsRng))?
        .to_string();
    store
        .insert_admin(&Admin {
            username: username.clone(),
            password_hash,
            created_at: Utc::now(),
        })
        .await?;
    log::info!("Seeded the admin account `{}`", username);
    Ok(())
}

fn invalid_credentials() -> Error {
    Error::unauthorized("Invalid username or password")
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoggedIn {
    pub message: &'static str,
    pub user: AdminUser,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdminUser {
    pub username: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemStore;

    async fn store_with_admin(username: &str, password: &str) -> MemStore {
        let store = MemStore::new();
        let password_hash = Pbkdf2
            .hash_password(password.as_bytes(), &SaltString::generate(&mut OsRng))
            .unwrap()
            .to_string();
        store
            .insert_admin(&Admin {
                username: username.to_string(),
                password_hash,
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn login_verifies_the_hashed_password() {
        let store = store_with_admin("admin", "sekrit").await;
        let username = login(&store, "admin", "sekrit").await.unwrap();
        assert_eq!(username, "admin");
    }

    #[tokio::test]
    async fn login_trims_the_username() {
        let store = store_with_admin("admin", "sekrit").await;
        assert!(login(&store, "  admin  ", "sekrit").await.is_ok());
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_user_look_the_same() {
        let store = store_with_admin("admin", "sekrit").await;
        let wrong_password = login(&store, "admin", "nope").await.unwrap_err();
        let unknown_user = login(&store, "ghost", "sekrit").await.unwrap_err();
        assert!(matches!(wrong_password, Error::Unauthorized { .. }));
        assert!(matches!(unknown_user, Error::Unauthorized { .. }));
    }
}
