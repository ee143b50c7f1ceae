use std::sync::Arc;

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::db::{
    CreateUser, Role, SubUserLink, SubUserRepository, UpdateUser, User, UserRepository,
};
use crate::error::{AppError, AppResult};
use crate::services::identity::Identity;
use crate::services::validation::{
    validate_email, validate_password, validate_username, Validator,
};
use crate::AppState;

/// Session token claims. `parent_id` and `role` describe the sub-user link as it
/// was when the token was issued.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    pub exp: usize,
    pub iat: usize,
}

/// Credentials and profile for a brand-new account.
#[derive(Debug, Clone, Deserialize)]
pub struct NewAccount {
    pub email: String,
    pub username: String,
    pub password: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccountChanges {
    pub current_password: String,
    pub email: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub display_name: Option<String>,
}

#[cfg(not(test))]
const HASH_COST: u32 = bcrypt::DEFAULT_COST;
#[cfg(test)]
const HASH_COST: u32 = 4;

pub struct AuthService;

impl AuthService {
    /// Create a signed JWT for a user id, capturing its sub-user link if any.
    pub fn create_jwt(
        config: &Config,
        user_id: &str,
        link: Option<&SubUserLink>,
    ) -> AppResult<String> {
        let now = Utc::now();
        let exp = now + Duration::hours(config.jwt.expiration_hours);
        let claims = Claims {
            sub: user_id.to_string(),
            parent_id: link.map(|l| l.parent_id.clone()),
            role: link.map(|l| l.role),
            iat: now.timestamp() as usize,
            exp: exp.timestamp() as usize,
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt.secret.as_bytes()),
        )?;
        Ok(token)
    }

    /// Decode and validate a JWT, returning the claims
    pub fn decode_jwt(config: &Config, token: &str) -> AppResult<Claims> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(config.jwt.secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }

    pub async fn hash_password(password: String) -> AppResult<String> {
        tokio::task::spawn_blocking(move || bcrypt::hash(password, HASH_COST))
            .await
            .map_err(|e| {
                AppError::Internal(anyhow::anyhow!("password hashing task failed: {}", e))
            })?
            .map_err(AppError::PasswordHash)
    }

    pub async fn verify_password(password: String, hash: String) -> AppResult<bool> {
        tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("password check task failed: {}", e)))?
            .map_err(AppError::PasswordHash)
    }

    /// Validate and hash a new account's credentials.
    pub async fn prepare_account(account: NewAccount) -> AppResult<CreateUser> {
        let mut v = Validator::new();
        validate_email(&mut v, &account.email);
        validate_username(&mut v, &account.username);
        validate_password(&mut v, &account.password);
        if let Some(name) = account.display_name.as_deref() {
            v.max_len("display_name", name, 100);
        }
        v.finish()?;

        Ok(CreateUser {
            email: account.email.trim().to_string(),
            username: account.username.trim().to_string(),
            password_hash: Self::hash_password(account.password).await?,
            display_name: account.display_name,
        })
    }

    pub async fn register(state: &Arc<AppState>, account: NewAccount) -> AppResult<(User, String)> {
        let data = Self::prepare_account(account).await?;
        let user = UserRepository::create(&state.db, data).await?;
        tracing::info!("Registered account {}", user.id);

        let token = Self::create_jwt(&state.config, &user.id, None)?;
        Ok((user, token))
    }

    /// Authenticate by email or username. Unknown accounts and wrong passwords
    /// are indistinguishable to the caller.
    pub async fn login(
        state: &Arc<AppState>,
        login: &str,
        password: String,
    ) -> AppResult<(User, Option<SubUserLink>, String)> {
        let user = UserRepository::find_by_login(&state.db, login)
            .await?
            .ok_or(AppError::Unauthorized)?;

        if !Self::verify_password(password, user.password_hash.clone()).await? {
            tracing::debug!("Rejected login for account {}", user.id);
            return Err(AppError::Unauthorized);
        }

        let link = SubUserRepository::find_by_user_id(&state.db, &user.id).await?;
        let token = Self::create_jwt(&state.config, &user.id, link.as_ref())?;
        Ok((user, link, token))
    }

    /// Change credentials or profile of the calling account. The current
    /// password must be supplied for any change.
    pub async fn update_account(
        state: &Arc<AppState>,
        identity: &Identity,
        changes: AccountChanges,
    ) -> AppResult<User> {
        let mut v = Validator::new();
        if let Some(email) = changes.email.as_deref() {
            validate_email(&mut v, email);
        }
        if let Some(username) = changes.username.as_deref() {
            validate_username(&mut v, username);
        }
        if let Some(password) = changes.password.as_deref() {
            validate_password(&mut v, password);
        }
        if let Some(name) = changes.display_name.as_deref() {
            v.max_len("display_name", name, 100);
        }
        v.finish()?;

        Self::confirm_password(identity, changes.current_password).await?;

        let password_hash = match changes.password {
            Some(password) => Some(Self::hash_password(password).await?),
            None => None,
        };

        UserRepository::update(
            &state.db,
            identity.id(),
            UpdateUser {
                email: changes.email.map(|e| e.trim().to_string()),
                username: changes.username.map(|u| u.trim().to_string()),
                password_hash,
                display_name: changes.display_name,
            },
        )
        .await
    }

    /// Delete the calling account and everything it owns. Refused while the
    /// account still has sub-users.
    pub async fn delete_account(
        state: &Arc<AppState>,
        identity: &Identity,
        password: String,
    ) -> AppResult<()> {
        Self::confirm_password(identity, password).await?;
        UserRepository::delete(&state.db, identity.id()).await?;
        tracing::info!("Deleted account {}", identity.id());
        Ok(())
    }

    async fn confirm_password(identity: &Identity, password: String) -> AppResult<()> {
        if password.is_empty() {
            return Err(AppError::Validation(vec![
                "current password is required".to_string(),
            ]));
        }
        if !Self::verify_password(password, identity.user.password_hash.clone()).await? {
            return Err(AppError::Unauthorized);
        }
        Ok(())
    }
}
