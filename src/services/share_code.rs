//! Time-boxed share codes.
//!
//! A share code is a signed token naming one pet. Nothing is stored when a code
//! is issued: signature and expiry decide its validity, and the only way to
//! revoke outstanding codes is to rotate the signing secret.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::db::{PetRepository, PetShareRepository, Role};
use crate::error::{AppError, AppResult};
use crate::services::authorization::{authorize_pet, PetAction};
use crate::services::identity::Identity;
use crate::services::pets::{PetDetails, PetService};
use crate::AppState;

pub const SHARE_CODE_TYPE: &str = "pet_share";

const INVALID_CODE: &str = "Invalid or expired share code";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareCodeClaims {
    pub pet_id: String,
    #[serde(rename = "type")]
    pub code_type: String,
    pub iat: usize,
    pub exp: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct IssuedShareCode {
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

pub struct ShareCodeService;

impl ShareCodeService {
    fn sign(config: &Config, claims: &ShareCodeClaims) -> AppResult<String> {
        let secret = config.share_code.signing_secret(&config.jwt);
        Ok(encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )?)
    }

    /// Mint a code for `pet_id` valid for `ttl`.
    pub fn mint(config: &Config, pet_id: &str, ttl: Duration) -> AppResult<IssuedShareCode> {
        let now = Utc::now();
        let expires_at = now + ttl;
        let claims = ShareCodeClaims {
            pet_id: pet_id.to_string(),
            code_type: SHARE_CODE_TYPE.to_string(),
            iat: now.timestamp() as usize,
            exp: expires_at.timestamp() as usize,
        };

        Ok(IssuedShareCode {
            code: Self::sign(config, &claims)?,
            expires_at,
        })
    }

    /// Check signature, expiry and type. Every failure yields the same
    /// client-facing error; the reason is only logged.
    pub fn verify(config: &Config, code: &str) -> AppResult<ShareCodeClaims> {
        let secret = config.share_code.signing_secret(&config.jwt);
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let claims = decode::<ShareCodeClaims>(
            code.trim(),
            &DecodingKey::from_secret(secret.as_bytes()),
            &validation,
        )
        .map_err(|e| {
            tracing::debug!("Share code rejected: {:?}", e);
            AppError::BadRequest(INVALID_CODE.to_string())
        })?
        .claims;

        if claims.code_type != SHARE_CODE_TYPE {
            tracing::debug!("Share code rejected: unexpected type {:?}", claims.code_type);
            return Err(AppError::BadRequest(INVALID_CODE.to_string()));
        }

        Ok(claims)
    }

    /// Issue a code for a pet the actor owns directly. `ttl_hours` defaults to
    /// the configured validity and may not exceed the configured maximum.
    pub async fn issue(
        state: &Arc<AppState>,
        actor: &Identity,
        pet_id: &str,
        ttl_hours: Option<i64>,
    ) -> AppResult<IssuedShareCode> {
        let settings = &state.config.share_code;
        let ttl_hours = ttl_hours.unwrap_or(settings.default_ttl_hours);
        if ttl_hours <= 0 || ttl_hours > settings.max_ttl_hours {
            return Err(AppError::Validation(vec![format!(
                "ttl_hours must be between 1 and {}",
                settings.max_ttl_hours
            )]));
        }

        let pet = authorize_pet(state, actor, pet_id, PetAction::Manage).await?;
        let issued = Self::mint(&state.config, &pet.id, Duration::hours(ttl_hours))?;
        tracing::info!(
            "Issued share code for pet {} valid until {}",
            pet.id,
            issued.expires_at
        );
        Ok(issued)
    }

    /// Redeem a code: grant the actor caretaker access to the pet and return
    /// the pet's full record.
    pub async fn redeem(
        state: &Arc<AppState>,
        actor: &Identity,
        code: &str,
    ) -> AppResult<PetDetails> {
        let claims = Self::verify(&state.config, code)?;

        let pet = PetRepository::find_by_id(&state.db, &claims.pet_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Pet not found".to_string()))?;

        if pet.owner_id == actor.id() {
            return Err(AppError::BadRequest(
                "You cannot redeem a share code for your own pet".to_string(),
            ));
        }

        let grant =
            PetShareRepository::create_if_absent(&state.db, &pet.id, actor.id(), Role::Caretaker)
                .await?;
        if grant.is_none() {
            return Err(AppError::Conflict(
                "You already have access to this pet".to_string(),
            ));
        }

        tracing::info!("Account {} redeemed a share code for pet {}", actor.id(), pet.id);
        PetService::details(&state.db, pet, actor.id()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{create_pet, create_user, test_state};
    use crate::db::User;

    fn actor(user: &User) -> Identity {
        Identity {
            user: user.clone(),
            parent_id: None,
            role: None,
        }
    }

    #[tokio::test]
    async fn redeem_grants_caretaker_once() {
        let (state, _db) = test_state().await;
        let owner = create_user(&state.db, "owner").await;
        let friend = create_user(&state.db, "friend").await;
        let pet = create_pet(&state.db, &owner.id, "Rex").await;

        let issued = ShareCodeService::issue(&state, &actor(&owner), &pet.id, None)
            .await
            .unwrap();
        let details = ShareCodeService::redeem(&state, &actor(&friend), &issued.code)
            .await
            .unwrap();
        assert_eq!(details.pet.id, pet.id);
        assert_eq!(details.shared_role, Some(Role::Caretaker));

        let grant = PetShareRepository::find(&state.db, &pet.id, &friend.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(grant.role, Role::Caretaker);

        assert!(matches!(
            ShareCodeService::redeem(&state, &actor(&friend), &issued.code).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn owner_cannot_redeem_own_code() {
        let (state, _db) = test_state().await;
        let owner = create_user(&state.db, "owner").await;
        let pet = create_pet(&state.db, &owner.id, "Rex").await;

        let issued = ShareCodeService::issue(&state, &actor(&owner), &pet.id, None)
            .await
            .unwrap();
        assert!(matches!(
            ShareCodeService::redeem(&state, &actor(&owner), &issued.code).await,
            Err(AppError::BadRequest(_))
        ));
        assert!(PetShareRepository::list_for_pet(&state.db, &pet.id)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn expired_code_is_invalid() {
        let (state, _db) = test_state().await;
        let owner = create_user(&state.db, "owner").await;
        let friend = create_user(&state.db, "friend").await;
        let pet = create_pet(&state.db, &owner.id, "Rex").await;

        let past = Utc::now() - Duration::hours(25);
        let claims = ShareCodeClaims {
            pet_id: pet.id.clone(),
            code_type: SHARE_CODE_TYPE.to_string(),
            iat: past.timestamp() as usize,
            exp: (past + Duration::hours(24)).timestamp() as usize,
        };
        let code = ShareCodeService::sign(&state.config, &claims).unwrap();

        match ShareCodeService::redeem(&state, &actor(&friend), &code).await {
            Err(AppError::BadRequest(msg)) => assert_eq!(msg, INVALID_CODE),
            other => panic!("expected invalid code, got {:?}", other.map(|d| d.pet.id)),
        }
    }

    #[tokio::test]
    async fn failures_share_one_message() {
        let (state, _db) = test_state().await;
        let config = &state.config;

        let wrong_type = ShareCodeClaims {
            pet_id: "p1".to_string(),
            code_type: "session".to_string(),
            iat: Utc::now().timestamp() as usize,
            exp: (Utc::now() + Duration::hours(1)).timestamp() as usize,
        };
        let wrong_type = ShareCodeService::sign(config, &wrong_type).unwrap();

        let mut other = config.clone();
        other.share_code.secret = Some("rotated".to_string());
        let foreign = ShareCodeService::mint(&other, "p1", Duration::hours(1))
            .unwrap()
            .code;

        for code in [wrong_type.as_str(), foreign.as_str(), "garbage"] {
            match ShareCodeService::verify(config, code) {
                Err(AppError::BadRequest(msg)) => assert_eq!(msg, INVALID_CODE),
                other => panic!("expected invalid code, got {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn deleted_pet_is_not_found() {
        let (state, _db) = test_state().await;
        let owner = create_user(&state.db, "owner").await;
        let friend = create_user(&state.db, "friend").await;
        let pet = create_pet(&state.db, &owner.id, "Rex").await;

        let issued = ShareCodeService::mint(&state.config, &pet.id, Duration::hours(1)).unwrap();
        PetRepository::delete(&state.db, &pet.id).await.unwrap();

        assert!(matches!(
            ShareCodeService::redeem(&state, &actor(&friend), &issued.code).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn only_direct_owner_issues_within_ttl_bounds() {
        let (state, _db) = test_state().await;
        let owner = create_user(&state.db, "owner").await;
        let friend = create_user(&state.db, "friend").await;
        let pet = create_pet(&state.db, &owner.id, "Rex").await;
        PetShareRepository::create_if_absent(&state.db, &pet.id, &friend.id, Role::Caretaker)
            .await
            .unwrap();

        assert!(matches!(
            ShareCodeService::issue(&state, &actor(&friend), &pet.id, None).await,
            Err(AppError::Forbidden)
        ));
        assert!(matches!(
            ShareCodeService::issue(&state, &actor(&owner), &pet.id, Some(0)).await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            ShareCodeService::issue(&state, &actor(&owner), &pet.id, Some(24 * 365)).await,
            Err(AppError::Validation(_))
        ));

        let issued = ShareCodeService::issue(&state, &actor(&owner), &pet.id, Some(2))
            .await
            .unwrap();
        let remaining = issued.expires_at - Utc::now();
        assert!(remaining <= Duration::hours(2) && remaining > Duration::minutes(110));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_redemptions_create_one_grant() {
        let (state, _db) = test_state().await;
        let owner = create_user(&state.db, "owner").await;
        let friend = create_user(&state.db, "friend").await;
        let pet = create_pet(&state.db, &owner.id, "Rex").await;
        let code = ShareCodeService::mint(&state.config, &pet.id, Duration::hours(1))
            .unwrap()
            .code;

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let state = state.clone();
                let identity = actor(&friend);
                let code = code.clone();
                tokio::spawn(async move {
                    ShareCodeService::redeem(&state, &identity, &code)
                        .await
                        .map(|_| ())
                })
            })
            .collect();

        let mut succeeded = 0;
        let mut conflicted = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(()) => succeeded += 1,
                Err(AppError::Conflict(_)) => conflicted += 1,
                Err(e) => panic!("unexpected error: {}", e),
            }
        }
        assert_eq!((succeeded, conflicted), (1, 1));

        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM pet_shares WHERE pet_id = ? AND user_id = ?")
                .bind(&pet.id)
                .bind(&friend.id)
                .fetch_one(&state.db)
                .await
                .unwrap();
        assert_eq!(count, 1);
    }
}
