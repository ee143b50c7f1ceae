//! Permission decisions for pets and the records hanging off them.
//!
//! Decisions are plain booleans. The `authorize_*`/`ensure_*` helpers turn a
//! denial into the response the caller should see: 404 while the pet's
//! existence has not been shown to the actor, 403 afterwards.

use std::sync::Arc;

use sqlx::SqlitePool;

use crate::db::{Pet, PetRepository, PetShareRepository};
use crate::error::{AppError, AppResult};
use crate::services::identity::Identity;
use crate::AppState;

/// What an actor wants to do with a pet or one of its records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PetAction {
    /// Read the pet and its records.
    View,
    /// Add or edit calendar entries.
    Contribute,
    /// Create, edit or delete medical and activity records.
    Mutate,
    /// Rename, delete, share the pet itself.
    Manage,
}

/// Whether `actor` may mutate records of a pet owned by `pet_owner_id`: the
/// owner itself, or an owner-equivalent sub-user of the owner.
pub fn can_act_on_pet(actor: &Identity, pet_owner_id: &str) -> bool {
    actor.id() == pet_owner_id || actor.is_owner_equivalent_of(pet_owner_id)
}

/// 403 unless `actor` may act on records owned by `pet_owner_id`. Callers have
/// already resolved the owner through the record, so existence is not hidden.
pub fn ensure_can_act_on_pet(actor: &Identity, pet_owner_id: &str) -> AppResult<()> {
    if can_act_on_pet(actor, pet_owner_id) {
        return Ok(());
    }
    tracing::warn!(
        "Actor {} denied mutation on records of account {}",
        actor.id(),
        pet_owner_id
    );
    Err(AppError::Forbidden)
}

/// Whether `actor_id` owns the pet or holds a share grant on it.
pub async fn can_access_pet_resource(
    pool: &SqlitePool,
    pet_id: &str,
    actor_id: &str,
) -> AppResult<bool> {
    match PetRepository::find_owner_id(pool, pet_id).await? {
        Some(owner_id) if owner_id == actor_id => Ok(true),
        Some(_) => PetShareRepository::exists(pool, pet_id, actor_id).await,
        None => Ok(false),
    }
}

/// Visibility matches the "list mine" reads: pets of the effective account,
/// pets the actor may act on, and pets shared with the actor.
pub async fn can_view_pet(pool: &SqlitePool, actor: &Identity, pet: &Pet) -> AppResult<bool> {
    if actor.effective_account_id() == pet.owner_id || can_act_on_pet(actor, &pet.owner_id) {
        return Ok(true);
    }
    can_access_pet_resource(pool, &pet.id, actor.id()).await
}

async fn permits(
    pool: &SqlitePool,
    actor: &Identity,
    pet: &Pet,
    action: PetAction,
) -> AppResult<bool> {
    Ok(match action {
        PetAction::View => can_view_pet(pool, actor, pet).await?,
        PetAction::Contribute => {
            can_act_on_pet(actor, &pet.owner_id)
                || can_access_pet_resource(pool, &pet.id, actor.id()).await?
        }
        PetAction::Mutate => can_act_on_pet(actor, &pet.owner_id),
        PetAction::Manage => actor.id() == pet.owner_id,
    })
}

/// Load a pet the actor addressed directly and check `action` on it.
/// Absent and invisible pets are both reported as not found.
pub async fn authorize_pet(
    state: &Arc<AppState>,
    actor: &Identity,
    pet_id: &str,
    action: PetAction,
) -> AppResult<Pet> {
    let pet = PetRepository::find_by_id(&state.db, pet_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Pet not found".to_string()))?;

    if !can_view_pet(&state.db, actor, &pet).await? {
        tracing::warn!("Actor {} has no visibility of pet {}", actor.id(), pet.id);
        return Err(AppError::NotFound("Pet not found".to_string()));
    }

    if action != PetAction::View && !permits(&state.db, actor, &pet, action).await? {
        tracing::warn!(
            "Actor {} denied {:?} on pet {}",
            actor.id(),
            action,
            pet.id
        );
        return Err(AppError::Forbidden);
    }

    Ok(pet)
}

/// Check `action` on the pet of a record whose existence is already known.
pub async fn ensure_pet_permission(
    state: &Arc<AppState>,
    actor: &Identity,
    pet_id: &str,
    action: PetAction,
) -> AppResult<Pet> {
    let pet = PetRepository::find_by_id(&state.db, pet_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Pet not found".to_string()))?;

    if !permits(&state.db, actor, &pet, action).await? {
        tracing::warn!(
            "Actor {} denied {:?} on a record of pet {}",
            actor.id(),
            action,
            pet.id
        );
        return Err(AppError::Forbidden);
    }

    Ok(pet)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{create_pet, create_user, test_state};
    use crate::db::{Role, User};

    fn actor(user: &User, parent: Option<&User>, role: Option<Role>) -> Identity {
        Identity {
            user: user.clone(),
            parent_id: parent.map(|p| p.id.clone()),
            role,
        }
    }

    #[tokio::test]
    async fn owner_and_owner_equivalent_can_act() {
        let (state, _db) = test_state().await;
        let owner = create_user(&state.db, "owner").await;
        let deputy = create_user(&state.db, "deputy").await;
        let stranger = create_user(&state.db, "stranger").await;

        assert!(can_act_on_pet(&actor(&owner, None, None), &owner.id));
        assert!(can_act_on_pet(
            &actor(&deputy, Some(&owner), Some(Role::Owner)),
            &owner.id
        ));
        assert!(!can_act_on_pet(&actor(&stranger, None, None), &owner.id));
    }

    #[tokio::test]
    async fn ensure_can_act_maps_denial_to_forbidden() {
        let (state, _db) = test_state().await;
        let owner = create_user(&state.db, "owner").await;
        let vet = create_user(&state.db, "vet").await;
        let vet = actor(&vet, Some(&owner), Some(Role::Veterinarian));

        assert!(ensure_can_act_on_pet(&actor(&owner, None, None), &owner.id).is_ok());
        assert!(matches!(
            ensure_can_act_on_pet(&vet, &owner.id),
            Err(AppError::Forbidden)
        ));
    }

    #[tokio::test]
    async fn caretaker_and_vet_sub_users_cannot_act_but_grants_give_access() {
        let (state, _db) = test_state().await;
        let owner = create_user(&state.db, "owner").await;
        let pet = create_pet(&state.db, &owner.id, "Rex").await;

        for (name, role) in [("carer", Role::Caretaker), ("vet", Role::Veterinarian)] {
            let sub = create_user(&state.db, name).await;
            let identity = actor(&sub, Some(&owner), Some(role));

            assert!(!can_act_on_pet(&identity, &owner.id));
            assert!(!can_access_pet_resource(&state.db, &pet.id, &sub.id)
                .await
                .unwrap());

            PetShareRepository::create_if_absent(&state.db, &pet.id, &sub.id, Role::Caretaker)
                .await
                .unwrap();
            assert!(can_access_pet_resource(&state.db, &pet.id, &sub.id)
                .await
                .unwrap());
            assert!(!can_act_on_pet(&identity, &owner.id));
        }
    }

    #[tokio::test]
    async fn missing_pet_grants_nothing() {
        let (state, _db) = test_state().await;
        let user = create_user(&state.db, "user").await;
        assert!(!can_access_pet_resource(&state.db, "no-such-pet", &user.id)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn invisible_pets_are_masked_as_not_found() {
        let (state, _db) = test_state().await;
        let owner = create_user(&state.db, "owner").await;
        let stranger = create_user(&state.db, "stranger").await;
        let pet = create_pet(&state.db, &owner.id, "Rex").await;
        let stranger = actor(&stranger, None, None);

        for action in [PetAction::View, PetAction::Mutate, PetAction::Manage] {
            assert!(matches!(
                authorize_pet(&state, &stranger, &pet.id, action).await,
                Err(AppError::NotFound(_))
            ));
        }
        assert!(matches!(
            authorize_pet(&state, &stranger, "missing", PetAction::View).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn visible_but_unauthorized_is_forbidden() {
        let (state, _db) = test_state().await;
        let owner = create_user(&state.db, "owner").await;
        let carer = create_user(&state.db, "carer").await;
        let pet = create_pet(&state.db, &owner.id, "Rex").await;
        let carer = actor(&carer, Some(&owner), Some(Role::Caretaker));

        let seen = authorize_pet(&state, &carer, &pet.id, PetAction::View)
            .await
            .unwrap();
        assert_eq!(seen.id, pet.id);

        assert!(matches!(
            authorize_pet(&state, &carer, &pet.id, PetAction::Mutate).await,
            Err(AppError::Forbidden)
        ));
        assert!(matches!(
            ensure_pet_permission(&state, &carer, &pet.id, PetAction::Mutate).await,
            Err(AppError::Forbidden)
        ));
    }

    #[tokio::test]
    async fn grantees_may_contribute_but_not_mutate() {
        let (state, _db) = test_state().await;
        let owner = create_user(&state.db, "owner").await;
        let friend = create_user(&state.db, "friend").await;
        let pet = create_pet(&state.db, &owner.id, "Rex").await;
        PetShareRepository::create_if_absent(&state.db, &pet.id, &friend.id, Role::Caretaker)
            .await
            .unwrap();
        let friend = actor(&friend, None, None);

        authorize_pet(&state, &friend, &pet.id, PetAction::Contribute)
            .await
            .unwrap();
        assert!(matches!(
            authorize_pet(&state, &friend, &pet.id, PetAction::Mutate).await,
            Err(AppError::Forbidden)
        ));
    }

    #[tokio::test]
    async fn only_direct_owner_manages_pet() {
        let (state, _db) = test_state().await;
        let owner = create_user(&state.db, "owner").await;
        let deputy = create_user(&state.db, "deputy").await;
        let pet = create_pet(&state.db, &owner.id, "Rex").await;
        let deputy = actor(&deputy, Some(&owner), Some(Role::Owner));

        authorize_pet(&state, &deputy, &pet.id, PetAction::Mutate)
            .await
            .unwrap();
        assert!(matches!(
            authorize_pet(&state, &deputy, &pet.id, PetAction::Manage).await,
            Err(AppError::Forbidden)
        ));
        authorize_pet(&state, &actor(&owner, None, None), &pet.id, PetAction::Manage)
            .await
            .unwrap();
    }
}
