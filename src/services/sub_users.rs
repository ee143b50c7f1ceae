use std::sync::Arc;

use crate::db::{
    InvitationView, LinkedAccount, Role, SubUserInvitationRepository, SubUserRepository,
    UserRepository,
};
use crate::error::{AppError, AppResult};
use crate::services::auth::{AuthService, NewAccount};
use crate::services::identity::Identity;
use crate::AppState;

pub struct SubUserService;

impl SubUserService {
    /// Only top-level accounts may delegate.
    fn ensure_can_delegate(parent: &Identity) -> AppResult<()> {
        if parent.is_sub_user() {
            tracing::warn!("Sub-user {} attempted to manage sub-users", parent.id());
            return Err(AppError::Forbidden);
        }
        Ok(())
    }

    /// Create a new account linked under `parent`. Account and link are
    /// written in one transaction.
    pub async fn register(
        state: &Arc<AppState>,
        parent: &Identity,
        account: NewAccount,
        role: Role,
    ) -> AppResult<LinkedAccount> {
        Self::ensure_can_delegate(parent)?;
        let data = AuthService::prepare_account(account).await?;

        let mut tx = state.db.begin().await?;
        let user = UserRepository::create_in(&mut tx, data).await?;
        let link = SubUserRepository::create_in(&mut tx, parent.id(), &user.id, role).await?;
        tx.commit().await?;

        tracing::info!(
            "Account {} registered sub-user {} as {}",
            parent.id(),
            user.id,
            role
        );

        Ok(LinkedAccount {
            user_id: user.id,
            email: user.email,
            username: user.username,
            display_name: user.display_name,
            role: link.role,
            linked_at: link.created_at,
        })
    }

    /// Invite an existing account, found by email or username, to become a
    /// sub-user of `parent`. Nothing changes for the invitee until it accepts.
    pub async fn invite(
        state: &Arc<AppState>,
        parent: &Identity,
        login: &str,
        role: Role,
    ) -> AppResult<InvitationView> {
        Self::ensure_can_delegate(parent)?;

        let user = UserRepository::find_by_login(&state.db, login)
            .await?
            .ok_or_else(|| AppError::NotFound("Account not found".to_string()))?;

        if SubUserRepository::find_by_user_id(&state.db, &user.id)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(
                "Account is already linked as a sub-user".to_string(),
            ));
        }
        if SubUserRepository::count_children(&state.db, &user.id).await? > 0 {
            return Err(AppError::Conflict(
                "An account with sub-users cannot become a sub-user".to_string(),
            ));
        }

        let invitation =
            SubUserInvitationRepository::create(&state.db, parent.id(), &user.id, role).await?;
        tracing::info!(
            "Account {} invited {} as {}",
            parent.id(),
            user.id,
            role
        );

        Ok(InvitationView {
            id: invitation.id,
            user_id: user.id,
            email: user.email,
            username: user.username,
            display_name: user.display_name,
            role: invitation.role,
            invited_at: invitation.created_at,
        })
    }

    /// Invitations the actor has sent and not yet seen answered.
    pub async fn sent_invitations(
        state: &Arc<AppState>,
        parent: &Identity,
    ) -> AppResult<Vec<InvitationView>> {
        SubUserInvitationRepository::list_sent(&state.db, parent.id()).await
    }

    /// Invitations waiting for the actor's answer.
    pub async fn received_invitations(
        state: &Arc<AppState>,
        actor: &Identity,
    ) -> AppResult<Vec<InvitationView>> {
        SubUserInvitationRepository::list_received(&state.db, actor.id()).await
    }

    /// Accept an invitation addressed to the actor. The link is created and
    /// every other pending invitation for the actor is dropped in the same
    /// transaction. Returns the new parent.
    pub async fn accept(
        state: &Arc<AppState>,
        actor: &Identity,
        invitation_id: &str,
    ) -> AppResult<LinkedAccount> {
        let invitation = SubUserInvitationRepository::find_by_id(&state.db, invitation_id)
            .await?
            .filter(|i| i.user_id == actor.id())
            .ok_or_else(|| AppError::NotFound("Invitation not found".to_string()))?;

        if SubUserRepository::count_children(&state.db, actor.id()).await? > 0 {
            return Err(AppError::Conflict(
                "An account with sub-users cannot become a sub-user".to_string(),
            ));
        }
        if SubUserRepository::find_by_user_id(&state.db, &invitation.parent_id)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(
                "The inviting account is itself a sub-user".to_string(),
            ));
        }

        let mut tx = state.db.begin().await?;
        SubUserRepository::create_in(&mut tx, &invitation.parent_id, actor.id(), invitation.role)
            .await?;
        SubUserInvitationRepository::delete_received_in(&mut tx, actor.id()).await?;
        tx.commit().await?;

        tracing::info!(
            "Account {} accepted link under {} as {}",
            actor.id(),
            invitation.parent_id,
            invitation.role
        );

        SubUserRepository::find_parent(&state.db, actor.id())
            .await?
            .ok_or_else(|| AppError::NotFound("Parent account not found".to_string()))
    }

    /// Decline (invitee) or withdraw (parent) an invitation.
    pub async fn dismiss(
        state: &Arc<AppState>,
        actor: &Identity,
        invitation_id: &str,
    ) -> AppResult<()> {
        let invitation = SubUserInvitationRepository::find_by_id(&state.db, invitation_id)
            .await?
            .filter(|i| i.user_id == actor.id() || i.parent_id == actor.id())
            .ok_or_else(|| AppError::NotFound("Invitation not found".to_string()))?;

        SubUserInvitationRepository::delete(&state.db, &invitation.id).await?;
        tracing::info!("Actor {} dismissed invitation {}", actor.id(), invitation.id);
        Ok(())
    }

    pub async fn list(state: &Arc<AppState>, parent: &Identity) -> AppResult<Vec<LinkedAccount>> {
        SubUserRepository::list_children(&state.db, parent.id()).await
    }

    pub async fn change_role(
        state: &Arc<AppState>,
        parent: &Identity,
        user_id: &str,
        role: Role,
    ) -> AppResult<()> {
        SubUserRepository::update_role(&state.db, parent.id(), user_id, role)
            .await?
            .ok_or_else(|| AppError::NotFound("Sub-user not found".to_string()))?;
        tracing::info!("Account {} set role of {} to {}", parent.id(), user_id, role);
        Ok(())
    }

    /// Unlink `user_id` from its parent. Allowed for the parent, the sub-user
    /// itself and super-admins. The account is kept.
    pub async fn remove(state: &Arc<AppState>, actor: &Identity, user_id: &str) -> AppResult<()> {
        let link = SubUserRepository::find_by_user_id(&state.db, user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Sub-user not found".to_string()))?;

        let allowed =
            actor.id() == link.parent_id || actor.id() == link.user_id || actor.is_admin();
        if !allowed {
            tracing::warn!("Actor {} denied unlinking sub-user {}", actor.id(), user_id);
            return Err(AppError::Forbidden);
        }

        SubUserRepository::delete_by_user_id(&state.db, user_id).await?;
        tracing::info!("Actor {} unlinked sub-user {}", actor.id(), user_id);
        Ok(())
    }

    /// The actor leaves its parent account.
    pub async fn leave(state: &Arc<AppState>, actor: &Identity) -> AppResult<()> {
        if !SubUserRepository::delete_by_user_id(&state.db, actor.id()).await? {
            return Err(AppError::NotFound("Not linked to a parent account".to_string()));
        }
        tracing::info!("Sub-user {} left its parent account", actor.id());
        Ok(())
    }

    pub async fn parent_of(
        state: &Arc<AppState>,
        user_id: &str,
    ) -> AppResult<Option<LinkedAccount>> {
        SubUserRepository::find_parent(&state.db, user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{create_pet, create_user, test_state};
    use crate::db::{PetRepository, User};

    fn actor(user: &User) -> Identity {
        Identity {
            user: user.clone(),
            parent_id: None,
            role: None,
        }
    }

    fn new_account(username: &str) -> NewAccount {
        NewAccount {
            email: format!("{}@example.com", username),
            username: username.to_string(),
            password: "correct horse".to_string(),
            display_name: None,
        }
    }

    /// Invite `child` under `parent` and have it accept.
    async fn link(state: &Arc<AppState>, parent: &User, child: &User, role: Role) {
        let invitation = SubUserService::invite(state, &actor(parent), &child.username, role)
            .await
            .unwrap();
        SubUserService::accept(state, &actor(child), &invitation.id)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn register_links_new_account() {
        let (state, _db) = test_state().await;
        let parent = create_user(&state.db, "parent").await;

        let linked = SubUserService::register(
            &state,
            &actor(&parent),
            new_account("walker"),
            Role::Caretaker,
        )
        .await
        .unwrap();
        assert_eq!(linked.role, Role::Caretaker);

        let parent_view = SubUserService::parent_of(&state, &linked.user_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(parent_view.user_id, parent.id);
    }

    #[tokio::test]
    async fn failed_registration_leaves_no_account() {
        let (state, _db) = test_state().await;
        let parent = create_user(&state.db, "parent").await;
        create_user(&state.db, "taken").await;

        let mut account = new_account("fresh");
        account.username = "taken".to_string();
        assert!(matches!(
            SubUserService::register(&state, &actor(&parent), account, Role::Owner).await,
            Err(AppError::Conflict(_))
        ));
        assert!(UserRepository::find_by_email(&state.db, "fresh@example.com")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn pending_invitation_does_not_change_the_invitee() {
        let (state, _db) = test_state().await;
        let parent = create_user(&state.db, "parent").await;
        let target = create_user(&state.db, "target").await;
        let own_pet = create_pet(&state.db, &target.id, "Mittens").await;
        create_pet(&state.db, &parent.id, "Rex").await;

        let invitation =
            SubUserService::invite(&state, &actor(&parent), "target@example.com", Role::Owner)
                .await
                .unwrap();
        assert_eq!(invitation.user_id, target.id);

        assert!(SubUserService::parent_of(&state, &target.id)
            .await
            .unwrap()
            .is_none());
        let visible = PetRepository::list_visible(&state.db, &target.id, &target.id)
            .await
            .unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].pet.id, own_pet.id);

        // Only the invitee can accept.
        assert!(matches!(
            SubUserService::accept(&state, &actor(&parent), &invitation.id).await,
            Err(AppError::NotFound(_))
        ));

        let parent_view = SubUserService::accept(&state, &actor(&target), &invitation.id)
            .await
            .unwrap();
        assert_eq!(parent_view.user_id, parent.id);
        assert_eq!(parent_view.role, Role::Owner);
        assert!(SubUserService::received_invitations(&state, &actor(&target))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn declined_invitation_is_gone() {
        let (state, _db) = test_state().await;
        let parent = create_user(&state.db, "parent").await;
        let target = create_user(&state.db, "target").await;
        let stranger = create_user(&state.db, "stranger").await;

        let invitation = SubUserService::invite(&state, &actor(&parent), "target", Role::Caretaker)
            .await
            .unwrap();
        assert!(matches!(
            SubUserService::dismiss(&state, &actor(&stranger), &invitation.id).await,
            Err(AppError::NotFound(_))
        ));

        SubUserService::dismiss(&state, &actor(&target), &invitation.id)
            .await
            .unwrap();
        assert!(matches!(
            SubUserService::accept(&state, &actor(&target), &invitation.id).await,
            Err(AppError::NotFound(_))
        ));
        assert!(SubUserService::sent_invitations(&state, &actor(&parent))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn delegation_is_one_level_deep() {
        let (state, _db) = test_state().await;
        let parent = create_user(&state.db, "parent").await;
        let child = create_user(&state.db, "child").await;
        let grandchild = create_user(&state.db, "grandchild").await;

        link(&state, &parent, &child, Role::Owner).await;

        let child_identity = Identity {
            user: child.clone(),
            parent_id: Some(parent.id.clone()),
            role: Some(Role::Owner),
        };
        assert!(matches!(
            SubUserService::invite(&state, &child_identity, "grandchild", Role::Caretaker).await,
            Err(AppError::Forbidden)
        ));

        assert!(matches!(
            SubUserService::invite(&state, &actor(&grandchild), "parent", Role::Caretaker).await,
            Err(AppError::Conflict(_))
        ));
        assert!(matches!(
            SubUserService::invite(&state, &actor(&grandchild), "child", Role::Caretaker).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn accepting_after_gaining_sub_users_is_refused() {
        let (state, _db) = test_state().await;
        let parent = create_user(&state.db, "parent").await;
        let target = create_user(&state.db, "target").await;
        let helper = create_user(&state.db, "helper").await;

        let invitation = SubUserService::invite(&state, &actor(&parent), "target", Role::Owner)
            .await
            .unwrap();
        link(&state, &target, &helper, Role::Caretaker).await;

        assert!(matches!(
            SubUserService::accept(&state, &actor(&target), &invitation.id).await,
            Err(AppError::Conflict(_))
        ));
        assert!(SubUserService::parent_of(&state, &target.id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn removal_rights() {
        let (state, _db) = test_state().await;
        let parent = create_user(&state.db, "parent").await;
        let child = create_user(&state.db, "child").await;
        let stranger = create_user(&state.db, "stranger").await;
        let admin = create_user(&state.db, "admin").await;
        sqlx::query("UPDATE users SET is_admin = 1 WHERE id = ?")
            .bind(&admin.id)
            .execute(&state.db)
            .await
            .unwrap();
        let admin = UserRepository::find_by_id(&state.db, &admin.id)
            .await
            .unwrap()
            .unwrap();

        link(&state, &parent, &child, Role::Caretaker).await;
        assert!(matches!(
            SubUserService::remove(&state, &actor(&stranger), &child.id).await,
            Err(AppError::Forbidden)
        ));

        SubUserService::remove(&state, &actor(&admin), &child.id)
            .await
            .unwrap();
        assert!(SubUserService::parent_of(&state, &child.id)
            .await
            .unwrap()
            .is_none());
        assert!(UserRepository::find_by_id(&state.db, &child.id)
            .await
            .unwrap()
            .is_some());

        assert!(matches!(
            SubUserService::remove(&state, &actor(&parent), &child.id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn sub_user_can_leave() {
        let (state, _db) = test_state().await;
        let parent = create_user(&state.db, "parent").await;
        let child = create_user(&state.db, "child").await;
        link(&state, &parent, &child, Role::Veterinarian).await;

        SubUserService::leave(&state, &actor(&child)).await.unwrap();
        assert!(SubUserService::parent_of(&state, &child.id)
            .await
            .unwrap()
            .is_none());
        assert!(matches!(
            SubUserService::leave(&state, &actor(&child)).await,
            Err(AppError::NotFound(_))
        ));
    }
}
