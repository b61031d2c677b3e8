//! Role checks for privileged endpoints.
//!
//! The role and blocked flag stored in the session at login are trusted when
//! they grant access. When they would deny it, the user is re-read from the
//! database before deciding: the session may simply be stale (an account
//! promoted since login), and a fresh read is the only answer that counts.
//!
//! The flip side is that a demotion or block of a signed-in admin takes
//! effect only once their session claims stop granting access, i.e. at the
//! next login or when the session expires.

use std::future::Future;

use thiserror::Error;

use animart_core::{UserId, UserRole};

use crate::db::{RepositoryError, UserRepository};
use crate::models::session::CurrentUser;
use crate::models::user::User;

/// Roles allowed into the admin back-office.
pub const ADMIN_ROLES: &[UserRole] = &[UserRole::Admin];

/// Source of truth for account state.
pub trait UserDirectory {
    /// Fetch the current state of an account.
    fn find_user(
        &self,
        id: UserId,
    ) -> impl Future<Output = Result<Option<User>, RepositoryError>> + Send;
}

impl UserDirectory for UserRepository<'_> {
    fn find_user(
        &self,
        id: UserId,
    ) -> impl Future<Output = Result<Option<User>, RepositoryError>> + Send {
        self.get_by_id(id)
    }
}

/// Why a request was not authorized.
#[derive(Debug, Error)]
pub enum AuthzError {
    /// No session, or the session's user no longer exists.
    #[error("authentication required")]
    Unauthenticated,

    /// Authenticated, but blocked or without a permitted role.
    #[error("insufficient permissions")]
    Forbidden,

    /// The user lookup failed.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Outcome of a successful check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authorized {
    /// The session claims were enough.
    Trusted(CurrentUser),
    /// The database had to be consulted. The session should be updated with
    /// these claims.
    Refreshed(CurrentUser),
}

impl Authorized {
    #[must_use]
    pub fn user(&self) -> &CurrentUser {
        match self {
            Self::Trusted(u) | Self::Refreshed(u) => u,
        }
    }

    #[must_use]
    pub fn into_user(self) -> CurrentUser {
        match self {
            Self::Trusted(u) | Self::Refreshed(u) => u,
        }
    }
}

/// Whether the session claims alone permit access.
#[must_use]
pub fn claims_permit(claims: &CurrentUser, allowed: &[UserRole]) -> bool {
    !claims.is_blocked && allowed.contains(&claims.role)
}

/// Check that the session user holds one of `allowed` and is not blocked.
///
/// # Errors
///
/// - [`AuthzError::Unauthenticated`] if there is no session user, or the
///   database no longer knows them.
/// - [`AuthzError::Forbidden`] if the user is blocked or lacks the role.
/// - [`AuthzError::Repository`] if the fallback lookup fails.
pub async fn require_role<D: UserDirectory + Sync>(
    directory: &D,
    claims: Option<&CurrentUser>,
    allowed: &[UserRole],
) -> Result<Authorized, AuthzError> {
    let claims = claims.ok_or(AuthzError::Unauthenticated)?;

    if claims_permit(claims, allowed) {
        return Ok(Authorized::Trusted(claims.clone()));
    }

    let user = directory
        .find_user(claims.id)
        .await?
        .ok_or(AuthzError::Unauthenticated)?;

    if user.is_blocked || !allowed.contains(&user.role) {
        tracing::warn!(
            user_id = %user.id,
            role = %user.role,
            blocked = user.is_blocked,
            "authorization denied"
        );
        return Err(AuthzError::Forbidden);
    }

    Ok(Authorized::Refreshed(CurrentUser::from(&user)))
}

/// [`require_role`] for the admin back-office.
///
/// # Errors
///
/// See [`require_role`].
pub async fn require_admin<D: UserDirectory + Sync>(
    directory: &D,
    claims: Option<&CurrentUser>,
) -> Result<Authorized, AuthzError> {
    require_role(directory, claims, ADMIN_ROLES).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::Utc;

    use animart_core::Email;

    use super::*;

    #[derive(Default)]
    struct FakeDirectory {
        users: HashMap<UserId, User>,
        lookups: AtomicUsize,
        fail: bool,
    }

    impl FakeDirectory {
        fn with(user: User) -> Self {
            Self {
                users: HashMap::from([(user.id, user)]),
                ..Self::default()
            }
        }
    }

    impl UserDirectory for FakeDirectory {
        fn find_user(
            &self,
            id: UserId,
        ) -> impl Future<Output = Result<Option<User>, RepositoryError>> + Send {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            let result = if self.fail {
                Err(RepositoryError::DataCorruption("boom".into()))
            } else {
                Ok(self.users.get(&id).cloned())
            };
            async move { result }
        }
    }

    fn user(role: UserRole, is_blocked: bool) -> User {
        User {
            id: UserId::new(7),
            email: Email::parse("mikasa@paradis.io").unwrap(),
            name: "Mikasa".into(),
            role,
            is_blocked,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn claims(role: UserRole, is_blocked: bool) -> CurrentUser {
        CurrentUser::from(&user(role, is_blocked))
    }

    #[tokio::test]
    async fn test_admin_claims_pass_without_lookup() {
        let dir = FakeDirectory::default();
        let result = require_admin(&dir, Some(&claims(UserRole::Admin, false)))
            .await
            .unwrap();
        assert!(matches!(result, Authorized::Trusted(_)));
        assert_eq!(dir.lookups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_session_is_unauthenticated() {
        let dir = FakeDirectory::default();
        assert!(matches!(
            require_admin(&dir, None).await,
            Err(AuthzError::Unauthenticated)
        ));
    }

    #[tokio::test]
    async fn test_non_admin_roles_are_forbidden() {
        for role in [UserRole::Customer, UserRole::Ghost] {
            let dir = FakeDirectory::with(user(role, false));
            assert!(matches!(
                require_admin(&dir, Some(&claims(role, false))).await,
                Err(AuthzError::Forbidden)
            ));
            assert_eq!(dir.lookups.load(Ordering::SeqCst), 1);
        }
    }

    #[tokio::test]
    async fn test_blocked_admin_is_forbidden() {
        let dir = FakeDirectory::with(user(UserRole::Admin, true));
        assert!(matches!(
            require_admin(&dir, Some(&claims(UserRole::Admin, true))).await,
            Err(AuthzError::Forbidden)
        ));
    }

    #[tokio::test]
    async fn test_stale_customer_claims_refreshed_from_database() {
        let dir = FakeDirectory::with(user(UserRole::Admin, false));
        let result = require_admin(&dir, Some(&claims(UserRole::Customer, false)))
            .await
            .unwrap();
        match result {
            Authorized::Refreshed(u) => assert_eq!(u.role, UserRole::Admin),
            Authorized::Trusted(_) => panic!("expected a refresh"),
        }
    }

    #[tokio::test]
    async fn test_stale_blocked_claim_cleared_by_database() {
        let dir = FakeDirectory::with(user(UserRole::Admin, false));
        let result = require_admin(&dir, Some(&claims(UserRole::Admin, true)))
            .await
            .unwrap();
        assert!(!result.user().is_blocked);
    }

    #[tokio::test]
    async fn test_deleted_user_is_unauthenticated() {
        let dir = FakeDirectory::default();
        assert!(matches!(
            require_admin(&dir, Some(&claims(UserRole::Customer, false))).await,
            Err(AuthzError::Unauthenticated)
        ));
    }

    #[tokio::test]
    async fn test_lookup_failure_propagates() {
        let dir = FakeDirectory {
            fail: true,
            ..FakeDirectory::default()
        };
        assert!(matches!(
            require_admin(&dir, Some(&claims(UserRole::Customer, false))).await,
            Err(AuthzError::Repository(_))
        ));
    }

    #[tokio::test]
    async fn test_require_role_accepts_any_listed_role() {
        let dir = FakeDirectory::default();
        let roles = [UserRole::Customer, UserRole::Admin];
        assert!(
            require_role(&dir, Some(&claims(UserRole::Customer, false)), &roles)
                .await
                .is_ok()
        );
    }
}
