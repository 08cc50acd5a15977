//! Client session: who is signed in, and where the UI should route.
//!
//! `check_auth` runs once at startup. Until it finishes `has_checked_auth`
//! stays false and [`SessionStore::redirect`] answers `None`, so the router
//! never sends the user to the wrong screen while storage is being read.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::api::AuthApi;
use crate::error::ClientError;
use crate::models::{AuthPayload, User};
use crate::storage::{SessionStorage, TOKEN_KEY, USER_KEY};

/// Result of register and login. Failures are reported here, never raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthOutcome {
    pub success: bool,
    pub error: Option<String>,
}

impl AuthOutcome {
    fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    fn failed(err: &ClientError) -> Self {
        Self {
            success: false,
            error: Some(err.to_string()),
        }
    }
}

/// Top level screen groups of the app.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteGroup {
    /// Sign in and sign up screens.
    Auth,
    /// Screens for signed-in users.
    Tabs,
}

/// Copy of the session state at one point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub user: Option<User>,
    pub token: Option<String>,
    pub is_loading: bool,
    pub is_checking_auth: bool,
    pub has_checked_auth: bool,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            user: None,
            token: None,
            is_loading: false,
            is_checking_auth: true,
            has_checked_auth: false,
        }
    }
}

impl SessionSnapshot {
    pub fn is_signed_in(&self) -> bool {
        self.user.is_some() && self.token.is_some()
    }
}

/// Session context handed to the UI. Concurrent register/login calls are not
/// serialized; the last one to finish wins.
pub struct SessionStore {
    api: Arc<dyn AuthApi>,
    storage: Arc<dyn SessionStorage>,
    state: RwLock<SessionSnapshot>,
}

impl SessionStore {
    pub fn new(api: Arc<dyn AuthApi>, storage: Arc<dyn SessionStorage>) -> Self {
        Self {
            api,
            storage,
            state: RwLock::new(SessionSnapshot::default()),
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.read().clone()
    }

    pub fn token(&self) -> Option<String> {
        self.read().token.clone()
    }

    pub fn user(&self) -> Option<User> {
        self.read().user.clone()
    }

    pub fn is_signed_in(&self) -> bool {
        self.read().is_signed_in()
    }

    pub async fn register(&self, username: &str, email: &str, password: &str) -> AuthOutcome {
        self.write().is_loading = true;
        let result = self.api.register(username, email, password).await;
        self.finish_sign_in(result).await
    }

    pub async fn login(&self, email: &str, password: &str) -> AuthOutcome {
        self.write().is_loading = true;
        let result = self.api.login(email, password).await;
        self.finish_sign_in(result).await
    }

    async fn finish_sign_in(&self, result: Result<AuthPayload, ClientError>) -> AuthOutcome {
        let persisted = match result {
            Ok(payload) => self.persist(&payload).await.map(|()| payload),
            Err(err) => Err(err),
        };

        match persisted {
            Ok(payload) => {
                tracing::debug!(user_id = %payload.user.id, "signed in");
                let mut state = self.write();
                state.user = Some(payload.user);
                state.token = Some(payload.token);
                state.is_loading = false;
                AuthOutcome::ok()
            }
            Err(err) => {
                tracing::debug!(error = %err, "sign in failed");
                self.write().is_loading = false;
                AuthOutcome::failed(&err)
            }
        }
    }

    async fn persist(&self, payload: &AuthPayload) -> Result<(), ClientError> {
        let user = serde_json::to_string(&payload.user)
            .map_err(|err| ClientError::Decode(err.to_string()))?;
        self.storage.set(TOKEN_KEY, &payload.token).await?;
        self.storage.set(USER_KEY, &user).await
    }

    /// Restore the session from storage. A user entry that does not parse
    /// clears both stored entries. Always marks the check as done.
    pub async fn check_auth(&self) {
        let (token, user) = match self.restore().await {
            Ok(session) => session,
            Err(err) => {
                tracing::warn!(error = %err, "failed to restore session");
                (None, None)
            }
        };

        let mut state = self.write();
        state.token = token;
        state.user = user;
        state.is_loading = false;
        state.is_checking_auth = false;
        state.has_checked_auth = true;
    }

    async fn restore(&self) -> Result<(Option<String>, Option<User>), ClientError> {
        let token = self.storage.get(TOKEN_KEY).await?;
        let Some(raw_user) = self.storage.get(USER_KEY).await? else {
            return Ok((token, None));
        };

        match serde_json::from_str::<User>(&raw_user) {
            Ok(user) => Ok((token, Some(user))),
            Err(err) => {
                tracing::warn!(error = %err, "stored user is corrupt; clearing session");
                self.storage.remove(USER_KEY).await?;
                self.storage.remove(TOKEN_KEY).await?;
                Ok((None, None))
            }
        }
    }

    /// Forget the session locally. The server is not contacted.
    pub async fn logout(&self) {
        for key in [TOKEN_KEY, USER_KEY] {
            if let Err(err) = self.storage.remove(key).await {
                tracing::warn!(key, error = %err, "failed to clear stored session");
            }
        }
        let mut state = self.write();
        state.token = None;
        state.user = None;
    }

    /// Where the router must go from `current`, if anywhere.
    pub fn redirect(&self, current: RouteGroup) -> Option<RouteGroup> {
        let state = self.read();
        if !state.has_checked_auth {
            return None;
        }
        match (current, state.is_signed_in()) {
            (RouteGroup::Tabs, false) => Some(RouteGroup::Auth),
            (RouteGroup::Auth, true) => Some(RouteGroup::Tabs),
            _ => None,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, SessionSnapshot> {
        self.state
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, SessionSnapshot> {
        self.state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FileStorage, MemoryStorage};
    use async_trait::async_trait;
    use time::OffsetDateTime;
    use uuid::Uuid;

    struct FakeApi {
        password: &'static str,
    }

    fn jane() -> User {
        User {
            id: Uuid::nil(),
            email: "jane@example.com".into(),
            username: "jane".into(),
            profile_image: "https://avatars.test/jane".into(),
            created_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[async_trait]
    impl AuthApi for FakeApi {
        async fn register(
            &self,
            _username: &str,
            _email: &str,
            _password: &str,
        ) -> Result<AuthPayload, ClientError> {
            Err(ClientError::Api {
                status: 400,
                message: "User already exists".into(),
            })
        }

        async fn login(&self, _email: &str, password: &str) -> Result<AuthPayload, ClientError> {
            if password == self.password {
                Ok(AuthPayload {
                    token: "token-1".into(),
                    user: jane(),
                })
            } else {
                Err(ClientError::Api {
                    status: 400,
                    message: "Invalid credentials".into(),
                })
            }
        }
    }

    fn store() -> (SessionStore, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::new());
        let store = SessionStore::new(
            Arc::new(FakeApi {
                password: "secret1",
            }),
            storage.clone(),
        );
        (store, storage)
    }

    #[tokio::test]
    async fn login_persists_token_and_user() {
        let (store, storage) = store();
        let outcome = store.login("jane@example.com", "secret1").await;

        assert_eq!(outcome, AuthOutcome::ok());
        assert!(store.is_signed_in());
        assert!(!store.snapshot().is_loading);
        assert_eq!(storage.get(TOKEN_KEY).await.unwrap().as_deref(), Some("token-1"));
        let saved: User = serde_json::from_str(&storage.get(USER_KEY).await.unwrap().unwrap()).unwrap();
        assert_eq!(saved, jane());
    }

    #[tokio::test]
    async fn failures_are_reported_not_raised() {
        let (store, storage) = store();

        let login = store.login("jane@example.com", "wrong").await;
        assert!(!login.success);
        assert_eq!(login.error.as_deref(), Some("Invalid credentials"));

        let register = store.register("jane", "jane@example.com", "secret1").await;
        assert_eq!(register.error.as_deref(), Some("User already exists"));

        assert!(!store.snapshot().is_loading);
        assert!(!store.is_signed_in());
        assert_eq!(storage.get(TOKEN_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn check_auth_restores_stored_session() {
        let (store, storage) = store();
        storage.set(TOKEN_KEY, "token-1").await.unwrap();
        storage
            .set(USER_KEY, &serde_json::to_string(&jane()).unwrap())
            .await
            .unwrap();

        assert_eq!(store.redirect(RouteGroup::Auth), None);
        store.check_auth().await;

        let snapshot = store.snapshot();
        assert!(snapshot.has_checked_auth);
        assert!(!snapshot.is_checking_auth);
        assert_eq!(snapshot.user, Some(jane()));
        assert_eq!(store.redirect(RouteGroup::Auth), Some(RouteGroup::Tabs));
        assert_eq!(store.redirect(RouteGroup::Tabs), None);
    }

    #[tokio::test]
    async fn corrupt_user_clears_everything() {
        let (store, storage) = store();
        storage.set(TOKEN_KEY, "token-1").await.unwrap();
        storage.set(USER_KEY, "{not json").await.unwrap();

        store.check_auth().await;

        let snapshot = store.snapshot();
        assert!(snapshot.has_checked_auth);
        assert_eq!(snapshot.token, None);
        assert_eq!(snapshot.user, None);
        assert_eq!(storage.get(TOKEN_KEY).await.unwrap(), None);
        assert_eq!(storage.get(USER_KEY).await.unwrap(), None);
        assert_eq!(store.redirect(RouteGroup::Tabs), Some(RouteGroup::Auth));
    }

    #[tokio::test]
    async fn empty_storage_means_signed_out() {
        let (store, _) = store();
        store.check_auth().await;
        assert!(store.snapshot().has_checked_auth);
        assert!(!store.is_signed_in());
        assert_eq!(store.redirect(RouteGroup::Auth), None);
    }

    #[tokio::test]
    async fn corrupt_session_file_does_not_block_sign_in() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "garbage{").unwrap();

        let storage = Arc::new(FileStorage::new(&path));
        let store = SessionStore::new(
            Arc::new(FakeApi {
                password: "secret1",
            }),
            storage.clone(),
        );

        store.check_auth().await;
        assert!(store.snapshot().has_checked_auth);
        assert!(!store.is_signed_in());

        let outcome = store.login("jane@example.com", "secret1").await;
        assert_eq!(outcome, AuthOutcome::ok());
        assert_eq!(storage.get(TOKEN_KEY).await.unwrap().as_deref(), Some("token-1"));

        store.logout().await;
        assert_eq!(storage.get(TOKEN_KEY).await.unwrap(), None);

        let again = store.login("jane@example.com", "secret1").await;
        assert_eq!(again, AuthOutcome::ok());
        assert!(store.is_signed_in());
    }

    #[tokio::test]
    async fn logout_is_local() {
        let (store, storage) = store();
        store.login("jane@example.com", "secret1").await;
        store.check_auth().await;

        store.logout().await;

        assert!(!store.is_signed_in());
        assert_eq!(storage.get(TOKEN_KEY).await.unwrap(), None);
        assert_eq!(storage.get(USER_KEY).await.unwrap(), None);
        assert_eq!(store.redirect(RouteGroup::Tabs), Some(RouteGroup::Auth));
    }
}
