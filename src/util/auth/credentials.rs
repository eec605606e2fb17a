use std::sync::Arc;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use smb_core::SMBResult;

use crate::util::auth::{AuthMechanism, PrincipalName, Secret};

/// Opaque handle to credentials held by a [`CredentialStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CredentialHandle(pub u64);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedCredential {
    pub principal: String,
    pub realm: Option<String>,
    pub expiry: Option<SystemTime>,
}

impl CachedCredential {
    pub fn new<P: Into<String>>(principal: P, realm: Option<&str>) -> Self {
        Self { principal: principal.into(), realm: realm.map(str::to_owned), expiry: None }
    }

    pub fn is_expired(&self, now: SystemTime) -> bool {
        self.expiry.is_some_and(|expiry| expiry <= now)
    }

    pub fn user(&self) -> &str {
        self.principal.split('@').next().unwrap_or(&self.principal)
    }
}

/// The credential vault the client borrows identities from.
pub trait CredentialStore: Send + Sync {
    fn acquire(&self, mechanism: AuthMechanism, principal: &PrincipalName, password: Option<&Secret>) -> SMBResult<CredentialHandle>;

    fn release(&self, handle: CredentialHandle);

    /// Cached identities usable with `mechanism`, in cache order.
    fn cached_credentials(&self, mechanism: AuthMechanism) -> Vec<CachedCredential>;

    fn principal_of(&self, handle: CredentialHandle) -> Option<String>;
}

/// Releases its handle back to the store when dropped.
pub struct CredentialGuard {
    store: Arc<dyn CredentialStore>,
    handle: CredentialHandle,
}

impl CredentialGuard {
    pub fn acquire(store: &Arc<dyn CredentialStore>, mechanism: AuthMechanism, principal: &PrincipalName, password: Option<&Secret>) -> SMBResult<Self> {
        let handle = store.acquire(mechanism, principal, password)?;
        Ok(Self { store: store.clone(), handle })
    }

    pub fn handle(&self) -> CredentialHandle {
        self.handle
    }

    pub fn principal(&self) -> Option<String> {
        self.store.principal_of(self.handle)
    }
}

impl std::fmt::Debug for CredentialGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialGuard").field("handle", &self.handle).finish()
    }
}

impl Drop for CredentialGuard {
    fn drop(&mut self) {
        self.store.release(self.handle);
    }
}

/// Picks the cache entries worth trying. With a user name only that user's principals are kept,
/// and when `domain` is given (NTLM) the realm must match as well.
pub fn matching_credentials(entries: Vec<CachedCredential>, user: Option<&str>, domain: Option<&str>, now: SystemTime) -> Vec<CachedCredential> {
    entries.into_iter()
        .filter(|entry| !entry.is_expired(now))
        .filter(|entry| user.is_none_or(|user| entry.user().eq_ignore_ascii_case(user)))
        .filter(|entry| match (domain, entry.realm.as_deref()) {
            (Some(domain), Some(realm)) => realm.eq_ignore_ascii_case(domain),
            (Some(_), None) => false,
            (None, _) => true,
        })
        .collect()
}
