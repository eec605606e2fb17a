use std::net::SocketAddr;
use std::sync::{Mutex, MutexGuard, TryLockError};

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use smb_core::error::SMBError;
use smb_core::SMBResult;

use crate::client::address_resolver::Resolution;
use crate::protocol::{Capabilities, LegacySecurityMode, NegotiateSecurityMode, SMBDialect, SMBSessionFlags, ShareInfo};
use crate::transport::{CancelToken, TransportHandle};
use crate::util::auth::{AuthOptions, CredentialGuard, MechanismSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ConnectionState {
    #[default]
    Idle,
    Resolved,
    Negotiated,
    Authenticated,
    ShareConnected,
    Canceled,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
    pub struct AuthFlags: u32 {
        const AUTHORIZED = 0x01;
        const CONNECTED = 0x02;
        const EXPLICIT_PASSWORD = 0x04;
        /// NTLM without a SPNEGO wrapper.
        const RAW_NTLM = 0x08;
    }
}

/// URL scheme the caller asked for. `cifs://` pins the connection to SMB1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Scheme {
    #[default]
    Smb,
    Cifs,
}

/// Everything a connection accumulates between resolve and teardown.
#[derive(Debug, Default)]
pub(crate) struct ContextState {
    pub(crate) display_name: String,
    pub(crate) state: ConnectionState,
    pub(crate) addresses: Vec<SocketAddr>,
    pub(crate) address: Option<SocketAddr>,
    pub(crate) canonical_name: Option<String>,
    pub(crate) match_dns_name: bool,
    pub(crate) dialect: Option<SMBDialect>,
    pub(crate) capabilities: Capabilities,
    pub(crate) security_mode: NegotiateSecurityMode,
    pub(crate) legacy_security_mode: LegacySecurityMode,
    pub(crate) extended_security: bool,
    pub(crate) session_flags: SMBSessionFlags,
    pub(crate) session_shared: bool,
    pub(crate) mechanisms: Option<MechanismSet>,
    pub(crate) auth_flags: AuthFlags,
    pub(crate) session_user: Option<String>,
    pub(crate) share: Option<ShareInfo>,
    pub(crate) canceled: bool,
    pub(crate) handle: Option<Box<dyn TransportHandle>>,
    pub(crate) credential: Option<CredentialGuard>,
}

impl ContextState {
    pub(crate) fn transition(&mut self, next: ConnectionState) {
        smb_core::logging::trace!(from = ?self.state, to = ?next, "connection state");
        self.state = next;
    }

    pub(crate) fn is_authenticated(&self) -> bool {
        matches!(self.state, ConnectionState::Authenticated | ConnectionState::ShareConnected)
    }

    pub(crate) fn handle(&mut self) -> SMBResult<&mut Box<dyn TransportHandle>> {
        self.handle.as_mut().ok_or_else(|| SMBError::precondition_failed("connection has no transport handle"))
    }

    pub(crate) fn record_resolution(&mut self, resolution: Resolution) {
        self.addresses = resolution.addresses;
        self.canonical_name = resolution.canonical_name;
        self.match_dns_name = resolution.match_dns_name;
        self.transition(ConnectionState::Resolved);
    }

    /// Drops every resource acquired since the context was idle.
    pub(crate) fn release(&mut self, server: &str) {
        if self.share.take().is_some() {
            if let Some(Err(e)) = self.handle.as_mut().map(|handle| handle.tree_disconnect()) {
                smb_core::logging::debug!(error = %e, "tree disconnect during teardown failed");
            }
        }
        if let Some(handle) = self.handle.take() {
            smb_core::logging::debug!(peer = %handle.peer(), "releasing transport handle");
        }
        self.credential = None;
        self.mechanisms = None;
        self.addresses.clear();
        self.address = None;
        self.canonical_name = None;
        self.match_dns_name = false;
        self.dialect = None;
        self.capabilities = Capabilities::empty();
        self.security_mode = NegotiateSecurityMode::empty();
        self.legacy_security_mode = LegacySecurityMode::empty();
        self.extended_security = false;
        self.session_flags = SMBSessionFlags::empty();
        self.session_shared = false;
        self.auth_flags = AuthFlags::empty();
        self.session_user = None;
        self.display_name = server.to_string();
        self.transition(ConnectionState::Idle);
    }

    pub(crate) fn cancel(&mut self, server: &str) {
        self.transition(ConnectionState::Canceled);
        self.release(server);
        self.canceled = true;
    }
}

/// Cancels whatever the owning context is doing. Cheap to clone and safe to use from any thread.
#[derive(Debug, Clone)]
pub struct Canceler {
    token: CancelToken,
}

impl Canceler {
    pub fn cancel(&self) {
        self.token.cancel();
    }
}

/// Client state for one logical connection.
///
/// Operations take `&self` and hold an internal lock for their whole duration. A second
/// operation started while one is running fails with [`SMBError::ContextBusy`] instead of
/// waiting, and [`Canceler`] interrupts the running one.
#[derive(Debug)]
pub struct ConnectionContext {
    server: String,
    scheme: Scheme,
    auth: AuthOptions,
    cancel: CancelToken,
    state: Mutex<ContextState>,
}

impl ConnectionContext {
    pub fn new<T: Into<String>>(server: T, auth: AuthOptions) -> Self {
        let server = server.into();
        Self::with_token(server, Scheme::Smb, auth, CancelToken::new())
    }

    fn with_token(server: String, scheme: Scheme, auth: AuthOptions, cancel: CancelToken) -> Self {
        let state = ContextState { display_name: server.clone(), ..Default::default() };
        Self { server, scheme, auth, cancel, state: Mutex::new(state) }
    }

    pub fn with_scheme(mut self, scheme: Scheme) -> Self {
        self.scheme = scheme;
        self
    }

    /// A fresh context for a referral target carrying the same identity and scheme. No transport
    /// state is shared, and canceling this context also cancels the copy.
    pub fn clone_for_referral<T: Into<String>>(&self, server: T) -> Self {
        Self::with_token(server.into(), self.scheme, self.auth.clone(), self.cancel.child())
    }

    pub fn canceler(&self) -> Canceler {
        Canceler { token: self.cancel.clone() }
    }

    /// Server name as given by the caller.
    pub fn server(&self) -> &str {
        &self.server
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn auth(&self) -> &AuthOptions {
        &self.auth
    }

    pub(crate) fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub(crate) fn lock(&self) -> SMBResult<MutexGuard<'_, ContextState>> {
        match self.state.try_lock() {
            Ok(state) => Ok(state),
            Err(TryLockError::Poisoned(poisoned)) => Ok(poisoned.into_inner()),
            Err(TryLockError::WouldBlock) => Err(SMBError::ContextBusy),
        }
    }

    fn read(&self) -> MutexGuard<'_, ContextState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Releases everything the context holds. If an operation is still running it is canceled
    /// instead, and releases the resources itself as it unwinds.
    pub fn teardown(&self) {
        match self.lock() {
            Ok(mut state) => state.release(&self.server),
            Err(_) => {
                smb_core::logging::debug!(server = %self.server, "teardown while busy, canceling");
                self.cancel.cancel();
            }
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.read().state
    }

    /// Server name in use, which differs from [`Self::server`] after domain controller indirection.
    pub fn display_name(&self) -> String {
        self.read().display_name.clone()
    }

    pub fn address(&self) -> Option<SocketAddr> {
        self.read().address
    }

    pub fn canonical_name(&self) -> Option<String> {
        self.read().canonical_name.clone()
    }

    pub fn dialect(&self) -> Option<SMBDialect> {
        self.read().dialect
    }

    pub fn capabilities(&self) -> Capabilities {
        self.read().capabilities
    }

    pub fn session_flags(&self) -> SMBSessionFlags {
        self.read().session_flags
    }

    pub fn session_shared(&self) -> bool {
        self.read().session_shared
    }

    pub fn mechanisms(&self) -> Option<MechanismSet> {
        self.read().mechanisms.clone()
    }

    pub fn auth_flags(&self) -> AuthFlags {
        self.read().auth_flags
    }

    pub fn session_user(&self) -> Option<String> {
        self.read().session_user.clone()
    }

    pub fn share(&self) -> Option<ShareInfo> {
        self.read().share.clone()
    }

    /// Whether the last operation ended because it was canceled.
    pub fn is_canceled(&self) -> bool {
        self.read().canceled
    }
}

impl Drop for ConnectionContext {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(|poisoned| poisoned.into_inner());
        if state.state != ConnectionState::Idle {
            state.release(&self.server);
        }
    }
}
