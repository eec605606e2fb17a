//! Collaborators the client drives but does not implement: the SMB transport that frames and
//! signs messages, name and directory services, and the pieces a negotiate or session setup
//! exchanges with it.

use std::net::SocketAddr;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use smb_core::SMBResult;

use crate::config::MultichannelPreferences;
use crate::protocol::{Capabilities, LegacySecurityMode, NegotiateSecurityMode, SMBDialect, SMBSessionFlags, SMBVersions, ShareInfo};
use crate::util::auth::{AuthMechanism, CredentialHandle, PrincipalName, Secret};

pub use cancel::CancelToken;

mod cancel;

/// Opens connections and answers questions about sessions it already holds.
pub trait Transport: Send + Sync {
    fn connect(&self, address: SocketAddr, cancel: &CancelToken) -> SMBResult<Box<dyn TransportHandle>>;

    /// An existing, authenticated session usable for `query`, if one exists.
    fn find_session(&self, query: &SessionQuery) -> Option<SharedSession>;
}

/// One live connection. Dropping the handle closes it.
pub trait TransportHandle: Send {
    fn peer(&self) -> SocketAddr;

    fn negotiate(&mut self, request: &NegotiateRequest, cancel: &CancelToken) -> SMBResult<NegotiateResponse>;

    fn authenticate(&mut self, request: &AuthRequest, cancel: &CancelToken) -> SMBResult<AuthResponse>;

    fn tree_connect(&mut self, share: &str, cancel: &CancelToken) -> SMBResult<ShareInfo>;

    fn tree_disconnect(&mut self) -> SMBResult<()>;

    /// Sends an encoded referral request through the DFS ioctl, returning the raw response.
    fn dfs_referral(&mut self, request: &[u8], cancel: &CancelToken) -> SMBResult<Vec<u8>>;

    fn is_connected(&self) -> bool;
}

impl std::fmt::Debug for dyn TransportHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportHandle").field("peer", &self.peer()).finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionQuery {
    pub address: SocketAddr,
    pub principal: Option<String>,
    /// Set when the session must also have been opened under the same DNS name.
    pub dns_name: Option<String>,
    pub multichannel: bool,
    pub high_fidelity: bool,
}

#[derive(Debug)]
pub struct SharedSession {
    pub handle: Box<dyn TransportHandle>,
    pub address: SocketAddr,
    pub dialect: SMBDialect,
    pub capabilities: Capabilities,
    pub session_flags: SMBSessionFlags,
    pub mech_token: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NegotiateRequest {
    pub versions: SMBVersions,
    pub dialects: Vec<SMBDialect>,
    pub security_mode: NegotiateSecurityMode,
    pub multichannel: MultichannelPreferences,
    pub client_guid: Uuid,
    pub force_new_session: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NegotiateResponse {
    pub dialect: SMBDialect,
    pub capabilities: Capabilities,
    pub security_mode: NegotiateSecurityMode,
    /// Only meaningful when `dialect` is the SMB1 dialect.
    pub legacy_security_mode: LegacySecurityMode,
    pub extended_security: bool,
    pub mech_token: Bytes,
    /// The transport matched an authenticated session it can share with this connection.
    pub existing_session: Option<SMBSessionFlags>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthRequest {
    pub mechanism: AuthMechanism,
    pub client: Option<PrincipalName>,
    pub target: Option<PrincipalName>,
    pub domain: Option<String>,
    pub credential: Option<CredentialHandle>,
    pub password: Option<Secret>,
    pub allow_ntlm_v1: bool,
    pub allow_plaintext: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AuthResponse {
    pub session_flags: SMBSessionFlags,
    pub user: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NameLookup {
    pub addresses: Vec<SocketAddr>,
    pub canonical_name: Option<String>,
}

pub trait NameService: Send + Sync {
    fn lookup(&self, name: &str, port: u16, cancel: &CancelToken) -> SMBResult<NameLookup>;
}

pub trait DirectoryService: Send + Sync {
    /// Controllers for `name` when it names a domain, `None` when it does not.
    fn domain_controllers(&self, name: &str, cancel: &CancelToken) -> SMBResult<Option<Vec<String>>>;
}
