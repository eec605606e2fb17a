#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use bytes::Bytes;
use tracing_subscriber::EnvFilter;

use smb_connect::client::{Collaborators, ConnectionOrchestrator};
use smb_connect::config::SMBClientConfig;
use smb_connect::dfs::codec::encode_response;
use smb_connect::dfs::{Referral, ReferralBody, ReferralEntryFlags, ReferralHeaderFlags, ReferralPaths, ReferralPayload, ReferralResponse, ServerType};
use smb_connect::protocol::{Capabilities, SMBDialect, SMBSessionFlags, ShareInfo};
use smb_connect::transport::{AuthRequest, AuthResponse, CancelToken, DirectoryService, NameLookup, NameService, NegotiateRequest, NegotiateResponse, SessionQuery, SharedSession, Transport, TransportHandle};
use smb_connect::util::auth::{AuthMechanism, CachedCredential, CredentialHandle, CredentialStore, MechanismOid, MechanismSet, PrincipalName, Secret};
use smb_connect::util::utf16::utf16_len;
use smb_core::error::SMBError;
use smb_core::nt_status::NTStatus;
use smb_core::SMBResult;

pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn addr(last: u8) -> SocketAddr {
    SocketAddr::from(([10, 0, 0, last], 445))
}

type AuthScript = Box<dyn Fn(&AuthRequest) -> SMBResult<AuthResponse> + Send + Sync>;

/// A server as the scripted transport sees it.
pub struct FakeHost {
    negotiate: NegotiateResponse,
    shares: HashMap<String, ShareInfo>,
    referrals: HashMap<String, ReferralResponse>,
    negotiate_errors: Mutex<VecDeque<SMBError>>,
    blocks_negotiate: bool,
    connect_delay: Duration,
    auth: AuthScript,
}

impl FakeHost {
    /// SMB 3.1.1 with extended security and an empty security blob (raw NTLM).
    pub fn new() -> Self {
        Self {
            negotiate: NegotiateResponse {
                dialect: SMBDialect::V3_1_1,
                capabilities: Capabilities::DFS | Capabilities::LARGE_MTU,
                extended_security: true,
                ..Default::default()
            },
            shares: HashMap::new(),
            referrals: HashMap::new(),
            negotiate_errors: Mutex::new(VecDeque::new()),
            blocks_negotiate: false,
            connect_delay: Duration::ZERO,
            auth: Box::new(|request| Ok(AuthResponse { session_flags: SMBSessionFlags::empty(), user: request.client.as_ref().map(|c| c.name.clone()) })),
        }
    }

    pub fn mechanisms(mut self, mechanisms: &[MechanismOid]) -> Self {
        self.negotiate.mech_token = Bytes::from(MechanismSet::new(mechanisms.to_vec()).to_neg_token_init());
        self
    }

    pub fn negotiate_response(mut self, response: NegotiateResponse) -> Self {
        self.negotiate = response;
        self
    }

    pub fn share(mut self, name: &str) -> Self {
        self.shares.insert(name.to_lowercase(), ShareInfo::disk(name));
        self
    }

    pub fn dfs_share(mut self, name: &str) -> Self {
        self.shares.insert(name.to_lowercase(), ShareInfo::dfs_root(name));
        self
    }

    pub fn referral(mut self, response: ReferralResponse) -> Self {
        self.referrals.insert(response.request_path.to_lowercase(), response);
        self
    }

    pub fn negotiate_error(self, error: SMBError) -> Self {
        self.negotiate_errors.lock().unwrap().push_back(error);
        self
    }

    pub fn blocking_negotiate(mut self) -> Self {
        self.blocks_negotiate = true;
        self
    }

    pub fn connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = delay;
        self
    }

    pub fn auth<F: Fn(&AuthRequest) -> SMBResult<AuthResponse> + Send + Sync + 'static>(mut self, script: F) -> Self {
        self.auth = Box::new(script);
        self
    }
}

/// Transport double that records every exchange and counts open handles.
#[derive(Default)]
pub struct ScriptedTransport {
    hosts: Mutex<HashMap<SocketAddr, Arc<FakeHost>>>,
    shared: Mutex<HashMap<SocketAddr, SMBSessionFlags>>,
    pub live: Arc<AtomicUsize>,
    pub connects: AtomicUsize,
    pub negotiations: Arc<Mutex<Vec<NegotiateRequest>>>,
    pub auth_log: Arc<Mutex<Vec<AuthRequest>>>,
    pub negotiating: Arc<AtomicBool>,
}

impl ScriptedTransport {
    pub fn add_host(&self, address: SocketAddr, host: FakeHost) {
        self.hosts.lock().unwrap().insert(address, Arc::new(host));
    }

    pub fn share_session(&self, address: SocketAddr, flags: SMBSessionFlags) {
        self.shared.lock().unwrap().insert(address, flags);
    }

    pub fn live_handles(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub fn auth_mechanisms(&self) -> Vec<AuthMechanism> {
        self.auth_log.lock().unwrap().iter().map(|request| request.mechanism).collect()
    }

    fn handle(&self, peer: SocketAddr, host: Arc<FakeHost>) -> FakeHandle {
        self.live.fetch_add(1, Ordering::SeqCst);
        FakeHandle {
            peer,
            host,
            live: self.live.clone(),
            negotiations: self.negotiations.clone(),
            auth_log: self.auth_log.clone(),
            negotiating: self.negotiating.clone(),
            share: None,
        }
    }
}

impl Transport for ScriptedTransport {
    fn connect(&self, address: SocketAddr, cancel: &CancelToken) -> SMBResult<Box<dyn TransportHandle>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let host = self.hosts.lock().unwrap().get(&address).cloned()
            .ok_or_else(|| SMBError::io_error(io::Error::from(io::ErrorKind::ConnectionRefused)))?;
        let mut waited = Duration::ZERO;
        while waited < host.connect_delay {
            cancel.check()?;
            thread::sleep(Duration::from_millis(2));
            waited += Duration::from_millis(2);
        }
        Ok(Box::new(self.handle(address, host)))
    }

    fn find_session(&self, query: &SessionQuery) -> Option<SharedSession> {
        let flags = *self.shared.lock().unwrap().get(&query.address)?;
        let host = self.hosts.lock().unwrap().get(&query.address).cloned()?;
        let mech_token = host.negotiate.mech_token.clone();
        let dialect = host.negotiate.dialect;
        let capabilities = host.negotiate.capabilities;
        Some(SharedSession {
            handle: Box::new(self.handle(query.address, host)),
            address: query.address,
            dialect,
            capabilities,
            session_flags: flags,
            mech_token,
        })
    }
}

pub struct FakeHandle {
    peer: SocketAddr,
    host: Arc<FakeHost>,
    live: Arc<AtomicUsize>,
    negotiations: Arc<Mutex<Vec<NegotiateRequest>>>,
    auth_log: Arc<Mutex<Vec<AuthRequest>>>,
    negotiating: Arc<AtomicBool>,
    share: Option<String>,
}

impl TransportHandle for FakeHandle {
    fn peer(&self) -> SocketAddr {
        self.peer
    }

    fn negotiate(&mut self, request: &NegotiateRequest, cancel: &CancelToken) -> SMBResult<NegotiateResponse> {
        self.negotiations.lock().unwrap().push(request.clone());
        if let Some(error) = self.host.negotiate_errors.lock().unwrap().pop_front() {
            return Err(error);
        }
        if self.host.blocks_negotiate {
            self.negotiating.store(true, Ordering::SeqCst);
            while !cancel.is_canceled() {
                thread::sleep(Duration::from_millis(2));
            }
            return Err(SMBError::from(NTStatus::Cancelled));
        }
        Ok(self.host.negotiate.clone())
    }

    fn authenticate(&mut self, request: &AuthRequest, _cancel: &CancelToken) -> SMBResult<AuthResponse> {
        self.auth_log.lock().unwrap().push(request.clone());
        (self.host.auth)(request)
    }

    fn tree_connect(&mut self, share: &str, _cancel: &CancelToken) -> SMBResult<ShareInfo> {
        let info = self.host.shares.get(&share.to_lowercase()).cloned()
            .ok_or(SMBError::from(NTStatus::BadNetworkName))?;
        self.share = Some(info.name.clone());
        Ok(info)
    }

    fn tree_disconnect(&mut self) -> SMBResult<()> {
        self.share = None;
        Ok(())
    }

    fn dfs_referral(&mut self, request: &[u8], _cancel: &CancelToken) -> SMBResult<Vec<u8>> {
        let path = decode_request_path(request);
        self.host.referrals.get(&path.to_lowercase())
            .ok_or(SMBError::from(NTStatus::NotFound))
            .and_then(encode_response)
    }

    fn is_connected(&self) -> bool {
        true
    }
}

impl Drop for FakeHandle {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

fn decode_request_path(request: &[u8]) -> String {
    let units = request[2..].chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .take_while(|unit| *unit != 0)
        .collect::<Vec<u16>>();
    String::from_utf16_lossy(&units)
}

#[derive(Default)]
pub struct FakeNames {
    table: Mutex<HashMap<String, Vec<SocketAddr>>>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeNames {
    pub fn insert(&self, name: &str, addresses: &[SocketAddr]) {
        self.table.lock().unwrap().insert(name.to_lowercase(), addresses.to_vec());
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl NameService for FakeNames {
    fn lookup(&self, name: &str, _port: u16, cancel: &CancelToken) -> SMBResult<NameLookup> {
        cancel.check()?;
        self.calls.lock().unwrap().push(name.to_string());
        let addresses = self.table.lock().unwrap().get(&name.to_lowercase()).cloned()
            .ok_or_else(|| SMBError::host_unreachable(name))?;
        Ok(NameLookup { addresses, canonical_name: Some(name.to_lowercase()) })
    }
}

#[derive(Default)]
pub struct FakeDirectory {
    domains: Mutex<HashMap<String, Vec<String>>>,
}

impl FakeDirectory {
    pub fn insert(&self, domain: &str, controllers: &[&str]) {
        self.domains.lock().unwrap().insert(domain.to_lowercase(), controllers.iter().map(|c| c.to_string()).collect());
    }
}

impl DirectoryService for FakeDirectory {
    fn domain_controllers(&self, name: &str, _cancel: &CancelToken) -> SMBResult<Option<Vec<String>>> {
        Ok(self.domains.lock().unwrap().get(&name.to_lowercase()).cloned())
    }
}

#[derive(Default)]
pub struct FakeCredentials {
    cache: Mutex<HashMap<AuthMechanism, Vec<CachedCredential>>>,
    handles: Mutex<HashMap<u64, String>>,
    next: AtomicU64,
    pub kerberos_unavailable: AtomicBool,
}

impl FakeCredentials {
    pub fn cache(&self, mechanism: AuthMechanism, entries: Vec<CachedCredential>) {
        self.cache.lock().unwrap().insert(mechanism, entries);
    }

    pub fn held(&self) -> usize {
        self.handles.lock().unwrap().len()
    }
}

impl CredentialStore for FakeCredentials {
    fn acquire(&self, mechanism: AuthMechanism, principal: &PrincipalName, _password: Option<&Secret>) -> SMBResult<CredentialHandle> {
        if mechanism == AuthMechanism::Kerberos && self.kerberos_unavailable.load(Ordering::SeqCst) {
            return Err(SMBError::auth_failed("KDC unreachable"));
        }
        let id = self.next.fetch_add(1, Ordering::SeqCst);
        self.handles.lock().unwrap().insert(id, principal.name.clone());
        Ok(CredentialHandle(id))
    }

    fn release(&self, handle: CredentialHandle) {
        self.handles.lock().unwrap().remove(&handle.0);
    }

    fn cached_credentials(&self, mechanism: AuthMechanism) -> Vec<CachedCredential> {
        self.cache.lock().unwrap().get(&mechanism).cloned().unwrap_or_default()
    }

    fn principal_of(&self, handle: CredentialHandle) -> Option<String> {
        self.handles.lock().unwrap().get(&handle.0).cloned()
    }
}

/// All fakes wired together.
pub struct Harness {
    pub transport: Arc<ScriptedTransport>,
    pub dns: Arc<FakeNames>,
    pub netbios: Arc<FakeNames>,
    pub directory: Arc<FakeDirectory>,
    pub credentials: Arc<FakeCredentials>,
}

impl Harness {
    pub fn new() -> Self {
        init_logging();
        Self {
            transport: Arc::new(ScriptedTransport::default()),
            dns: Arc::new(FakeNames::default()),
            netbios: Arc::new(FakeNames::default()),
            directory: Arc::new(FakeDirectory::default()),
            credentials: Arc::new(FakeCredentials::default()),
        }
    }

    /// Registers `host` under `name` in DNS at `address`.
    pub fn host(&self, name: &str, address: SocketAddr, host: FakeHost) {
        self.dns.insert(name, &[address]);
        self.transport.add_host(address, host);
    }

    pub fn orchestrator(&self, config: SMBClientConfig) -> ConnectionOrchestrator {
        let collaborators = Collaborators::new(self.transport.clone(), self.credentials.clone())
            .dns(self.dns.clone())
            .netbios(self.netbios.clone())
            .directory(self.directory.clone());
        ConnectionOrchestrator::new(config, collaborators)
    }
}

/// A V4 storage referral for `request`, consuming `consumed` and pointing at each of `targets`.
pub fn referral(request: &str, consumed: &str, targets: &[&str]) -> ReferralResponse {
    let path_consumed = utf16_len(consumed) as u16;
    let referrals = targets.iter().map(|target| {
        let paths = ReferralPaths { dfs_path: consumed.into(), alt_path: consumed.into(), network_address: target.to_string() };
        Referral::new(ServerType::NonRoot, ReferralEntryFlags::empty(), path_consumed, ReferralPayload::V4 { ttl: 300, body: ReferralBody::Paths(paths) }, request)
    }).collect();
    ReferralResponse {
        path_consumed,
        header_flags: ReferralHeaderFlags::STORAGE_SERVERS,
        request_path: request.into(),
        referrals,
    }
}
