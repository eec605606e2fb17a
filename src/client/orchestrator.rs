use std::sync::Arc;

use smb_core::error::SMBError;
use smb_core::logging::{debug, info, warn};
use smb_core::SMBResult;

use crate::client::address_resolver::{AddressResolver, Resolution};
use crate::client::authenticator::Authenticator;
use crate::client::context::{ConnectionContext, ConnectionState, ContextState};
use crate::client::negotiator::Negotiator;
use crate::client::race::race_candidates;
use crate::config::SMBClientConfig;
use crate::dfs::codec::{decode_response, encode_request};
use crate::dfs::referral::ReferralResponse;
use crate::protocol::ShareInfo;
use crate::transport::{CancelToken, DirectoryService, NameService, Transport};
use crate::util::auth::CredentialStore;

/// The external services an orchestrator drives.
#[derive(Clone)]
pub struct Collaborators {
    pub transport: Arc<dyn Transport>,
    pub credentials: Arc<dyn CredentialStore>,
    pub service_discovery: Option<Arc<dyn NameService>>,
    pub netbios: Option<Arc<dyn NameService>>,
    pub dns: Option<Arc<dyn NameService>>,
    pub directory: Option<Arc<dyn DirectoryService>>,
}

impl Collaborators {
    pub fn new(transport: Arc<dyn Transport>, credentials: Arc<dyn CredentialStore>) -> Self {
        Self { transport, credentials, service_discovery: None, netbios: None, dns: None, directory: None }
    }

    pub fn service_discovery(mut self, service: Arc<dyn NameService>) -> Self {
        self.service_discovery = Some(service);
        self
    }

    pub fn netbios(mut self, service: Arc<dyn NameService>) -> Self {
        self.netbios = Some(service);
        self
    }

    pub fn dns(mut self, service: Arc<dyn NameService>) -> Self {
        self.dns = Some(service);
        self
    }

    pub fn directory(mut self, directory: Arc<dyn DirectoryService>) -> Self {
        self.directory = Some(directory);
        self
    }
}

/// Drives resolve, negotiate and authenticate for a [`ConnectionContext`].
pub struct ConnectionOrchestrator {
    config: Arc<SMBClientConfig>,
    transport: Arc<dyn Transport>,
    directory: Option<Arc<dyn DirectoryService>>,
    resolver: AddressResolver,
    negotiator: Negotiator,
    authenticator: Authenticator,
}

impl ConnectionOrchestrator {
    pub fn new(config: SMBClientConfig, collaborators: Collaborators) -> Self {
        let config = Arc::new(config);
        Self {
            resolver: AddressResolver::new(config.clone(), collaborators.service_discovery, collaborators.netbios, collaborators.dns),
            negotiator: Negotiator::new(config.clone(), collaborators.transport.clone()),
            authenticator: Authenticator::new(config.clone(), collaborators.credentials),
            transport: collaborators.transport,
            directory: collaborators.directory,
            config,
        }
    }

    pub fn config(&self) -> &SMBClientConfig {
        &self.config
    }

    /// Runs `op` under the context's guard. Cancellation, whenever it lands, rolls the context
    /// back to idle and is reported as [`SMBError::Canceled`].
    fn run<T, F>(&self, ctx: &ConnectionContext, op: F) -> SMBResult<T>
    where
        F: FnOnce(&mut ContextState, &CancelToken) -> SMBResult<T>,
    {
        let mut state = ctx.lock()?;
        let cancel = ctx.cancel_token();
        let result = cancel.check().and_then(|_| op(&mut state, cancel));
        match result {
            Err(e) if e.is_canceled() || cancel.is_canceled() => {
                info!(server = ctx.server(), "operation canceled");
                state.cancel(ctx.server());
                cancel.reset();
                Err(SMBError::Canceled)
            }
            result => {
                state.canceled = false;
                result
            }
        }
    }

    /// Resolves the context's server name without connecting.
    pub fn resolve(&self, ctx: &ConnectionContext, allow_loopback: bool) -> SMBResult<Resolution> {
        self.run(ctx, |state, cancel| {
            state.release(ctx.server());
            let resolution = self.resolver.resolve(ctx.server(), allow_loopback, cancel)?;
            state.record_resolution(resolution.clone());
            Ok(resolution)
        })
    }

    /// Brings `ctx` to the authenticated state. A context that already is authenticated over a
    /// live connection is left alone.
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip(self, ctx), fields(server = ctx.server())))]
    pub fn connect(&self, ctx: &ConnectionContext, force_new_session: bool, allow_loopback: bool) -> SMBResult<()> {
        self.run(ctx, |state, cancel| {
            if state.is_authenticated() && state.handle.as_ref().is_some_and(|handle| handle.is_connected()) {
                debug!("already connected");
                return Ok(());
            }
            let result = self.connect_via_directory(state, ctx, force_new_session, allow_loopback, cancel);
            if let Err(e) = &result {
                if !e.is_canceled() {
                    warn!(server = ctx.server(), error = %e, "connect failed");
                    state.release(ctx.server());
                }
            }
            result
        })
    }

    /// Domain names are tried through each of their controllers before the literal name.
    fn connect_via_directory(&self, state: &mut ContextState, ctx: &ConnectionContext, force_new_session: bool, allow_loopback: bool, cancel: &CancelToken) -> SMBResult<()> {
        let server = ctx.server();
        let controllers = match &self.directory {
            Some(directory) => match directory.domain_controllers(server, cancel) {
                Ok(controllers) => controllers.unwrap_or_default(),
                Err(e) if e.is_canceled() => return Err(e),
                Err(e) => {
                    debug!(server, error = %e, "domain controller lookup failed");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        for controller in &controllers {
            match self.connect_with_retry(state, ctx, controller, force_new_session, allow_loopback, cancel) {
                Ok(()) => {
                    info!(server, controller, "connected through domain controller");
                    state.display_name = controller.clone();
                    return Ok(());
                }
                Err(e) if e.is_canceled() => return Err(e),
                Err(e) => warn!(server, controller, error = %e, "domain controller unreachable"),
            }
        }
        if !controllers.is_empty() {
            info!(server, "all domain controllers failed, trying the name itself");
        }
        self.connect_with_retry(state, ctx, server, force_new_session, allow_loopback, cancel)
    }

    /// A disconnect during the sequence earns exactly one more try on a brand-new session.
    fn connect_with_retry(&self, state: &mut ContextState, ctx: &ConnectionContext, name: &str, force_new_session: bool, allow_loopback: bool, cancel: &CancelToken) -> SMBResult<()> {
        match self.establish(state, ctx, name, force_new_session, allow_loopback, cancel) {
            Err(e) if e.is_disconnect() => {
                warn!(server = name, error = %e, "disconnected while connecting, retrying once on a new session");
                self.establish(state, ctx, name, true, allow_loopback, cancel)
            }
            result => result,
        }
    }

    fn establish(&self, state: &mut ContextState, ctx: &ConnectionContext, name: &str, force_new_session: bool, allow_loopback: bool, cancel: &CancelToken) -> SMBResult<()> {
        state.release(ctx.server());
        let resolution = self.resolver.resolve(name, allow_loopback, cancel)?;
        state.record_resolution(resolution);

        if !force_new_session && self.negotiator.find_shared_session(state, name, ctx.auth()) {
            return Ok(());
        }

        let (address, handle) = race_candidates(self.transport.as_ref(), &state.addresses, cancel)?;
        state.address = Some(address);
        state.handle = Some(handle);

        self.negotiator.negotiate(state, ctx.scheme(), force_new_session, cancel)?;
        if state.state != ConnectionState::Authenticated {
            self.authenticator.authenticate(state, name, ctx.auth(), cancel)?;
        }
        debug!(server = name, %address, "connection established");
        Ok(())
    }

    /// Tree connects `share`, replacing any share the context is already on.
    pub fn connect_share(&self, ctx: &ConnectionContext, share: &str) -> SMBResult<ShareInfo> {
        self.run(ctx, |state, cancel| {
            if !state.is_authenticated() {
                return Err(SMBError::precondition_failed("tree connect needs an authenticated connection"));
            }
            if let Some(current) = &state.share {
                if current.name.eq_ignore_ascii_case(share) {
                    return Ok(current.clone());
                }
                state.handle()?.tree_disconnect()?;
                state.share = None;
                state.transition(ConnectionState::Authenticated);
            }
            let info = state.handle()?.tree_connect(share, cancel)?;
            debug!(share, dfs = info.is_dfs(), "share connected");
            state.share = Some(info.clone());
            state.transition(ConnectionState::ShareConnected);
            Ok(info)
        })
    }

    pub fn disconnect_share(&self, ctx: &ConnectionContext) -> SMBResult<()> {
        self.run(ctx, |state, _| {
            if state.share.is_none() {
                return Ok(());
            }
            state.handle()?.tree_disconnect()?;
            state.share = None;
            state.transition(ConnectionState::Authenticated);
            Ok(())
        })
    }

    /// Asks the connected server for a referral on `path`.
    pub fn get_referral(&self, ctx: &ConnectionContext, path: &str) -> SMBResult<ReferralResponse> {
        self.run(ctx, |state, cancel| {
            if !state.is_authenticated() {
                return Err(SMBError::precondition_failed("referral request needs an authenticated connection"));
            }
            let request = encode_request(path, self.config.max_referral_level);
            let response = state.handle()?.dfs_referral(&request, cancel)?;
            decode_response(&response, path)
        })
    }
}
