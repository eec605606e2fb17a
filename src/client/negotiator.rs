use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use uuid::Uuid;

use smb_core::error::SMBError;
use smb_core::logging::{debug, warn};
use smb_core::SMBResult;

use crate::client::context::{AuthFlags, ConnectionState, ContextState, Scheme};
use crate::config::SMBClientConfig;
use crate::protocol::SMBVersions;
use crate::transport::{CancelToken, NegotiateRequest, SessionQuery, Transport};
use crate::util::auth::{AuthOptions, MechanismSet};

pub struct Negotiator {
    config: Arc<SMBClientConfig>,
    transport: Arc<dyn Transport>,
}

impl Negotiator {
    pub fn new(config: Arc<SMBClientConfig>, transport: Arc<dyn Transport>) -> Self {
        Self { config, transport }
    }

    /// Versions offered for `scheme`. `cifs://` narrows the set to SMB1 and fails when that is
    /// disabled.
    pub fn versions_for(&self, scheme: Scheme) -> SMBResult<SMBVersions> {
        let enabled = self.config.enabled_versions;
        match scheme {
            Scheme::Smb if enabled.is_empty() => Err(SMBError::version_not_supported("no protocol versions are enabled")),
            Scheme::Smb => Ok(enabled),
            Scheme::Cifs if enabled.contains(SMBVersions::SMB1) => Ok(SMBVersions::SMB1),
            Scheme::Cifs => Err(SMBError::version_not_supported("cifs:// requires SMB1, which is disabled")),
        }
    }

    /// Looks for an authenticated session on any candidate address that this connection can
    /// join. On a match the context adopts the session and is authenticated.
    pub(crate) fn find_shared_session(&self, state: &mut ContextState, server: &str, auth: &AuthOptions) -> bool {
        for address in state.addresses.clone() {
            let query = self.session_query(address, state, server, auth);
            let Some(session) = self.transport.find_session(&query) else {
                continue;
            };
            debug!(server, %address, peer = %session.address, "sharing existing session");
            state.address = Some(session.address);
            state.dialect = Some(session.dialect);
            state.capabilities = session.capabilities;
            state.session_flags = session.session_flags;
            state.mechanisms = Some(import_mechanisms(&session.mech_token));
            state.handle = Some(session.handle);
            state.session_shared = true;
            state.auth_flags |= AuthFlags::CONNECTED | AuthFlags::AUTHORIZED;
            state.transition(ConnectionState::Authenticated);
            return true;
        }
        false
    }

    fn session_query(&self, address: SocketAddr, state: &ContextState, server: &str, auth: &AuthOptions) -> SessionQuery {
        SessionQuery {
            address,
            principal: auth.credentials.user.clone(),
            dns_name: state.match_dns_name.then(|| state.canonical_name.clone().unwrap_or_else(|| server.to_string())),
            multichannel: self.config.multichannel.enabled,
            high_fidelity: self.config.high_fidelity,
        }
    }

    pub(crate) fn negotiate(&self, state: &mut ContextState, scheme: Scheme, force_new_session: bool, cancel: &CancelToken) -> SMBResult<()> {
        let versions = self.versions_for(scheme)?;
        let request = NegotiateRequest {
            versions,
            dialects: versions.dialects(),
            security_mode: self.config.signing_required.security_mode(),
            multichannel: self.config.multichannel,
            client_guid: Uuid::new_v4(),
            force_new_session,
        };
        let response = state.handle()?.negotiate(&request, cancel).map_err(|e| {
            if cancel.is_canceled() { SMBError::Canceled } else { e }
        })?;
        if !versions.contains(response.dialect.version()) {
            return Err(SMBError::version_not_supported(format!("server chose {:?}, outside {:?}", response.dialect, versions)));
        }
        debug!(dialect = ?response.dialect, capabilities = ?response.capabilities, extended_security = response.extended_security, "negotiated");

        state.dialect = Some(response.dialect);
        state.capabilities = response.capabilities;
        state.security_mode = response.security_mode;
        state.legacy_security_mode = response.legacy_security_mode;
        state.extended_security = response.extended_security;
        state.mechanisms = response.extended_security.then(|| import_mechanisms(&response.mech_token));
        state.auth_flags |= AuthFlags::CONNECTED;

        match response.existing_session {
            Some(session_flags) if !force_new_session => {
                debug!("server connection already carries an authenticated session");
                state.session_flags = session_flags;
                state.session_shared = true;
                state.auth_flags |= AuthFlags::AUTHORIZED;
                state.transition(ConnectionState::Authenticated);
            }
            _ => state.transition(ConnectionState::Negotiated),
        }
        Ok(())
    }
}

/// Mechanism list from a negotiation token. An empty token means raw NTLM.
fn import_mechanisms(token: &Bytes) -> MechanismSet {
    if token.is_empty() {
        return MechanismSet::default_ntlm();
    }
    MechanismSet::parse(token).unwrap_or_else(|e| {
        warn!(error = %e, "ignoring unreadable mechanism list");
        MechanismSet::default_ntlm()
    })
}

#[cfg(test)]
mod tests {
    use crate::config::SMBClientConfigBuilder;
    use crate::transport::{SharedSession, TransportHandle};

    use super::*;

    struct NoTransport;

    impl Transport for NoTransport {
        fn connect(&self, _address: SocketAddr, _cancel: &CancelToken) -> SMBResult<Box<dyn TransportHandle>> {
            Err(SMBError::host_unreachable("none"))
        }

        fn find_session(&self, _query: &SessionQuery) -> Option<SharedSession> {
            None
        }
    }

    fn negotiator(config: SMBClientConfigBuilder) -> Negotiator {
        Negotiator::new(Arc::new(config.build().unwrap()), Arc::new(NoTransport))
    }

    #[test]
    fn cifs_scheme_needs_smb1() {
        let modern = negotiator(SMBClientConfig::builder());
        assert!(matches!(modern.versions_for(Scheme::Cifs), Err(SMBError::ProtocolVersionNotSupported(_))));
        assert_eq!(modern.versions_for(Scheme::Smb).unwrap(), SMBVersions::SMB2 | SMBVersions::SMB3);
        let legacy = negotiator(SMBClientConfig::builder().enabled_versions(SMBVersions::all()));
        assert_eq!(legacy.versions_for(Scheme::Cifs).unwrap(), SMBVersions::SMB1);
    }

    #[test]
    fn empty_token_synthesizes_ntlm() {
        let mechanisms = import_mechanisms(&Bytes::new());
        assert!(mechanisms.supports_ntlm());
        assert!(mechanisms.is_synthesized());
    }

    #[test]
    fn oversized_der_length_falls_back_to_ntlm() {
        let token = Bytes::from([&[0x60, 0x89][..], &[0xFF; 9]].concat());
        let mechanisms = import_mechanisms(&token);
        assert!(mechanisms.is_synthesized());
        assert_eq!(mechanisms.mechanisms(), &[crate::util::auth::MechanismOid::NTLM]);
    }

    #[test]
    fn no_shared_session_leaves_state_alone() {
        let mut state = ContextState { addresses: vec!["10.0.0.5:445".parse().unwrap()], ..Default::default() };
        assert!(!negotiator(SMBClientConfig::builder()).find_shared_session(&mut state, "fs1", &AuthOptions::default()));
        assert_eq!(state.state, ConnectionState::Idle);
        assert!(!state.session_shared);
    }
}
