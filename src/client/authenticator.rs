use std::sync::Arc;
use std::time::SystemTime;

use smb_core::error::SMBError;
use smb_core::logging::{debug, info, warn};
use smb_core::SMBResult;

use crate::client::context::{AuthFlags, ConnectionState, ContextState};
use crate::config::SMBClientConfig;
use crate::protocol::LegacySecurityMode;
use crate::transport::{AuthRequest, AuthResponse, CancelToken};
use crate::util::auth::{AuthAttempt, AuthMechanism, AuthOptions, CredentialGuard, CredentialStore, MechanismSet, NameType, PrincipalName, Secret, matching_credentials};

const GUEST_USER: &str = "GUEST";

/// Picks and runs an authentication strategy over a negotiated connection.
///
/// Strategies are tried in a fixed order: forced anonymous, forced guest, an explicit
/// mechanism from the caller, legacy session setup for servers without extended security,
/// Kerberos when the server offers it, and finally NTLM. Only a Kerberos failure falls
/// through to the next strategy.
pub struct Authenticator {
    config: Arc<SMBClientConfig>,
    credentials: Arc<dyn CredentialStore>,
}

impl Authenticator {
    pub fn new(config: Arc<SMBClientConfig>, credentials: Arc<dyn CredentialStore>) -> Self {
        Self { config, credentials }
    }

    pub(crate) fn authenticate(&self, state: &mut ContextState, server: &str, auth: &AuthOptions, cancel: &CancelToken) -> SMBResult<()> {
        self.check_policy(state)?;
        let target = state.canonical_name.clone().unwrap_or_else(|| server.to_string());

        let response = if auth.force_anonymous {
            self.attempt(state, self.request(AuthMechanism::Anonymous, None, None, auth), cancel)
        } else if auth.force_guest {
            let guest = PrincipalName::new(auth.credentials.user.as_deref().unwrap_or(GUEST_USER), NameType::NTLMUser);
            let request = AuthRequest { domain: Some(String::new()), password: Some(Secret::new("")), ..self.request(AuthMechanism::Guest, Some(guest), None, auth) };
            self.attempt(state, request, cancel)
        } else if let Some(explicit) = &auth.explicit {
            let request = self.request(explicit.mechanism, explicit.client.clone(), explicit.target.clone(), auth);
            self.attempt(state, request, cancel)
        } else if !state.extended_security {
            let client = auth.credentials.user.as_deref().map(|user| PrincipalName::new(user, NameType::NTLMUser));
            self.attempt(state, self.request(AuthMechanism::Legacy, client, None, auth), cancel)
        } else {
            let mechanisms = state.mechanisms.clone().unwrap_or_else(MechanismSet::default_ntlm);
            self.negotiated(state, &mechanisms, &target, auth, cancel)
        }?;

        if auth.credentials.has_password() {
            state.auth_flags |= AuthFlags::EXPLICIT_PASSWORD;
        }
        state.session_flags = response.session_flags;
        if response.user.is_some() {
            state.session_user = response.user;
        }
        state.auth_flags |= AuthFlags::AUTHORIZED;
        state.transition(ConnectionState::Authenticated);
        Ok(())
    }

    fn check_policy(&self, state: &ContextState) -> SMBResult<()> {
        let offers_kerberos = state.extended_security && state.mechanisms.as_ref().is_some_and(MechanismSet::supports_kerberos);
        if self.config.kerberos_only() && !offers_kerberos {
            return Err(SMBError::no_supported_mechanism("policy requires Kerberos and the server does not offer it"));
        }
        let legacy = state.dialect.is_some_and(|dialect| dialect.is_legacy());
        let wants_plaintext = legacy && !state.extended_security
            && !state.legacy_security_mode.contains(LegacySecurityMode::ENCRYPT_PASSWORDS);
        if wants_plaintext && !self.config.allow_plaintext_passwords() {
            return Err(SMBError::no_supported_mechanism("server requires clear-text passwords"));
        }
        Ok(())
    }

    /// Kerberos with NTLM fallback, or NTLM alone.
    fn negotiated(&self, state: &mut ContextState, mechanisms: &MechanismSet, target: &str, auth: &AuthOptions, cancel: &CancelToken) -> SMBResult<AuthResponse> {
        if mechanisms.supports_kerberos() {
            match self.kerberos(state, target, auth, cancel) {
                Ok(response) => return Ok(response),
                Err(e) if e.is_canceled() || self.config.kerberos_only() || !mechanisms.supports_ntlm() => return Err(e),
                Err(e) => info!(error = %e, "Kerberos failed, falling back to NTLM"),
            }
        }
        if !mechanisms.supports_ntlm() {
            return Err(SMBError::no_supported_mechanism("server offers neither Kerberos nor NTLM"));
        }
        if mechanisms.is_synthesized() {
            state.auth_flags |= AuthFlags::RAW_NTLM;
        }
        self.ntlm(state, target, auth, cancel)
    }

    fn kerberos(&self, state: &mut ContextState, target: &str, auth: &AuthOptions, cancel: &CancelToken) -> SMBResult<AuthResponse> {
        let service = PrincipalName::cifs_service(target);
        let credentials = &auth.credentials;
        match (&credentials.user, &credentials.password) {
            (Some(user), Some(password)) => {
                let client = match &credentials.domain {
                    Some(realm) => PrincipalName::new(format!("{}@{}", user, realm.to_uppercase()), NameType::Principal),
                    None => PrincipalName::new(user.as_str(), NameType::Principal),
                };
                let guard = CredentialGuard::acquire(&self.credentials, AuthMechanism::Kerberos, &client, Some(password))?;
                let request = AuthRequest { credential: Some(guard.handle()), ..self.request(AuthMechanism::Kerberos, Some(client), Some(service), auth) };
                let response = self.attempt(state, request, cancel)?;
                state.credential = Some(guard);
                Ok(response)
            }
            _ => self.search_cache(state, AuthMechanism::Kerberos, Some(service), auth, cancel),
        }
    }

    fn ntlm(&self, state: &mut ContextState, target: &str, auth: &AuthOptions, cancel: &CancelToken) -> SMBResult<AuthResponse> {
        let credentials = &auth.credentials;
        let target = PrincipalName::new(target, NameType::HostBasedService);
        match &credentials.user {
            Some(user) if credentials.has_password() => {
                let client = PrincipalName::new(user.as_str(), NameType::NTLMUser);
                self.attempt(state, self.request(AuthMechanism::NTLM, Some(client), Some(target), auth), cancel)
            }
            _ => self.search_cache(state, AuthMechanism::NTLM, Some(target), auth, cancel),
        }
    }

    /// Tries cached identities in cache order. With a user name only that user's entries are
    /// considered (and, for NTLM, only those of the requested domain). The search moves on only
    /// when the server rejects the identity itself.
    fn search_cache(&self, state: &mut ContextState, mechanism: AuthMechanism, target: Option<PrincipalName>, auth: &AuthOptions, cancel: &CancelToken) -> SMBResult<AuthResponse> {
        let user = auth.credentials.user.as_deref();
        let domain = match mechanism {
            AuthMechanism::NTLM => auth.credentials.domain.as_deref(),
            _ => None,
        };
        let candidates = matching_credentials(self.credentials.cached_credentials(mechanism), user, domain, SystemTime::now());
        debug!(?mechanism, user, candidates = candidates.len(), "searching credential cache");

        let mut last_error = None;
        for cached in candidates {
            cancel.check()?;
            let client = PrincipalName::new(cached.principal.as_str(), NameType::Principal);
            let guard = match CredentialGuard::acquire(&self.credentials, mechanism, &client, None) {
                Ok(guard) => guard,
                Err(e) if e.is_canceled() => return Err(e),
                Err(e) => {
                    debug!(principal = %cached.principal, error = %e, "cached credential unusable");
                    last_error = Some(e);
                    continue;
                }
            };
            let request = AuthRequest { credential: Some(guard.handle()), ..self.request(mechanism, Some(client), target.clone(), auth) };
            match self.attempt(state, request, cancel) {
                Ok(mut response) => {
                    response.user = guard.principal().or(response.user).or(Some(cached.principal));
                    state.credential = Some(guard);
                    return Ok(response);
                }
                Err(e) if e.is_credential_failure() => last_error = Some(e),
                // Another identity cannot fix a refusal that is not about the identity.
                Err(e) => return Err(e),
            }
        }
        Err(last_error.unwrap_or_else(|| SMBError::auth_failed(format!("no cached {:?} credentials for {}", mechanism, user.unwrap_or("any user")))))
    }

    fn request(&self, mechanism: AuthMechanism, client: Option<PrincipalName>, target: Option<PrincipalName>, auth: &AuthOptions) -> AuthRequest {
        AuthRequest {
            mechanism,
            client,
            target,
            domain: auth.credentials.domain.clone(),
            credential: None,
            password: auth.credentials.password.clone(),
            allow_ntlm_v1: self.config.allow_ntlm_v1(),
            allow_plaintext: self.config.allow_plaintext_passwords(),
        }
    }

    fn attempt(&self, state: &mut ContextState, request: AuthRequest, cancel: &CancelToken) -> SMBResult<AuthResponse> {
        let mut attempt = AuthAttempt::new(request.mechanism, request.client.clone(), request.target.clone());
        let result = state.handle()?.authenticate(&request, cancel).map_err(|e| {
            if cancel.is_canceled() { SMBError::Canceled } else { e }
        });
        attempt.succeeded = Some(result.is_ok());
        match &result {
            Ok(_) => debug!(?attempt, "authenticated"),
            Err(e) => warn!(?attempt, error = %e, "authentication attempt failed"),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use crate::config::MinAuthLevel;
    use crate::protocol::SMBDialect;
    use crate::util::auth::{CachedCredential, CredentialHandle};

    use super::*;

    struct EmptyStore;

    impl CredentialStore for EmptyStore {
        fn acquire(&self, _mechanism: AuthMechanism, _principal: &PrincipalName, _password: Option<&Secret>) -> SMBResult<CredentialHandle> {
            Ok(CredentialHandle(1))
        }

        fn release(&self, _handle: CredentialHandle) {}

        fn cached_credentials(&self, _mechanism: AuthMechanism) -> Vec<CachedCredential> {
            Vec::new()
        }

        fn principal_of(&self, _handle: CredentialHandle) -> Option<String> {
            None
        }
    }

    fn authenticator(level: MinAuthLevel) -> Authenticator {
        let config = SMBClientConfig::builder().min_auth_level(level).build().unwrap();
        Authenticator::new(Arc::new(config), Arc::new(EmptyStore))
    }

    #[test]
    fn kerberos_only_needs_server_kerberos() {
        let state = ContextState { extended_security: true, mechanisms: Some(MechanismSet::default_ntlm()), ..Default::default() };
        assert!(matches!(authenticator(MinAuthLevel::Kerberos).check_policy(&state), Err(SMBError::NoSupportedAuthMechanism(_))));
        assert!(authenticator(MinAuthLevel::NTLMv2).check_policy(&state).is_ok());
    }

    #[test]
    fn plaintext_servers_need_permissive_policy() {
        let state = ContextState { dialect: Some(SMBDialect::NT_LM_0_12), legacy_security_mode: LegacySecurityMode::USER_SECURITY, ..Default::default() };
        assert!(matches!(authenticator(MinAuthLevel::NTLM).check_policy(&state), Err(SMBError::NoSupportedAuthMechanism(_))));
        assert!(authenticator(MinAuthLevel::None).check_policy(&state).is_ok());
    }

    #[test]
    fn empty_cache_is_an_auth_failure() {
        let mut state = ContextState::default();
        let error = authenticator(MinAuthLevel::NTLMv2)
            .search_cache(&mut state, AuthMechanism::NTLM, None, &AuthOptions::default(), &CancelToken::new())
            .unwrap_err();
        assert!(matches!(error, SMBError::AuthenticationFailed(_)));
    }
}
