use std::fmt::{Debug, Formatter};

use serde::{Deserialize, Serialize};

pub use credentials::*;
pub use spnego::{MechanismOid, MechanismSet};

mod credentials;
pub mod spnego;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuthMechanism {
    Kerberos,
    NTLM,
    Guest,
    Anonymous,
    /// Pre-extended-security session setup (LM/NTLMv1 or clear text).
    Legacy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NameType {
    UserName,
    HostBasedService,
    Principal,
    NTLMUser,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrincipalName {
    pub name: String,
    pub name_type: NameType,
}

impl PrincipalName {
    pub fn new<T: Into<String>>(name: T, name_type: NameType) -> Self {
        Self { name: name.into(), name_type }
    }

    /// `cifs/<host>`, the service principal of a file server.
    pub fn cifs_service(host: &str) -> Self {
        Self::new(format!("cifs/{}", host), NameType::HostBasedService)
    }

    /// User part of `user@REALM` or `DOMAIN\user`.
    pub fn user(&self) -> &str {
        let name = self.name.rsplit('\\').next().unwrap_or(&self.name);
        name.split('@').next().unwrap_or(name)
    }
}

/// Password that never shows up in `Debug` output or logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Secret(String);

impl Secret {
    pub fn new<T: Into<String>>(value: T) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Debug for Secret {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Secret(***)")
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub user: Option<String>,
    pub domain: Option<String>,
    pub password: Option<Secret>,
}

impl Credentials {
    pub fn new<U: Into<String>, P: Into<Secret>>(user: U, password: P) -> Self {
        Self { user: Some(user.into()), domain: None, password: Some(password.into()) }
    }

    pub fn with_domain<T: Into<String>>(mut self, domain: T) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn has_password(&self) -> bool {
        self.password.is_some()
    }
}

/// An exact mechanism and identity supplied by the caller, tried as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplicitAuth {
    pub mechanism: AuthMechanism,
    pub client: Option<PrincipalName>,
    pub target: Option<PrincipalName>,
}

/// How the caller wants to be identified to the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthOptions {
    pub force_anonymous: bool,
    pub force_guest: bool,
    pub explicit: Option<ExplicitAuth>,
    pub credentials: Credentials,
}

impl AuthOptions {
    pub fn anonymous() -> Self {
        Self { force_anonymous: true, ..Default::default() }
    }

    pub fn guest() -> Self {
        Self { force_guest: true, ..Default::default() }
    }

    pub fn with_credentials(credentials: Credentials) -> Self {
        Self { credentials, ..Default::default() }
    }
}

/// One authentication try. Built, logged and dropped by the authenticator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthAttempt {
    pub mechanism: AuthMechanism,
    pub client: Option<PrincipalName>,
    pub target: Option<PrincipalName>,
    pub succeeded: Option<bool>,
}

impl AuthAttempt {
    pub fn new(mechanism: AuthMechanism, client: Option<PrincipalName>, target: Option<PrincipalName>) -> Self {
        Self { mechanism, client, target, succeeded: None }
    }
}
