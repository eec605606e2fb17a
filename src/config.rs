use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::protocol::{SigningRequirements, SMBVersions};

pub const DEFAULT_PORT: u16 = 445;
pub const NETBIOS_PORT: u16 = 139;
pub const DEFAULT_MAX_REFERRAL_HOPS: usize = 30;
pub const DEFAULT_MAX_REFERRAL_LEVEL: u16 = 4;

/// Weakest authentication the client will accept, ordered weakest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub enum MinAuthLevel {
    /// Anything goes, including clear-text passwords.
    None,
    LanManager,
    NTLM,
    #[default]
    NTLMv2,
    Kerberos,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct MultichannelPreferences {
    pub enabled: bool,
    pub prefer_wired: bool,
}

/// Client preferences, loaded once by the caller and handed to the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Builder)]
#[builder(name = "SMBClientConfigBuilder", pattern = "owned")]
pub struct SMBClientConfig {
    #[builder(default)]
    pub enabled_versions: SMBVersions,
    #[builder(default)]
    pub signing_required: SigningRequirements,
    #[builder(default)]
    pub multichannel: MultichannelPreferences,
    #[builder(default)]
    pub high_fidelity: bool,
    #[builder(default)]
    pub min_auth_level: MinAuthLevel,
    #[builder(default)]
    pub netbios_before_dns: bool,
    #[builder(default = "DEFAULT_PORT")]
    pub port: u16,
    #[builder(default)]
    pub try_both_ports: bool,
    #[builder(default = "DEFAULT_MAX_REFERRAL_HOPS")]
    pub max_referral_hops: usize,
    #[builder(default = "DEFAULT_MAX_REFERRAL_LEVEL")]
    pub max_referral_level: u16,
}

impl Default for SMBClientConfig {
    fn default() -> Self {
        Self {
            enabled_versions: SMBVersions::default(),
            signing_required: SigningRequirements::empty(),
            multichannel: MultichannelPreferences::default(),
            high_fidelity: false,
            min_auth_level: MinAuthLevel::default(),
            netbios_before_dns: false,
            port: DEFAULT_PORT,
            try_both_ports: false,
            max_referral_hops: DEFAULT_MAX_REFERRAL_HOPS,
            max_referral_level: DEFAULT_MAX_REFERRAL_LEVEL,
        }
    }
}

impl SMBClientConfig {
    pub fn builder() -> SMBClientConfigBuilder {
        SMBClientConfigBuilder::default()
    }

    pub fn allow_plaintext_passwords(&self) -> bool {
        self.min_auth_level == MinAuthLevel::None
    }

    /// NTLMv1 (and LM) responses are only sent to legacy servers when policy allows them.
    pub fn allow_ntlm_v1(&self) -> bool {
        self.min_auth_level <= MinAuthLevel::NTLM
    }

    pub fn kerberos_only(&self) -> bool {
        self.min_auth_level == MinAuthLevel::Kerberos
    }

    /// NetBIOS is only worth asking when the caller targets its port or both ports.
    pub fn netbios_allowed(&self) -> bool {
        self.port == NETBIOS_PORT || self.try_both_ports
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults_match_default() {
        let built = SMBClientConfig::builder().build().unwrap();
        assert_eq!(built, SMBClientConfig::default());
        assert_eq!(built.port, 445);
        assert_eq!(built.max_referral_hops, 30);
        assert_eq!(built.max_referral_level, 4);
    }

    #[test]
    fn auth_levels_are_ordered() {
        assert!(MinAuthLevel::None < MinAuthLevel::LanManager);
        assert!(MinAuthLevel::NTLM < MinAuthLevel::NTLMv2);
        assert!(MinAuthLevel::NTLMv2 < MinAuthLevel::Kerberos);
    }

    #[test]
    fn policy_helpers() {
        let config = SMBClientConfig::builder().min_auth_level(MinAuthLevel::None).build().unwrap();
        assert!(config.allow_plaintext_passwords());
        assert!(config.allow_ntlm_v1());
        let config = SMBClientConfig::builder().min_auth_level(MinAuthLevel::Kerberos).build().unwrap();
        assert!(config.kerberos_only());
        assert!(!config.allow_ntlm_v1());
    }

    #[test]
    fn netbios_gate() {
        assert!(!SMBClientConfig::default().netbios_allowed());
        assert!(SMBClientConfig::builder().port(NETBIOS_PORT).build().unwrap().netbios_allowed());
        assert!(SMBClientConfig::builder().try_both_ports(true).build().unwrap().netbios_allowed());
    }
}
