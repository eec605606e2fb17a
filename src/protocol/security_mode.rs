use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize, Default)]
    pub struct NegotiateSecurityMode: u16 {
        const NEGOTIATE_SIGNING_ENABLED = 0x01;
        const NEGOTIATE_SIGNING_REQUIRED = 0x02;
    }
}

bitflags! {
    /// SMB1 server security mode. Servers without `ENCRYPT_PASSWORDS` expect clear-text passwords.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize, Default)]
    pub struct LegacySecurityMode: u8 {
        const USER_SECURITY = 0x01;
        const ENCRYPT_PASSWORDS = 0x02;
        const SIGNATURES_ENABLED = 0x04;
        const SIGNATURES_REQUIRED = 0x08;
    }
}

bitflags! {
    /// Protocol families on which the client insists on signed traffic.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, Default)]
    pub struct SigningRequirements: u32 {
        const SMB1 = 0x01;
        const SMB2 = 0x02;
        const SMB3 = 0x04;
    }
}

impl SigningRequirements {
    pub fn security_mode(&self) -> NegotiateSecurityMode {
        if self.is_empty() {
            NegotiateSecurityMode::NEGOTIATE_SIGNING_ENABLED
        } else {
            NegotiateSecurityMode::NEGOTIATE_SIGNING_ENABLED | NegotiateSecurityMode::NEGOTIATE_SIGNING_REQUIRED
        }
    }
}
