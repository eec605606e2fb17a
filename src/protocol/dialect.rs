use bitflags::bitflags;
use num_enum::TryFromPrimitive;
use serde::{Deserialize, Serialize};

#[repr(u16)]
#[derive(Debug, Eq, PartialEq, TryFromPrimitive, Serialize, Deserialize, Copy, Clone, Ord, PartialOrd, Hash, Default)]
#[allow(non_camel_case_types)]
pub enum SMBDialect {
    /// SMB1 "NT LM 0.12", negotiated by dialect string rather than revision number.
    NT_LM_0_12 = 0x0,
    V2_0_2 = 0x202,
    V2_1_0 = 0x210,
    V3_0_0 = 0x300,
    V3_0_2 = 0x302,
    V3_1_1 = 0x311,
    #[default]
    V2_X_X = 0x2FF
}

impl SMBDialect {
    pub fn is_smb3(&self) -> bool {
        *self != Self::V2_X_X && *self as u16 >= 0x300
    }

    pub fn is_legacy(&self) -> bool {
        *self == Self::NT_LM_0_12
    }

    pub fn version(&self) -> SMBVersions {
        match self {
            Self::NT_LM_0_12 => SMBVersions::SMB1,
            Self::V3_0_0 | Self::V3_0_2 | Self::V3_1_1 => SMBVersions::SMB3,
            _ => SMBVersions::SMB2,
        }
    }
}

bitflags! {
    /// Protocol families a client is willing to negotiate.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
    pub struct SMBVersions: u32 {
        const SMB1 = 0x01;
        const SMB2 = 0x02;
        const SMB3 = 0x04;
    }
}

impl Default for SMBVersions {
    fn default() -> Self {
        Self::SMB2 | Self::SMB3
    }
}

impl SMBVersions {
    /// Dialects offered in a negotiate request, lowest first.
    pub fn dialects(&self) -> Vec<SMBDialect> {
        let mut dialects = Vec::new();
        if self.contains(Self::SMB1) {
            dialects.push(SMBDialect::NT_LM_0_12);
        }
        if self.contains(Self::SMB2) {
            dialects.extend([SMBDialect::V2_0_2, SMBDialect::V2_1_0]);
        }
        if self.contains(Self::SMB3) {
            dialects.extend([SMBDialect::V3_0_0, SMBDialect::V3_0_2, SMBDialect::V3_1_1]);
        }
        dialects
    }
}
