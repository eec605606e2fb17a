use bitflags::bitflags;
use num_enum::TryFromPrimitive;
use serde::{Deserialize, Serialize};

#[repr(u8)]
#[derive(Debug, Eq, PartialEq, TryFromPrimitive, Serialize, Deserialize, Copy, Clone, Default)]
pub enum SMBShareType {
    #[default]
    Disk = 0x01,
    Pipe = 0x02,
    Print = 0x03,
}

bitflags! {
    #[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Copy, Clone, Default)]
    pub struct SMBShareFlags: u32 {
        const DFS                         = 0x000001;
        const DFS_ROOT                    = 0x000002;
        const RESTRICT_EXCLUSIVE_OPENS    = 0x000100;
        const FORCE_SHARED_DELETE         = 0x000200;
        const ALLOW_NAMESPACE_CACHING     = 0x000400;
        const ACCESS_BASED_DIRECTORY_ENUM = 0x000800;
        const ENCRYPT_DATA                = 0x008000;
    }
}

bitflags! {
    #[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone, Copy, Default)]
    pub struct SMBTreeConnectCapabilities: u32 {
        const DFS                     = 0x008;
        const CONTINUOUS_AVAILABILITY = 0x010;
        const SCALEOUT                = 0x020;
        const CLUSTER                 = 0x040;
        const ASYMMETRIC              = 0x080;
        const REDIRECT_TO_OWNER       = 0x100;
    }
}

/// What a tree connect told us about the share.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareInfo {
    pub name: String,
    pub share_type: SMBShareType,
    pub flags: SMBShareFlags,
    pub capabilities: SMBTreeConnectCapabilities,
}

impl ShareInfo {
    pub fn disk<T: Into<String>>(name: T) -> Self {
        Self {
            name: name.into(),
            share_type: SMBShareType::Disk,
            flags: SMBShareFlags::empty(),
            capabilities: SMBTreeConnectCapabilities::empty(),
        }
    }

    pub fn dfs_root<T: Into<String>>(name: T) -> Self {
        Self {
            name: name.into(),
            share_type: SMBShareType::Disk,
            flags: SMBShareFlags::DFS | SMBShareFlags::DFS_ROOT,
            capabilities: SMBTreeConnectCapabilities::DFS,
        }
    }

    /// Paths under this share may need a referral before they can be opened.
    pub fn is_dfs(&self) -> bool {
        self.flags.intersects(SMBShareFlags::DFS | SMBShareFlags::DFS_ROOT)
            || self.capabilities.contains(SMBTreeConnectCapabilities::DFS)
    }
}
