use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Global capabilities a server advertises in its negotiate response.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize, Default)]
    pub struct Capabilities: u32 {
        const DFS                = 0x01;
        const LEASING            = 0x02;
        const LARGE_MTU          = 0x04;
        const MULTI_CHANNEL      = 0x08;
        const PERSISTENT_HANDLES = 0x10;
        const DIRECTORY_LEASING  = 0x20;
        const ENCRYPTION         = 0x40;
    }
}

bitflags! {
    /// Session properties reported by session setup, or copied from a shared session.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize, Default)]
    pub struct SMBSessionFlags: u16 {
        const IS_GUEST = 0x01;
        const IS_NULL = 0x02;
        const ENCRYPT_DATA = 0x04;
    }
}
