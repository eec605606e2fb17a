//! Protocol-level values the client negotiates and records: dialects, capability and
//! security flag sets, and what a tree connect reports about a share.

pub mod capabilities;
pub mod dialect;
pub mod security_mode;
pub mod share;

pub use capabilities::{Capabilities, SMBSessionFlags};
pub use dialect::{SMBDialect, SMBVersions};
pub use security_mode::{LegacySecurityMode, NegotiateSecurityMode, SigningRequirements};
pub use share::{SMBShareFlags, SMBShareType, SMBTreeConnectCapabilities, ShareInfo};
