use bitflags::bitflags;
use num_enum::TryFromPrimitive;
use serde::{Deserialize, Serialize};

use crate::util::flags_helper::{impl_smb_byte_size_for_bitflag, impl_smb_to_bytes_for_bitflag};
use crate::util::utf16::unconsumed_tail;

#[repr(u16)]
#[derive(Debug, Eq, PartialEq, TryFromPrimitive, Serialize, Deserialize, Copy, Clone, Ord, PartialOrd, Hash)]
pub enum ReferralVersion {
    V1 = 1,
    V2 = 2,
    V3 = 3,
    V4 = 4,
}

#[repr(u16)]
#[derive(Debug, Eq, PartialEq, TryFromPrimitive, Serialize, Deserialize, Copy, Clone, Hash, Default)]
pub enum ServerType {
    /// Link target: the server holds the data (or another namespace).
    #[default]
    NonRoot = 0x0,
    Root = 0x1,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
    pub struct ReferralHeaderFlags: u32 {
        const REFERRAL_SERVERS = 0x1;
        const STORAGE_SERVERS = 0x2;
        const TARGET_FAILBACK = 0x4;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
    pub struct ReferralEntryFlags: u16 {
        const NAME_LIST_REFERRAL = 0x2;
        const TARGET_SET_BOUNDARY = 0x4;
    }
}

impl_smb_byte_size_for_bitflag! { ReferralHeaderFlags ReferralEntryFlags }
impl_smb_to_bytes_for_bitflag! { ReferralHeaderFlags ReferralEntryFlags }

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ReferralPaths {
    pub dfs_path: String,
    pub alt_path: String,
    pub network_address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferralBody {
    Paths(ReferralPaths),
    /// Domain or DC referral: a special name and the names it expands to.
    NameList { special_name: String, expanded_names: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferralPayload {
    V1 { share_name: String },
    V2 { proximity: u32, ttl: u32, paths: ReferralPaths },
    V3 { ttl: u32, body: ReferralBody },
    V4 { ttl: u32, body: ReferralBody },
}

/// One decoded referral entry. The fields every version shares live here; the rest is in
/// [`ReferralPayload`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Referral {
    pub server_type: ServerType,
    pub entry_flags: ReferralEntryFlags,
    pub path_consumed: u16,
    pub payload: ReferralPayload,
    next_referral: String,
}

impl Referral {
    /// Builds an entry and derives its next referral string from `request_path`.
    ///
    /// Version 1 counts `path_consumed` in UTF-16 code units, later versions in bytes.
    pub fn new(server_type: ServerType, entry_flags: ReferralEntryFlags, path_consumed: u16, payload: ReferralPayload, request_path: &str) -> Self {
        let mut referral = Self { server_type, entry_flags, path_consumed, payload, next_referral: String::new() };
        let consumed_bytes = match referral.payload {
            ReferralPayload::V1 { .. } => path_consumed as usize * 2,
            _ => path_consumed as usize,
        };
        let next_referral = match referral.target() {
            Some(target) => [target, &*unconsumed_tail(request_path, consumed_bytes)].concat(),
            None => String::new(),
        };
        referral.next_referral = next_referral;
        referral
    }

    pub fn version(&self) -> ReferralVersion {
        match self.payload {
            ReferralPayload::V1 { .. } => ReferralVersion::V1,
            ReferralPayload::V2 { .. } => ReferralVersion::V2,
            ReferralPayload::V3 { .. } => ReferralVersion::V3,
            ReferralPayload::V4 { .. } => ReferralVersion::V4,
        }
    }

    pub fn ttl(&self) -> u32 {
        match self.payload {
            ReferralPayload::V1 { .. } => 0,
            ReferralPayload::V2 { ttl, .. } | ReferralPayload::V3 { ttl, .. } | ReferralPayload::V4 { ttl, .. } => ttl,
        }
    }

    pub fn paths(&self) -> Option<&ReferralPaths> {
        match &self.payload {
            ReferralPayload::V2 { paths, .. } => Some(paths),
            ReferralPayload::V3 { body: ReferralBody::Paths(paths), .. }
            | ReferralPayload::V4 { body: ReferralBody::Paths(paths), .. } => Some(paths),
            _ => None,
        }
    }

    /// Network address to connect to next, or the first expanded name of a name-list entry.
    pub fn target(&self) -> Option<&str> {
        match &self.payload {
            ReferralPayload::V1 { share_name } => Some(share_name.as_str()),
            ReferralPayload::V3 { body: ReferralBody::NameList { expanded_names, special_name }, .. }
            | ReferralPayload::V4 { body: ReferralBody::NameList { expanded_names, special_name }, .. } => {
                expanded_names.first().or(Some(special_name)).map(String::as_str)
            }
            _ => self.paths().map(|paths| paths.network_address.as_str()),
        }
    }

    pub fn dfs_path(&self) -> Option<&str> {
        self.paths().map(|paths| paths.dfs_path.as_str())
    }

    pub fn alt_path(&self) -> Option<&str> {
        self.paths().map(|paths| paths.alt_path.as_str())
    }

    pub fn name_list(&self) -> Option<(&str, &[String])> {
        match &self.payload {
            ReferralPayload::V3 { body: ReferralBody::NameList { special_name, expanded_names }, .. }
            | ReferralPayload::V4 { body: ReferralBody::NameList { special_name, expanded_names }, .. } => {
                Some((special_name.as_str(), expanded_names.as_slice()))
            }
            _ => None,
        }
    }

    /// Target followed by whatever part of the request path the server did not consume.
    pub fn next_referral(&self) -> &str {
        &self.next_referral
    }

    pub fn is_root(&self) -> bool {
        self.server_type == ServerType::Root
    }

    pub fn is_target_set_boundary(&self) -> bool {
        self.version() == ReferralVersion::V4 && self.entry_flags.contains(ReferralEntryFlags::TARGET_SET_BOUNDARY)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferralResponse {
    pub path_consumed: u16,
    pub header_flags: ReferralHeaderFlags,
    pub request_path: String,
    pub referrals: Vec<Referral>,
}

impl ReferralResponse {
    pub fn is_storage(&self) -> bool {
        self.header_flags.contains(ReferralHeaderFlags::STORAGE_SERVERS)
    }

    /// Targets grouped into target sets. Entries before the first boundary form the first set.
    pub fn target_sets(&self) -> Vec<&[Referral]> {
        let mut sets = Vec::new();
        let mut start = 0;
        for (idx, referral) in self.referrals.iter().enumerate() {
            if idx > start && referral.is_target_set_boundary() {
                sets.push(&self.referrals[start..idx]);
                start = idx;
            }
        }
        if start < self.referrals.len() {
            sets.push(&self.referrals[start..]);
        }
        sets
    }
}
