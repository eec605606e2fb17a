//! MS-DFSC referral wire format: `REQ_GET_DFS_REFERRAL` encoding and `RESP_GET_DFS_REFERRAL`
//! decoding for entry versions 1 through 4.

use nom::bytes::complete::take;
use nom::combinator::map;
use nom::IResult;
use nom::multi::count;
use nom::number::complete::{le_u16, le_u32};
use nom::sequence::tuple;

use smb_core::{SMBByteSize, SMBResult, SMBToBytes};
use smb_core::error::SMBError;

use crate::dfs::referral::{Referral, ReferralBody, ReferralEntryFlags, ReferralHeaderFlags, ReferralPaths, ReferralPayload, ReferralResponse, ReferralVersion, ServerType};
use crate::util::utf16::{encode_utf16_nul, parse_utf16_nul, read_utf16_nul_at};

const RESPONSE_HEADER_SIZE: usize = 8;
const ENTRY_HEADER_SIZE: usize = 8;
const V2_ENTRY_SIZE: usize = 22;
const V3_PATHS_ENTRY_SIZE: usize = 34;
const V3_NAME_LIST_ENTRY_SIZE: usize = 18;
const SERVICE_SITE_GUID_SIZE: usize = 16;

struct EntryHeader {
    version: u16,
    size: u16,
    server_type: u16,
    flags: u16,
}

/// `REQ_GET_DFS_REFERRAL`: highest understood version followed by the null-terminated path.
pub fn encode_request(path: &str, max_level: u16) -> Vec<u8> {
    [max_level.smb_to_bytes(), encode_utf16_nul(path)].concat()
}

/// Encodes `response` as `RESP_GET_DFS_REFERRAL`. Every size, count and string offset on the
/// wire is 16 bits, so a response whose encoding outgrows `u16::MAX` bytes is rejected.
pub fn encode_response(response: &ReferralResponse) -> SMBResult<Vec<u8>> {
    let size = response.smb_byte_size();
    if size > u16::MAX as usize {
        return Err(SMBError::malformed_referral(format!("referral response needs {} bytes, 16-bit offsets address {}", size, u16::MAX)));
    }
    Ok(response.smb_to_bytes())
}

/// Decodes a referral response for `request_path`, the path the request was built from.
pub fn decode_response(bytes: &[u8], request_path: &str) -> SMBResult<ReferralResponse> {
    smb_core::logging::trace!(buf_len = bytes.len(), request_path, "decoding referral response");
    let (_, (path_consumed, referral_count, header_flags)) = parse_response_header(bytes)
        .map_err(|_| SMBError::truncated_referral(format!("response header needs {} bytes, got {}", RESPONSE_HEADER_SIZE, bytes.len())))?;
    if referral_count == 0 {
        return Err(SMBError::NoReferralsAvailable);
    }
    let header_flags = ReferralHeaderFlags::from_bits_truncate(header_flags)
        & (ReferralHeaderFlags::REFERRAL_SERVERS | ReferralHeaderFlags::STORAGE_SERVERS);

    let mut referrals = Vec::with_capacity(referral_count as usize);
    let mut offset = RESPONSE_HEADER_SIZE;
    for idx in 0..referral_count as usize {
        let entry = bytes.get(offset..).unwrap_or_default();
        let (_, header) = parse_entry_header(entry)
            .map_err(|_| SMBError::truncated_referral(format!("entry {} header at offset {} runs past end of buffer", idx, offset)))?;
        if (header.size as usize) < ENTRY_HEADER_SIZE {
            return Err(SMBError::malformed_referral(format!("entry {} at offset {} declares size {}", idx, offset, header.size)));
        }
        referrals.push(decode_entry(bytes, offset, idx, &header, path_consumed, request_path)?);
        offset += header.size as usize;
    }
    smb_core::logging::debug!(referrals = referrals.len(), path_consumed, ?header_flags, "decoded referral response");

    Ok(ReferralResponse {
        path_consumed,
        header_flags,
        request_path: request_path.into(),
        referrals,
    })
}

fn parse_response_header(bytes: &[u8]) -> IResult<&[u8], (u16, u16, u32)> {
    tuple((le_u16, le_u16, le_u32))(bytes)
}

fn parse_entry_header(bytes: &[u8]) -> IResult<&[u8], EntryHeader> {
    map(tuple((le_u16, le_u16, le_u16, le_u16)), |(version, size, server_type, flags)| {
        EntryHeader { version, size, server_type, flags }
    })(bytes)
}

fn decode_entry(bytes: &[u8], offset: usize, idx: usize, header: &EntryHeader, path_consumed: u16, request_path: &str) -> SMBResult<Referral> {
    let version = ReferralVersion::try_from(header.version)
        .map_err(|_| SMBError::UnsupportedReferralVersion(header.version))?;
    let server_type = ServerType::try_from(header.server_type)
        .map_err(|_| SMBError::malformed_referral(format!("entry {} has server type {:#x}", idx, header.server_type)))?;
    // Entry flags are reserved before V3, and the target set boundary is a V4 addition.
    let entry_flags = match version {
        ReferralVersion::V1 | ReferralVersion::V2 => ReferralEntryFlags::empty(),
        ReferralVersion::V3 => ReferralEntryFlags::from_bits_truncate(header.flags) & ReferralEntryFlags::NAME_LIST_REFERRAL,
        ReferralVersion::V4 => ReferralEntryFlags::from_bits_truncate(header.flags),
    };
    // Fixed fields stay inside the declared size. String offsets may point anywhere in the buffer.
    let body = || bytes.get(offset + ENTRY_HEADER_SIZE..offset + header.size as usize)
        .ok_or_else(|| SMBError::truncated_referral(format!("entry {} declares {} bytes at offset {}, buffer holds {}", idx, header.size, offset, bytes.len())));
    let truncated = |_| SMBError::truncated_referral(format!("entry {} fixed fields overrun its declared size {}", idx, header.size));

    let payload = match version {
        ReferralVersion::V1 => ReferralPayload::V1 { share_name: read_utf16_nul_at(bytes, offset + ENTRY_HEADER_SIZE)? },
        ReferralVersion::V2 => {
            let (_, (proximity, ttl, offsets)) = tuple((le_u32, le_u32, parse_offsets))(body()?).map_err(truncated)?;
            ReferralPayload::V2 { proximity, ttl, paths: read_paths(bytes, offset, offsets)? }
        }
        ReferralVersion::V3 | ReferralVersion::V4 => {
            let (rest, ttl) = le_u32::<_, nom::error::Error<&[u8]>>(body()?).map_err(truncated)?;
            let body = if entry_flags.contains(ReferralEntryFlags::NAME_LIST_REFERRAL) {
                let (_, (special_offset, name_count, expanded_offset)) = parse_offsets(rest).map_err(truncated)?;
                ReferralBody::NameList {
                    special_name: read_utf16_nul_at(bytes, offset + special_offset as usize)?,
                    expanded_names: read_name_list(bytes, offset + expanded_offset as usize, name_count as usize)?,
                }
            } else {
                let (_, (offsets, _guid)) = tuple((parse_offsets, take(SERVICE_SITE_GUID_SIZE)))(rest).map_err(truncated)?;
                ReferralBody::Paths(read_paths(bytes, offset, offsets)?)
            };
            match version {
                ReferralVersion::V3 => ReferralPayload::V3 { ttl, body },
                _ => ReferralPayload::V4 { ttl, body },
            }
        }
    };
    Ok(Referral::new(server_type, entry_flags, path_consumed, payload, request_path))
}

fn parse_offsets(bytes: &[u8]) -> IResult<&[u8], (u16, u16, u16)> {
    tuple((le_u16, le_u16, le_u16))(bytes)
}

fn read_paths(bytes: &[u8], entry_offset: usize, (dfs, alt, network): (u16, u16, u16)) -> SMBResult<ReferralPaths> {
    Ok(ReferralPaths {
        dfs_path: read_utf16_nul_at(bytes, entry_offset + dfs as usize)?,
        alt_path: read_utf16_nul_at(bytes, entry_offset + alt as usize)?,
        network_address: read_utf16_nul_at(bytes, entry_offset + network as usize)?,
    })
}

fn read_name_list(bytes: &[u8], offset: usize, name_count: usize) -> SMBResult<Vec<String>> {
    if name_count == 0 {
        return Ok(Vec::new());
    }
    let list = bytes.get(offset..).unwrap_or_default();
    let (_, names) = count(parse_utf16_nul, name_count)(list)
        .map_err(|_| SMBError::truncated_referral(format!("{} expanded names at offset {} run past end of buffer", name_count, offset)))?;
    names.iter()
        .map(|units| String::from_utf16(units).map_err(|_| SMBError::malformed_referral(format!("invalid UTF-16 expanded name at offset {}", offset))))
        .collect()
}

// Encoding. Fixed-size entries come first, then a pool holding every offset-addressed string.

fn fixed_entry_size(referral: &Referral) -> usize {
    match &referral.payload {
        ReferralPayload::V1 { share_name } => ENTRY_HEADER_SIZE + encode_utf16_nul(share_name).len(),
        ReferralPayload::V2 { .. } => V2_ENTRY_SIZE,
        ReferralPayload::V3 { body: ReferralBody::Paths(_), .. } | ReferralPayload::V4 { body: ReferralBody::Paths(_), .. } => V3_PATHS_ENTRY_SIZE,
        ReferralPayload::V3 { .. } | ReferralPayload::V4 { .. } => V3_NAME_LIST_ENTRY_SIZE,
    }
}

fn pooled_strings(referral: &Referral) -> Vec<&str> {
    match &referral.payload {
        ReferralPayload::V1 { .. } => Vec::new(),
        ReferralPayload::V2 { paths, .. }
        | ReferralPayload::V3 { body: ReferralBody::Paths(paths), .. }
        | ReferralPayload::V4 { body: ReferralBody::Paths(paths), .. } => {
            vec![paths.dfs_path.as_str(), paths.alt_path.as_str(), paths.network_address.as_str()]
        }
        ReferralPayload::V3 { body: ReferralBody::NameList { special_name, expanded_names }, .. }
        | ReferralPayload::V4 { body: ReferralBody::NameList { special_name, expanded_names }, .. } => {
            std::iter::once(special_name.as_str()).chain(expanded_names.iter().map(String::as_str)).collect()
        }
    }
}

fn encode_entry(referral: &Referral, entry_offset: usize, pool_offset: usize) -> Vec<u8> {
    let size = fixed_entry_size(referral);
    let header = |version: ReferralVersion, flags: ReferralEntryFlags| {
        [
            (version as u16).smb_to_bytes(),
            (size as u16).smb_to_bytes(),
            (referral.server_type as u16).smb_to_bytes(),
            flags.smb_to_bytes(),
        ].concat()
    };
    // Offsets of each pooled string, relative to the start of this entry.
    let mut relative = pool_offset - entry_offset;
    let offsets = pooled_strings(referral).iter().map(|value| {
        let current = relative as u16;
        relative += encode_utf16_nul(value).len();
        current
    }).collect::<Vec<u16>>();

    match &referral.payload {
        ReferralPayload::V1 { share_name } => [header(ReferralVersion::V1, ReferralEntryFlags::empty()), encode_utf16_nul(share_name)].concat(),
        ReferralPayload::V2 { proximity, ttl, .. } => [
            header(ReferralVersion::V2, ReferralEntryFlags::empty()),
            proximity.smb_to_bytes(),
            ttl.smb_to_bytes(),
            offsets[..3].iter().flat_map(|x| x.smb_to_bytes()).collect(),
        ].concat(),
        ReferralPayload::V3 { ttl, body } | ReferralPayload::V4 { ttl, body } => {
            let version = referral.version();
            match body {
                ReferralBody::Paths(_) => [
                    header(version, referral.entry_flags - ReferralEntryFlags::NAME_LIST_REFERRAL),
                    ttl.smb_to_bytes(),
                    offsets[..3].iter().flat_map(|x| x.smb_to_bytes()).collect(),
                    vec![0; SERVICE_SITE_GUID_SIZE],
                ].concat(),
                ReferralBody::NameList { expanded_names, .. } => [
                    header(version, referral.entry_flags | ReferralEntryFlags::NAME_LIST_REFERRAL),
                    ttl.smb_to_bytes(),
                    offsets[0].smb_to_bytes(),
                    (expanded_names.len() as u16).smb_to_bytes(),
                    offsets.get(1).copied().unwrap_or(offsets[0]).smb_to_bytes(),
                ].concat(),
            }
        }
    }
}

impl SMBByteSize for ReferralResponse {
    fn smb_byte_size(&self) -> usize {
        RESPONSE_HEADER_SIZE + self.referrals.iter().map(|referral| {
            fixed_entry_size(referral) + pooled_strings(referral).iter().map(|x| encode_utf16_nul(x).len()).sum::<usize>()
        }).sum::<usize>()
    }
}

/// Sizes, counts and offsets are narrowed to 16 bits. Use [`encode_response`] unless the
/// response is known to fit in `u16::MAX` bytes.
impl SMBToBytes for ReferralResponse {
    fn smb_to_bytes(&self) -> Vec<u8> {
        let header = [
            self.path_consumed.smb_to_bytes(),
            (self.referrals.len() as u16).smb_to_bytes(),
            self.header_flags.smb_to_bytes(),
        ].concat();
        let mut entry_offset = RESPONSE_HEADER_SIZE;
        let mut pool_offset = RESPONSE_HEADER_SIZE + self.referrals.iter().map(fixed_entry_size).sum::<usize>();
        let mut entries = Vec::new();
        let mut pool = Vec::new();
        for referral in &self.referrals {
            entries.extend(encode_entry(referral, entry_offset, pool_offset));
            for value in pooled_strings(referral) {
                let encoded = encode_utf16_nul(value);
                pool_offset += encoded.len();
                pool.extend(encoded);
            }
            entry_offset += fixed_entry_size(referral);
        }
        [header, entries, pool].concat()
    }
}
