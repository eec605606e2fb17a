use smb_connect::dfs::codec::{decode_response, encode_request};
use smb_connect::dfs::{Referral, ReferralBody, ReferralEntryFlags, ReferralHeaderFlags, ReferralPaths, ReferralPayload, ReferralResponse, ReferralVersion, ServerType};
use smb_connect::util::utf16::{encode_utf16_nul, utf16_len};
use smb_core::error::SMBError;
use smb_core::SMBToBytes;

mod common;

const REQUEST: &str = "\\corp\\ns\\link\\sub";
const LINK: &str = "\\corp\\ns\\link";

fn paths(target: &str) -> ReferralPaths {
    ReferralPaths { dfs_path: LINK.into(), alt_path: LINK.into(), network_address: target.into() }
}

fn payload(version: ReferralVersion, idx: usize) -> ReferralPayload {
    let target = format!("\\fs{}\\share", idx);
    match version {
        ReferralVersion::V1 => ReferralPayload::V1 { share_name: target },
        ReferralVersion::V2 => ReferralPayload::V2 { proximity: idx as u32, ttl: 300, paths: paths(&target) },
        ReferralVersion::V3 => ReferralPayload::V3 { ttl: 300, body: ReferralBody::Paths(paths(&target)) },
        ReferralVersion::V4 => ReferralPayload::V4 { ttl: 300, body: ReferralBody::Paths(paths(&target)) },
    }
}

fn response(version: ReferralVersion, entries: usize) -> ReferralResponse {
    let consumed = match version {
        ReferralVersion::V1 => LINK.encode_utf16().count() as u16,
        _ => utf16_len(LINK) as u16,
    };
    ReferralResponse {
        path_consumed: consumed,
        header_flags: ReferralHeaderFlags::STORAGE_SERVERS,
        request_path: REQUEST.into(),
        referrals: (0..entries)
            .map(|idx| Referral::new(ServerType::NonRoot, ReferralEntryFlags::empty(), consumed, payload(version, idx), REQUEST))
            .collect(),
    }
}

#[test]
fn every_version_decodes_all_entries() {
    common::init_logging();
    for version in [ReferralVersion::V1, ReferralVersion::V2, ReferralVersion::V3, ReferralVersion::V4] {
        for entries in [1, 3] {
            let decoded = decode_response(&response(version, entries).smb_to_bytes(), REQUEST).unwrap();
            assert_eq!(decoded.referrals.len(), entries, "{:?} with {} entries", version, entries);
            assert!(decoded.referrals.iter().all(|referral| referral.version() == version));
            assert_eq!(decoded.referrals[entries - 1].next_referral(), format!("\\fs{}\\share\\sub", entries - 1));
        }
    }
}

#[test]
fn single_v1_entry_from_the_wire() {
    let bytes = [
        &[0x04, 0x00, 0x01, 0x00, 0x03, 0x00, 0x00, 0x00][..],
        &[0x01, 0x00, 0x0A, 0x00, 0x00, 0x00, 0x00, 0x00],
        &encode_utf16_nul("\\srv\\sh"),
    ].concat();
    let decoded = decode_response(&bytes, "\\srv\\sh").unwrap();
    assert_eq!(decoded.referrals.len(), 1);
    assert_eq!(decoded.referrals[0].server_type, ServerType::NonRoot);
    assert_eq!(decoded.header_flags, ReferralHeaderFlags::REFERRAL_SERVERS | ReferralHeaderFlags::STORAGE_SERVERS);
}

#[test]
fn zero_entries_is_never_an_empty_list() {
    let mut bytes = response(ReferralVersion::V4, 2).smb_to_bytes();
    bytes[2] = 0;
    bytes[3] = 0;
    assert!(matches!(decode_response(&bytes, REQUEST), Err(SMBError::NoReferralsAvailable)));
}

#[test]
fn decoding_twice_gives_the_same_result() {
    let bytes = response(ReferralVersion::V3, 2).smb_to_bytes();
    assert_eq!(decode_response(&bytes, REQUEST).unwrap(), decode_response(&bytes, REQUEST).unwrap());
}

#[test]
fn cutting_the_buffer_short_is_truncation() {
    let bytes = response(ReferralVersion::V2, 2).smb_to_bytes();
    let error = decode_response(&bytes[..bytes.len() - 6], REQUEST).unwrap_err();
    assert!(matches!(error, SMBError::TruncatedReferral(_)), "{:?}", error);
    assert!(error.is_referral_decode_error());
}

#[test]
fn target_set_boundaries_survive_the_wire() {
    let consumed = utf16_len(LINK) as u16;
    let mut original = response(ReferralVersion::V4, 3);
    original.referrals[2] = Referral::new(ServerType::NonRoot, ReferralEntryFlags::TARGET_SET_BOUNDARY, consumed, payload(ReferralVersion::V4, 2), REQUEST);
    let decoded = decode_response(&original.smb_to_bytes(), REQUEST).unwrap();
    assert_eq!(decoded.target_sets().len(), 2);
    assert!(decoded.referrals[2].is_target_set_boundary());
}

#[test]
fn request_round_trips_the_path() {
    let request = encode_request(REQUEST, 4);
    assert_eq!(u16::from_le_bytes([request[0], request[1]]), 4);
    assert_eq!(request.len(), 2 + utf16_len(REQUEST) + 2);
}
