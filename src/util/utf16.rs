use nom::bytes::complete::tag;
use nom::IResult;
use nom::multi::many_till;
use nom::number::complete::le_u16;

use smb_core::error::SMBError;
use smb_core::SMBResult;

const NULL_TERMINATOR: [u8; 2] = [0, 0];

/// Little-endian UTF-16 without a terminator.
pub fn encode_utf16(value: &str) -> Vec<u8> {
    value.encode_utf16().flat_map(u16::to_le_bytes).collect()
}

pub fn encode_utf16_nul(value: &str) -> Vec<u8> {
    [encode_utf16(value), NULL_TERMINATOR.to_vec()].concat()
}

/// Byte length of `value` once UTF-16 encoded, terminator excluded.
pub fn utf16_len(value: &str) -> usize {
    value.encode_utf16().count() * 2
}

pub fn parse_utf16_nul(input: &[u8]) -> IResult<&[u8], Vec<u16>> {
    let (remaining, (units, _)) = many_till(le_u16, tag(&NULL_TERMINATOR[..]))(input)?;
    Ok((remaining, units))
}

/// Reads a null-terminated string starting at `offset` in `buffer`.
pub fn read_utf16_nul_at(buffer: &[u8], offset: usize) -> SMBResult<String> {
    let slice = buffer.get(offset..).filter(|s| !s.is_empty())
        .ok_or_else(|| SMBError::truncated_referral(format!("string offset {} past end of {} byte buffer", offset, buffer.len())))?;
    let (_, units) = parse_utf16_nul(slice)
        .map_err(|_| SMBError::truncated_referral(format!("unterminated string at offset {}", offset)))?;
    String::from_utf16(&units)
        .map_err(|_| SMBError::malformed_referral(format!("invalid UTF-16 string at offset {}", offset)))
}

/// Drops the first `consumed_bytes` bytes' worth of UTF-16 units from `path`, clamping to the whole
/// path when the count runs past its end.
pub fn unconsumed_tail(path: &str, consumed_bytes: usize) -> String {
    let units = path.encode_utf16().collect::<Vec<u16>>();
    let consumed = (consumed_bytes / 2).min(units.len());
    String::from_utf16_lossy(&units[consumed..])
}
