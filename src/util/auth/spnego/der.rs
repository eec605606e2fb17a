use nom::bytes::complete::take;
use nom::combinator::map;
use nom::Err::Error;
use nom::error::ErrorKind;
use nom::IResult;
use nom::number::complete::le_u8;

pub const APPLICATION_TAG: u8 = 0x60;
pub const NEG_TOKEN_INIT_TAG: u8 = 0xA0;
pub const MECH_TYPE_LIST_TAG: u8 = 0xA0;

pub const DER_ENCODING_SEQUENCE_TAG: u8 = 0x30;
pub const DER_ENCODING_OID_TAG: u8 = 0x06;

pub const SPNEGO_ID: [u8; 6] = [0x2b, 0x06, 0x01, 0x05, 0x05, 0x02];

pub fn parse_length(buffer: &[u8]) -> IResult<&[u8], usize> {
    let (remaining, len) = le_u8(buffer)?;
    if len < 0x80 { return Ok((remaining, len as usize)); }
    let field_size = (len & 0x7f) as usize;
    if field_size > std::mem::size_of::<usize>() {
        return Err(Error(nom::error::Error::new(buffer, ErrorKind::TooLarge)));
    }
    let (remaining, bytes) = take::<_, _, nom::error::Error<&[u8]>>(field_size)(remaining)?;
    let len = bytes.iter().try_fold(0_usize, |len, item| len.checked_mul(256)?.checked_add(*item as usize))
        .ok_or(Error(nom::error::Error::new(buffer, ErrorKind::TooLarge)))?;
    Ok((remaining, len))
}

pub fn parse_field_with_len(buffer: &[u8]) -> IResult<&[u8], &[u8]> {
    parse_length(buffer).and_then(|(remaining, len)| take(len)(remaining))
}

/// Reads `tag`, its length and returns the contents.
pub fn parse_tagged(buffer: &[u8], tag: u8) -> IResult<&[u8], &[u8]> {
    let (remaining, b_tag) = le_u8(buffer)?;
    if tag != b_tag { return Err(Error(nom::error::Error::new(buffer, ErrorKind::Tag))); }
    parse_field_with_len(remaining)
}

pub fn parse_der_oid(buffer: &[u8]) -> IResult<&[u8], Vec<u8>> {
    map(|buf| parse_tagged(buf, DER_ENCODING_OID_TAG), |oid: &[u8]| oid.to_vec())(buffer)
}

pub fn get_length(length: usize) -> Vec<u8> {
    if length < 0x80 {
        return vec![length as u8];
    }
    let mut len = length;
    let mut len_bytes = Vec::new();
    while len > 0 {
        len_bytes.push((len % 256) as u8);
        len /= 256;
    }
    len_bytes.reverse();
    [&[(0x80 | len_bytes.len()) as u8][0..], &*len_bytes].concat()
}

pub fn encode_tagged(tag: u8, contents: &[u8]) -> Vec<u8> {
    [&[tag][0..], &*get_length(contents.len()), contents].concat()
}
