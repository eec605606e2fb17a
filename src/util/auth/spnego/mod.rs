//! Reads the mechanism list out of the SPNEGO token a server hands back in its negotiate response.

use nom::IResult;
use nom::multi::many0;
use nom::number::complete::le_u8;
use serde::{Deserialize, Serialize};

use smb_core::error::SMBError;
use smb_core::SMBResult;

use crate::util::auth::spnego::der::{APPLICATION_TAG, DER_ENCODING_OID_TAG, DER_ENCODING_SEQUENCE_TAG, encode_tagged, MECH_TYPE_LIST_TAG, NEG_TOKEN_INIT_TAG, parse_der_oid, parse_field_with_len, parse_tagged, SPNEGO_ID};

pub mod der;

const KERBEROS_OID: [u8; 9] = [0x2a, 0x86, 0x48, 0x86, 0xf7, 0x12, 0x01, 0x02, 0x02];
const MS_KERBEROS_OID: [u8; 9] = [0x2a, 0x86, 0x48, 0x82, 0xf7, 0x12, 0x01, 0x02, 0x02];
const NTLM_OID: [u8; 10] = [0x2b, 0x06, 0x01, 0x04, 0x01, 0x82, 0x37, 0x02, 0x02, 0x0a];
const IAKERB_OID: [u8; 6] = [0x2b, 0x06, 0x01, 0x05, 0x02, 0x05];

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MechanismOid {
    Kerberos,
    MSKerberos,
    NTLM,
    IAKerb,
    Unknown(Vec<u8>),
}

impl MechanismOid {
    pub fn from_der(oid: &[u8]) -> Self {
        match oid {
            x if x == KERBEROS_OID => Self::Kerberos,
            x if x == MS_KERBEROS_OID => Self::MSKerberos,
            x if x == NTLM_OID => Self::NTLM,
            x if x == IAKERB_OID => Self::IAKerb,
            x => Self::Unknown(x.to_vec()),
        }
    }

    pub fn der_bytes(&self) -> Vec<u8> {
        match self {
            Self::Kerberos => KERBEROS_OID.to_vec(),
            Self::MSKerberos => MS_KERBEROS_OID.to_vec(),
            Self::NTLM => NTLM_OID.to_vec(),
            Self::IAKerb => IAKERB_OID.to_vec(),
            Self::Unknown(x) => x.clone(),
        }
    }

    pub fn is_kerberos(&self) -> bool {
        matches!(self, Self::Kerberos | Self::MSKerberos | Self::IAKerb)
    }
}

/// Mechanisms a server offered, in the server's preference order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MechanismSet {
    mechanisms: Vec<MechanismOid>,
    synthesized: bool,
}

impl MechanismSet {
    pub fn new(mechanisms: Vec<MechanismOid>) -> Self {
        Self { mechanisms, synthesized: false }
    }

    /// What an extended-security server with an empty security blob gets: raw NTLM.
    pub fn default_ntlm() -> Self {
        Self { mechanisms: vec![MechanismOid::NTLM], synthesized: true }
    }

    pub fn parse(token: &[u8]) -> SMBResult<Self> {
        let (_, mechanisms) = parse_neg_token_init(token)
            .map_err(|e| SMBError::precondition_failed(format!("unreadable mechanism list: {:?}", e)))?;
        Ok(Self::new(mechanisms))
    }

    pub fn mechanisms(&self) -> &[MechanismOid] {
        &self.mechanisms
    }

    pub fn supports_kerberos(&self) -> bool {
        self.mechanisms.iter().any(MechanismOid::is_kerberos)
    }

    pub fn supports_ntlm(&self) -> bool {
        self.mechanisms.contains(&MechanismOid::NTLM)
    }

    pub fn is_synthesized(&self) -> bool {
        self.synthesized
    }

    /// GSS-wrapped NegTokenInit carrying just the mechanism list.
    pub fn to_neg_token_init(&self) -> Vec<u8> {
        let oids = self.mechanisms.iter()
            .flat_map(|mech| encode_tagged(DER_ENCODING_OID_TAG, &mech.der_bytes()))
            .collect::<Vec<u8>>();
        let mech_list = encode_tagged(MECH_TYPE_LIST_TAG, &encode_tagged(DER_ENCODING_SEQUENCE_TAG, &oids));
        let init = encode_tagged(NEG_TOKEN_INIT_TAG, &encode_tagged(DER_ENCODING_SEQUENCE_TAG, &mech_list));
        let body = [encode_tagged(DER_ENCODING_OID_TAG, &SPNEGO_ID), init].concat();
        encode_tagged(APPLICATION_TAG, &body)
    }
}

fn parse_neg_token_init(bytes: &[u8]) -> IResult<&[u8], Vec<MechanismOid>> {
    let (remaining, body) = parse_tagged(bytes, APPLICATION_TAG)?;
    let (body, oid) = parse_der_oid(body)?;
    if oid != SPNEGO_ID {
        return Err(nom::Err::Error(nom::error::Error::new(body, nom::error::ErrorKind::Verify)));
    }
    let (_, init) = parse_tagged(body, NEG_TOKEN_INIT_TAG)?;
    let (_, mut sequence) = parse_tagged(init, DER_ENCODING_SEQUENCE_TAG)?;
    let mut mechanisms = Vec::new();
    while !sequence.is_empty() {
        let (rest, tag) = le_u8(sequence)?;
        let (rest, field) = parse_field_with_len(rest)?;
        sequence = rest;
        // negHints, reqFlags and the MIC are of no use when picking a mechanism.
        if tag == MECH_TYPE_LIST_TAG {
            let (_, list) = parse_tagged(field, DER_ENCODING_SEQUENCE_TAG)?;
            let (_, oids) = many0(parse_der_oid)(list)?;
            mechanisms = oids.iter().map(|oid| MechanismOid::from_der(oid)).collect();
        }
    }
    Ok((remaining, mechanisms))
}
