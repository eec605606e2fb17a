use num_enum::TryFromPrimitive;
use serde::{Deserialize, Serialize};

use crate::{SMBByteSize, SMBToBytes};

/// Status codes a transport reports back for negotiate, session setup, tree connect and
/// referral requests.
#[repr(u32)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TryFromPrimitive, Copy)]
pub enum NTStatus {
    StatusSuccess = 0x0,
    Pending = 0x00000103,
    SecIContinueNeeded = 0x00090312,
    InvalidParameter = 0xC000000D,
    MoreProcessingRequired = 0xC0000016,
    AccessDenied = 0xC0000022,
    ObjectNameNotFound = 0xC0000034,
    NoSuchUser = 0xC0000064,
    WrongPassword = 0xC000006A,
    LogonFailure = 0xC000006D,
    AccountRestriction = 0xC000006E,
    PasswordExpired = 0xC0000071,
    AccountDisabled = 0xC0000072,
    BadNetworkPath = 0xC00000BE,
    NotSupported = 0xC00000BB,
    NetworkNameDeleted = 0xC00000C9,
    BadNetworkName = 0xC00000CC,
    RequestNotAccepted = 0xC00000D0,
    Cancelled = 0xC0000120,
    LogonTypeNotGranted = 0xC000015B,
    InvalidNetworkResponse = 0xC00000C3,
    FsDriverRequired = 0xC000019C,
    UserSessionDeleted = 0xC0000203,
    ConnectionDisconnected = 0xC000020C,
    ConnectionReset = 0xC000020D,
    NetworkUnreachable = 0xC000023C,
    HostUnreachable = 0xC000023D,
    ConnectionAborted = 0xC0000241,
    PathNotCovered = 0xC0000257,
    NotFound = 0xC0000225,
    NetworkSessionExpired = 0xC000035C,
    UnknownError = 0xFFFFFFFF,
}

impl NTStatus {
    pub fn from_code(code: u32) -> Self {
        Self::try_from_primitive(code).unwrap_or(Self::UnknownError)
    }

    pub fn is_success(&self) -> bool {
        (*self as u32) < 0x80000000
    }

    /// The server understood the request and refused the supplied identity.
    pub fn is_credential_failure(self) -> bool {
        matches!(
            self,
            Self::LogonFailure
                | Self::WrongPassword
                | Self::NoSuchUser
                | Self::AccountDisabled
                | Self::AccountRestriction
                | Self::PasswordExpired
                | Self::AccessDenied
        )
    }
}

impl SMBByteSize for NTStatus {
    fn smb_byte_size(&self) -> usize {
        std::mem::size_of_val(&(*self as u32))
    }
}

impl SMBToBytes for NTStatus {
    fn smb_to_bytes(&self) -> Vec<u8> {
        (*self as u32).smb_to_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_codes_fold_to_unknown_error() {
        assert_eq!(NTStatus::from_code(0xC000006D), NTStatus::LogonFailure);
        assert_eq!(NTStatus::from_code(0x12345678), NTStatus::UnknownError);
    }

    #[test]
    fn severity_split() {
        assert!(NTStatus::StatusSuccess.is_success());
        assert!(NTStatus::SecIContinueNeeded.is_success());
        assert!(!NTStatus::Cancelled.is_success());
    }

    #[test]
    fn status_bytes_are_little_endian() {
        assert_eq!(NTStatus::Cancelled.smb_to_bytes(), [0x20, 0x01, 0x00, 0xC0]);
    }
}
