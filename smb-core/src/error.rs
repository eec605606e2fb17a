use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io;

use crate::nt_status::NTStatus;

#[derive(Debug)]
pub enum SMBError {
    HostUnreachable(SMBResolutionError),
    LoopbackNotAllowed(SMBResolutionError),
    ProtocolVersionNotSupported(SMBPreconditionFailedError),
    NoSupportedAuthMechanism(SMBPreconditionFailedError),
    AuthenticationFailed(SMBAuthError),
    Canceled,
    Disconnected(SMBIOError),
    IOError(SMBIOError),
    NoReferralsAvailable,
    UnsupportedReferralVersion(u16),
    MalformedReferral(SMBParseError),
    TruncatedReferral(SMBParseError),
    ReferralLoopExceeded(usize),
    NotADfsShare(String),
    PreconditionFailed(SMBPreconditionFailedError),
    ContextBusy,
    ServerError(NTStatus),
}

impl SMBError {
    pub fn host_unreachable<T: Into<SMBResolutionError>>(name: T) -> Self {
        Self::HostUnreachable(name.into())
    }

    pub fn loopback_not_allowed<T: Into<SMBResolutionError>>(name: T) -> Self {
        Self::LoopbackNotAllowed(name.into())
    }

    pub fn version_not_supported<T: Into<SMBPreconditionFailedError>>(error: T) -> Self {
        Self::ProtocolVersionNotSupported(error.into())
    }

    pub fn no_supported_mechanism<T: Into<SMBPreconditionFailedError>>(error: T) -> Self {
        Self::NoSupportedAuthMechanism(error.into())
    }

    pub fn auth_failed<T: Into<SMBAuthError>>(error: T) -> Self {
        Self::AuthenticationFailed(error.into())
    }

    /// Wraps an I/O failure, sorting transient connection loss into `Disconnected`.
    pub fn io_error<T: Into<SMBIOError>>(error: T) -> Self {
        let error = error.into();
        if error.is_disconnect() {
            Self::Disconnected(error)
        } else {
            Self::IOError(error)
        }
    }

    pub fn disconnected<T: Into<SMBIOError>>(error: T) -> Self {
        Self::Disconnected(error.into())
    }

    pub fn malformed_referral<T: Into<SMBParseError>>(error: T) -> Self {
        Self::MalformedReferral(error.into())
    }

    pub fn truncated_referral<T: Into<SMBParseError>>(error: T) -> Self {
        Self::TruncatedReferral(error.into())
    }

    pub fn not_a_dfs_share<T: Into<String>>(path: T) -> Self {
        Self::NotADfsShare(path.into())
    }

    pub fn precondition_failed<T: Into<SMBPreconditionFailedError>>(error: T) -> Self {
        Self::PreconditionFailed(error.into())
    }

    pub fn is_disconnect(&self) -> bool {
        matches!(self, Self::Disconnected(_))
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled)
    }

    pub fn is_credential_failure(&self) -> bool {
        matches!(self, Self::AuthenticationFailed(x) if x.status().is_some_and(NTStatus::is_credential_failure))
    }

    pub fn is_referral_decode_error(&self) -> bool {
        matches!(
            self,
            Self::NoReferralsAvailable
                | Self::UnsupportedReferralVersion(_)
                | Self::MalformedReferral(_)
                | Self::TruncatedReferral(_)
        )
    }
}

impl From<NTStatus> for SMBError {
    fn from(status: NTStatus) -> Self {
        match status {
            NTStatus::Cancelled => Self::Canceled,
            NTStatus::LogonFailure
            | NTStatus::AccessDenied
            | NTStatus::WrongPassword
            | NTStatus::AccountDisabled
            | NTStatus::AccountRestriction
            | NTStatus::PasswordExpired
            | NTStatus::NoSuchUser => Self::AuthenticationFailed(status.into()),
            NTStatus::NotSupported | NTStatus::LogonTypeNotGranted => {
                Self::NoSupportedAuthMechanism(format!("server rejected mechanism: {:?}", status).into())
            }
            NTStatus::ConnectionReset
            | NTStatus::ConnectionDisconnected
            | NTStatus::ConnectionAborted
            | NTStatus::NetworkNameDeleted
            | NTStatus::UserSessionDeleted
            | NTStatus::NetworkSessionExpired => {
                Self::Disconnected(io::Error::new(io::ErrorKind::ConnectionReset, format!("{:?}", status)).into())
            }
            NTStatus::HostUnreachable | NTStatus::NetworkUnreachable | NTStatus::BadNetworkPath => {
                Self::HostUnreachable(format!("{:?}", status).into())
            }
            // Referral requests for paths a server holds itself end in one of these.
            NTStatus::FsDriverRequired | NTStatus::PathNotCovered | NTStatus::NotFound => Self::NotADfsShare(format!("{:?}", status)),
            NTStatus::InvalidNetworkResponse => Self::MalformedReferral(format!("{:?}", status).into()),
            _ => Self::ServerError(status),
        }
    }
}

#[derive(Debug)]
pub struct SMBResolutionError {
    name: String,
}

impl SMBResolutionError {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<T: Into<String>> From<T> for SMBResolutionError {
    fn from(value: T) -> Self {
        Self {
            name: value.into()
        }
    }
}

impl Display for SMBResolutionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[derive(Debug)]
pub struct SMBParseError {
    message: String,
}

impl<T: Into<String>> From<T> for SMBParseError {
    fn from(value: T) -> Self {
        Self {
            message: value.into()
        }
    }
}

impl Display for SMBParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

#[derive(Debug)]
pub struct SMBPreconditionFailedError {
    message: String,
}

impl<T: Into<String>> From<T> for SMBPreconditionFailedError {
    fn from(value: T) -> Self {
        Self {
            message: value.into()
        }
    }
}

impl Display for SMBPreconditionFailedError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

#[derive(Debug)]
pub struct SMBAuthError {
    message: String,
    status: Option<NTStatus>,
}

impl SMBAuthError {
    pub fn status(&self) -> Option<NTStatus> {
        self.status
    }
}

impl From<NTStatus> for SMBAuthError {
    fn from(value: NTStatus) -> Self {
        Self {
            message: format!("server returned {:?}", value),
            status: Some(value),
        }
    }
}

impl From<&str> for SMBAuthError {
    fn from(value: &str) -> Self {
        Self {
            message: value.into(),
            status: None,
        }
    }
}

impl From<String> for SMBAuthError {
    fn from(value: String) -> Self {
        Self {
            message: value,
            status: None,
        }
    }
}

impl Display for SMBAuthError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

#[derive(Debug)]
pub struct SMBIOError {
    error: io::Error,
}

impl SMBIOError {
    pub fn kind(&self) -> io::ErrorKind {
        self.error.kind()
    }

    pub fn is_disconnect(&self) -> bool {
        matches!(
            self.error.kind(),
            io::ErrorKind::ConnectionReset
                | io::ErrorKind::ConnectionAborted
                | io::ErrorKind::BrokenPipe
                | io::ErrorKind::NotConnected
                | io::ErrorKind::NetworkUnreachable
                | io::ErrorKind::HostUnreachable
                | io::ErrorKind::NetworkDown
        )
    }
}

impl<T: Into<io::Error>> From<T> for SMBIOError {
    fn from(value: T) -> Self {
        Self {
            error: value.into()
        }
    }
}

impl Display for SMBIOError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl Display for SMBError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HostUnreachable(x) => write!(f, "Host unreachable: {}", x),
            Self::LoopbackNotAllowed(x) => write!(f, "Host {} only resolved to a loopback address", x),
            Self::ProtocolVersionNotSupported(x) => write!(f, "Protocol version not supported: {}", x),
            Self::NoSupportedAuthMechanism(x) => write!(f, "No supported authentication mechanism: {}", x),
            Self::AuthenticationFailed(x) => write!(f, "Authentication failed: {}", x),
            Self::Canceled => write!(f, "Operation canceled"),
            Self::Disconnected(x) => write!(f, "Connection lost: {}", x),
            Self::IOError(x) => write!(f, "SMB I/O operation failed with error: {}", x),
            Self::NoReferralsAvailable => write!(f, "Referral response contained no referrals"),
            Self::UnsupportedReferralVersion(x) => write!(f, "Unsupported referral version {}", x),
            Self::MalformedReferral(x) => write!(f, "Malformed referral: {}", x),
            Self::TruncatedReferral(x) => write!(f, "Truncated referral: {}", x),
            Self::ReferralLoopExceeded(x) => write!(f, "Referral chain exceeded {} hops", x),
            Self::NotADfsShare(x) => write!(f, "{} is not a DFS share", x),
            Self::PreconditionFailed(x) => write!(f, "Operation failed with unmet precondition: {}", x),
            Self::ContextBusy => write!(f, "Connection context is in use by another operation"),
            Self::ServerError(x) => write!(f, "Server returned status {:?}", x),
        }
    }
}

impl Error for SMBError {}
