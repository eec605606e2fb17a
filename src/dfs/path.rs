use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use smb_core::error::SMBError;
use smb_core::SMBResult;

/// `\server\share\rest`, parsed from either separator style.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DfsPath {
    pub server: String,
    pub share: Option<String>,
    pub rest: Vec<String>,
}

impl DfsPath {
    pub fn parse(path: &str) -> SMBResult<Self> {
        let normalized = path.replace('/', "\\");
        let mut components = normalized.split('\\').filter(|component| !component.is_empty());
        let server = components.next()
            .ok_or_else(|| SMBError::precondition_failed(format!("path {:?} names no server", path)))?
            .to_string();
        let share = components.next().map(str::to_string);
        let rest = components.map(str::to_string).collect();
        Ok(Self { server, share, rest })
    }

    pub fn new<S: Into<String>, T: Into<String>>(server: S, share: T) -> Self {
        Self { server: server.into(), share: Some(share.into()), rest: Vec::new() }
    }

    pub fn same_server(&self, other: &str) -> bool {
        self.server.eq_ignore_ascii_case(other)
    }

    /// The remaining path below the share, with a leading separator, or empty.
    pub fn rest_path(&self) -> String {
        self.rest.iter().map(|component| format!("\\{}", component)).collect()
    }
}

impl Display for DfsPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "\\{}", self.server)?;
        if let Some(share) = &self.share {
            write!(f, "\\{}", share)?;
        }
        write!(f, "{}", self.rest_path())
    }
}
