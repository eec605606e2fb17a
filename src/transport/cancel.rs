use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use smb_core::error::SMBError;
use smb_core::SMBResult;

/// Cooperative cancellation flag. Blocking collaborator calls poll it; a child token also
/// observes every ancestor.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    parent: Option<Box<CancelToken>>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn child(&self) -> Self {
        Self { flag: Arc::new(AtomicBool::new(false)), parent: Some(Box::new(self.clone())) }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Clears this token's own flag. Ancestors are left alone.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }

    pub fn is_canceled(&self) -> bool {
        self.flag.load(Ordering::SeqCst) || self.parent.as_ref().is_some_and(|parent| parent.is_canceled())
    }

    pub fn check(&self) -> SMBResult<()> {
        if self.is_canceled() {
            return Err(SMBError::Canceled);
        }
        Ok(())
    }
}
