//! Cooperative cancellation for long-running transforms
//!
//! Page-by-page copy loops call [`CancelToken::checkpoint`] so a caller can
//! abort a merge or split over many large documents.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::PdfToolsError;

#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelToken {
    /// A token that only fires when [`cancel`](Self::cancel) is called
    pub fn new() -> Self {
        Self::default()
    }

    /// A token that also fires once `timeout` has elapsed from now
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: Instant::now().checked_add(timeout),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        if self.cancelled.load(Ordering::Relaxed) {
            return true;
        }
        matches!(self.deadline, Some(deadline) if Instant::now() >= deadline)
    }

    /// Fail with [`PdfToolsError::Cancelled`] if the token has fired
    pub fn checkpoint(&self) -> Result<(), PdfToolsError> {
        if self.is_cancelled() {
            Err(PdfToolsError::Cancelled)
        } else {
            Ok(())
        }
    }
}
