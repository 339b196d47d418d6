//! Progress-callback trait for submission stage events.
//!
//! Inject an [`Arc<dyn SubmissionProgressCallback>`] via
//! [`crate::config::GatePassConfigBuilder::progress_callback`] to be told when
//! each stage of a submission starts and finishes. The CLI uses it to drive a
//! spinner; a web front-end could forward the events to the browser.
//!
//! # Example
//!
//! ```rust
//! use gatepass::{GatePassConfig, Stage, SubmissionProgressCallback};
//! use std::sync::{Arc, Mutex};
//!
//! struct StageLog(Mutex<Vec<Stage>>);
//!
//! impl SubmissionProgressCallback for StageLog {
//!     fn on_stage_complete(&self, stage: Stage) {
//!         self.0.lock().unwrap().push(stage);
//!     }
//! }
//!
//! let log = Arc::new(StageLog(Mutex::new(Vec::new())));
//! let config = GatePassConfig::builder()
//!     .progress_callback(log as Arc<dyn SubmissionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::error::Rejection;
use std::fmt;
use std::sync::Arc;

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Required fields and upload media types.
    Collect,
    /// Size, background and legibility checks.
    Validate,
    /// QR code and gate pass PDF.
    Generate,
    /// Blob and record writes.
    Persist,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Collect => "collecting input",
            Stage::Validate => "validating uploads",
            Stage::Generate => "generating gate pass",
            Stage::Persist => "saving",
        };
        f.write_str(s)
    }
}

/// Called by the pipeline as a submission moves through its stages.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait SubmissionProgressCallback: Send + Sync {
    fn on_stage_start(&self, stage: Stage) {
        let _ = stage;
    }

    fn on_stage_complete(&self, stage: Stage) {
        let _ = stage;
    }

    /// The submission was rejected; no later stage will run.
    fn on_rejected(&self, rejection: &Rejection) {
        let _ = rejection;
    }

    /// Everything was stored for `reg_no`.
    fn on_issued(&self, reg_no: &str) {
        let _ = reg_no;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl SubmissionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::GatePassConfig`].
pub type ProgressCallback = Arc<dyn SubmissionProgressCallback>;
