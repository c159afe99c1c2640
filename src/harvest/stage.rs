//! Per-source run stages
//!
//! Each source moves through these stages sequentially within a run;
//! any stage can fail, which the orchestrator converts to a skip.

use std::fmt;

/// Stage of one source's pipeline within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceStage {
    /// Not started yet
    Pending,

    /// Adapter crawl in progress
    Fetching,

    /// Duplicate filtering against the lookback window
    Filtering,

    /// Persisting surviving deals
    Saving,

    /// Enforcing the retention ceiling
    Trimming,

    /// Finished cleanly
    Done,
}

impl SourceStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Fetching => "fetching",
            Self::Filtering => "filtering",
            Self::Saving => "saving",
            Self::Trimming => "trimming",
            Self::Done => "done",
        }
    }

    /// Moves to the next stage, tracing the transition
    pub fn advance(self, source: &str, next: SourceStage) -> SourceStage {
        tracing::debug!("{}: {} -> {}", source, self.as_str(), next.as_str());
        next
    }
}

impl fmt::Display for SourceStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
