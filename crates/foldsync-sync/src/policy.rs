//! Timestamp comparison for files present on both sides
//!
//! Filesystem timestamp granularity and clock skew between hosts make exact
//! equality useless, so differences within the threshold count as "in sync".
//! A remote that is strictly newer is reported but never acted on here; the
//! folder-level passes and the full-listing loop own downloads.

/// Default skew tolerance in milliseconds
pub const DEFAULT_CONFLICT_THRESHOLD_MS: i64 = 2000;

/// Outcome of comparing a local and a remote modification time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileDecision {
    /// Local copy is newer beyond the threshold; replace remote content
    UploadLocal,
    /// Remote copy is newer beyond the threshold; leave both alone
    RemoteNewer,
    /// Within the threshold
    InSync,
}

/// Threshold-based last-writer-wins comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimestampPolicy {
    threshold_ms: i64,
}

impl Default for TimestampPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_CONFLICT_THRESHOLD_MS)
    }
}

impl TimestampPolicy {
    /// Creates a policy; negative thresholds are treated as zero
    pub fn new(threshold_ms: i64) -> Self {
        Self {
            threshold_ms: threshold_ms.max(0),
        }
    }

    /// The configured threshold in milliseconds
    pub fn threshold_ms(&self) -> i64 {
        self.threshold_ms
    }

    /// Compares epoch-millisecond modification times
    pub fn evaluate(&self, local_ms: i64, remote_ms: i64) -> FileDecision {
        let delta = local_ms.saturating_sub(remote_ms);
        if delta > self.threshold_ms {
            FileDecision::UploadLocal
        } else if delta < -self.threshold_ms {
            FileDecision::RemoteNewer
        } else {
            FileDecision::InSync
        }
    }
}
