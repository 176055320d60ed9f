use std::path::PathBuf;
use std::time::{Duration, Instant};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FxError {
    #[error("unsupported file type: {mime}")]
    UnsupportedMediaType { mime: String },

    #[error("{capability} unavailable: {detail}")]
    CapabilityMissing {
        capability: &'static str,
        detail: String,
    },

    #[error("could not decode {}: {detail}", path.display())]
    DecodeFailure { path: PathBuf, detail: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FxError {
    pub fn capability(capability: &'static str, detail: impl Into<String>) -> Self {
        Self::CapabilityMissing {
            capability,
            detail: detail.into(),
        }
    }

    pub fn decode(path: impl Into<PathBuf>, detail: impl Into<String>) -> Self {
        Self::DecodeFailure {
            path: path.into(),
            detail: detail.into(),
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Self::UnsupportedMediaType { .. } => Severity::Warn,
            Self::CapabilityMissing { .. } => Severity::Warn,
            Self::DecodeFailure { .. } | Self::Io(_) => Severity::Error,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone)]
pub struct Notice {
    pub severity: Severity,
    pub text: String,
    pub at: Instant,
}

const NOTICE_TTL: Duration = Duration::from_secs(6);

/// The most recent user-facing notice. Only one is shown at a time, newest wins.
#[derive(Debug, Default)]
pub struct NoticeBoard {
    current: Option<Notice>,
}

impl NoticeBoard {
    pub fn post(&mut self, severity: Severity, text: impl Into<String>) {
        let text = text.into();
        match severity {
            Severity::Info => tracing::info!(notice = %text),
            Severity::Warn => tracing::warn!(notice = %text),
            Severity::Error => tracing::error!(notice = %text),
        }
        self.current = Some(Notice {
            severity,
            text,
            at: Instant::now(),
        });
    }

    pub fn post_error(&mut self, err: &FxError) {
        self.post(err.severity(), err.to_string());
    }

    pub fn current(&self, now: Instant) -> Option<&Notice> {
        self.current
            .as_ref()
            .filter(|n| now.saturating_duration_since(n.at) < NOTICE_TTL)
    }
}
