//! Failure classification and recovery choice.

use super::ErrorInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Signed link or local handle no longer valid; resolving again fixes it.
    ExpiredReference,
    /// The player or network refused the source; retrying will not help.
    SecurityBlock,
    /// Backend or network hiccup; safe to retry.
    BackendFetchFailure,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// Re-enter `Retrying -> Resolving`.
    Reresolve,
    /// Suggest a full environment reset.
    ReloadPage,
}

const SAFETY_CHECK_MARKERS: &[&str] = &["url safety check"];
const EXPIRED_MARKERS: &[&str] = &[
    "blob",
    "expired",
    "403 forbidden",
    "http 403",
    "invalidjwt",
    "invalid signature",
];
const SECURITY_MARKERS: &[&str] = &["security", "blocked", "cors", "mixed content"];
const BACKEND_MARKERS: &[&str] = &[
    "could not be loaded from database",
    "failed to fetch",
    "storage request failed",
    "storage returned http 5",
    "timed out",
    "network",
    "connection",
];

impl ErrorCategory {
    pub fn classify(info: &ErrorInfo) -> Self {
        let mut hay = info.message.to_lowercase();
        if let Some(d) = &info.detail {
            hay.push('\n');
            hay.push_str(&d.to_lowercase());
        }
        let has = |markers: &[&str]| markers.iter().any(|m| hay.contains(m));

        if has(SAFETY_CHECK_MARKERS) {
            ErrorCategory::SecurityBlock
        } else if has(EXPIRED_MARKERS) {
            ErrorCategory::ExpiredReference
        } else if has(SECURITY_MARKERS) {
            ErrorCategory::SecurityBlock
        } else if has(BACKEND_MARKERS) {
            ErrorCategory::BackendFetchFailure
        } else {
            ErrorCategory::Unknown
        }
    }

    pub fn recovery(self) -> Recovery {
        match self {
            ErrorCategory::SecurityBlock => Recovery::ReloadPage,
            _ => Recovery::Reresolve,
        }
    }

    /// Whether the session may retry on its own (still capped per session).
    pub fn auto_retryable(self) -> bool {
        matches!(
            self,
            ErrorCategory::ExpiredReference | ErrorCategory::BackendFetchFailure
        )
    }

    pub fn guidance(self) -> &'static str {
        match self {
            ErrorCategory::ExpiredReference => {
                "The video link may have expired. Try again to fetch a fresh URL."
            }
            ErrorCategory::SecurityBlock => {
                "The player is refusing this source for security reasons. Reload everything, or try a different player."
            }
            ErrorCategory::BackendFetchFailure => {
                "Video data could not be retrieved. This is usually temporary; try again in a moment."
            }
            ErrorCategory::Unknown => "Something went wrong while loading the video.",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ErrorCategory::ExpiredReference => "expired link",
            ErrorCategory::SecurityBlock => "blocked",
            ErrorCategory::BackendFetchFailure => "backend",
            ErrorCategory::Unknown => "unknown",
        }
    }
}
