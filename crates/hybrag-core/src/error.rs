//! Typed errors for normalization, fusion, and source orchestration.
//!
//! Every error carries a stable [`ErrorCode`] so callers (and the CLI's JSON
//! output) can branch on the failure class without parsing messages.

use std::fmt;

use crate::candidate::SourceKind;

/// Machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    InvalidTopK,
    UnknownStrategy,
    MalformedCandidates,
    InvalidWeight,
    ZeroWeights,
    InvalidConfig,
    SourceUnavailable,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::InvalidTopK => "E1001",
            Self::UnknownStrategy => "E1002",
            Self::MalformedCandidates => "E1003",
            Self::InvalidWeight => "E1004",
            Self::ZeroWeights => "E2001",
            Self::InvalidConfig => "E2002",
            Self::SourceUnavailable => "E3001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::InvalidTopK => "top_k must be positive",
            Self::UnknownStrategy => "Unknown retrieval strategy",
            Self::MalformedCandidates => "Malformed candidate list",
            Self::InvalidWeight => "Invalid fusion weight",
            Self::ZeroWeights => "All fusion weights are zero",
            Self::InvalidConfig => "Invalid configuration",
            Self::SourceUnavailable => "Candidate source unavailable",
        }
    }

    /// Optional remediation hint surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::InvalidTopK => Some("Pass a result limit of at least 1."),
            Self::UnknownStrategy => Some("Use one of: vector, fulltext, semantic, hybrid."),
            Self::MalformedCandidates => None,
            Self::InvalidWeight => Some("Weights must be finite and >= 0."),
            Self::ZeroWeights => {
                Some("Give at least one of vector/fulltext/semantic a positive weight.")
            }
            Self::InvalidConfig => Some("Fix .hybrag/config.toml and retry."),
            Self::SourceUnavailable => {
                Some("Run `hybrag ingest` to (re)build the indexes, or use a single-source strategy.")
            }
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Errors raised by the fusion core and reported by candidate sources.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FusionError {
    /// A caller passed a value the core cannot work with.
    #[error("invalid argument: {message}")]
    InvalidArgument { code: ErrorCode, message: String },

    /// The active configuration cannot produce a ranking.
    #[error("configuration error: {message}")]
    Configuration { code: ErrorCode, message: String },

    /// A candidate source could not answer (index missing, backend down).
    #[error("{kind} source unavailable: {reason}")]
    SourceUnavailable { kind: SourceKind, reason: String },
}

/// Result alias used throughout `hybrag-core`.
pub type Result<T, E = FusionError> = std::result::Result<T, E>;

impl FusionError {
    #[must_use]
    pub fn invalid_top_k(top_k: usize) -> Self {
        Self::InvalidArgument {
            code: ErrorCode::InvalidTopK,
            message: format!("top_k must be positive, got {top_k}"),
        }
    }

    pub fn unknown_strategy(raw: impl fmt::Display) -> Self {
        Self::InvalidArgument {
            code: ErrorCode::UnknownStrategy,
            message: format!("unknown strategy '{raw}'"),
        }
    }

    pub fn malformed_candidates(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            code: ErrorCode::MalformedCandidates,
            message: message.into(),
        }
    }

    pub fn invalid_weight(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            code: ErrorCode::InvalidWeight,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn zero_weights() -> Self {
        Self::Configuration {
            code: ErrorCode::ZeroWeights,
            message: "vector, fulltext, and semantic weights are all zero".to_string(),
        }
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::Configuration {
            code: ErrorCode::InvalidConfig,
            message: message.into(),
        }
    }

    pub fn source_unavailable(kind: SourceKind, reason: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            kind,
            reason: reason.into(),
        }
    }

    /// The stable code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidArgument { code, .. } | Self::Configuration { code, .. } => *code,
            Self::SourceUnavailable { .. } => ErrorCode::SourceUnavailable,
        }
    }

    #[must_use]
    pub const fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument { .. })
    }

    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }

    #[must_use]
    pub const fn is_source_unavailable(&self) -> bool {
        matches!(self, Self::SourceUnavailable { .. })
    }
}
