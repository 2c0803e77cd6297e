//! Retrieval strategy selection.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::candidate::SourceKind;
use crate::error::FusionError;

/// Which signals a retrieval call uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Vector,
    Fulltext,
    Semantic,
    /// Weighted fusion of all three.
    #[default]
    Hybrid,
}

impl Strategy {
    pub const ALL: [Self; 4] = [Self::Vector, Self::Fulltext, Self::Semantic, Self::Hybrid];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Vector => "vector",
            Self::Fulltext => "fulltext",
            Self::Semantic => "semantic",
            Self::Hybrid => "hybrid",
        }
    }

    /// The single source this strategy reads, or `None` for hybrid.
    #[must_use]
    pub const fn single_source(self) -> Option<SourceKind> {
        match self {
            Self::Vector => Some(SourceKind::Vector),
            Self::Fulltext => Some(SourceKind::Fulltext),
            Self::Semantic => Some(SourceKind::Semantic),
            Self::Hybrid => None,
        }
    }

    /// Sources that must be queried.
    #[must_use]
    pub fn sources(self) -> Vec<SourceKind> {
        self.single_source()
            .map_or_else(|| SourceKind::ALL.to_vec(), |kind| vec![kind])
    }
}

impl From<SourceKind> for Strategy {
    fn from(kind: SourceKind) -> Self {
        match kind {
            SourceKind::Vector => Self::Vector,
            SourceKind::Fulltext => Self::Fulltext,
            SourceKind::Semantic => Self::Semantic,
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = FusionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "vector" => Ok(Self::Vector),
            "fulltext" | "keyword" => Ok(Self::Fulltext),
            "semantic" => Ok(Self::Semantic),
            "hybrid" => Ok(Self::Hybrid),
            _ => Err(FusionError::unknown_strategy(s)),
        }
    }
}
