use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The choices a voter can make on a topic.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VoteOption {
    Yes,
    No,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown vote option '{0}'")]
pub struct UnknownVoteOption(pub String);

impl VoteOption {
    /// The Portuguese label for this option, also accepted when parsing.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Yes => "Sim",
            Self::No => "Não",
        }
    }
}

impl Display for VoteOption {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Yes => write!(f, "Yes"),
            Self::No => write!(f, "No"),
        }
    }
}

/// Case-insensitive; accepts either the English name or the Portuguese label.
impl FromStr for VoteOption {
    type Err = UnknownVoteOption;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        [Self::Yes, Self::No]
            .into_iter()
            .find(|option| {
                option.to_string().eq_ignore_ascii_case(trimmed)
                    || option.label().to_lowercase() == trimmed.to_lowercase()
            })
            .ok_or_else(|| UnknownVoteOption(s.to_string()))
    }
}
