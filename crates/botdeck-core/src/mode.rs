//! Bot operating mode.

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Operating state reported by the bot.
///
/// `Live` is the only mode in which orders touch real capital, and therefore
/// the only mode that escalates guarded commands to typed-phrase confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BotMode {
    Live,
    DryRun,
    Paused,
    #[default]
    Stopped,
}

impl BotMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::DryRun => "dry_run",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
        }
    }

    /// Whether guarded commands need a typed confirmation phrase.
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Live)
    }
}

impl fmt::Display for BotMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BotMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "live" => Ok(Self::Live),
            "dry_run" => Ok(Self::DryRun),
            "paused" => Ok(Self::Paused),
            "stopped" => Ok(Self::Stopped),
            other => Err(CoreError::UnknownMode(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_live_is_live() {
        assert!(BotMode::Live.is_live());
        assert!(!BotMode::DryRun.is_live());
        assert!(!BotMode::Paused.is_live());
        assert!(!BotMode::Stopped.is_live());
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&BotMode::DryRun).unwrap();
        assert_eq!(json, "\"dry_run\"");
        let mode: BotMode = serde_json::from_str("\"live\"").unwrap();
        assert_eq!(mode, BotMode::Live);
        assert_eq!("paused".parse::<BotMode>().unwrap(), BotMode::Paused);
        assert!("LIVE".parse::<BotMode>().is_err());
    }
}
