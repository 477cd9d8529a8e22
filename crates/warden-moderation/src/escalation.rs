//! Mapping offense counts to sanctions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Sanction applied for a violation, ordered by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Private notice only.
    Warning,
    /// Temporary communication restriction.
    Timeout,
    /// Removal from the guild; the member may rejoin.
    Kick,
    /// Permanent removal.
    Ban,
}

impl Action {
    /// Stored name of the action.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Warning => "warning",
            Self::Timeout => "timeout",
            Self::Kick => "kick",
            Self::Ban => "ban",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "warning" => Ok(Self::Warning),
            "timeout" => Ok(Self::Timeout),
            "kick" => Ok(Self::Kick),
            "ban" => Ok(Self::Ban),
            other => Err(format!("unknown action '{other}'")),
        }
    }
}

/// Widths of the warning, timeout and kick bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thresholds {
    /// Offenses answered with a warning.
    pub warning: u32,
    /// Offenses answered with a timeout after the warnings.
    pub timeout: u32,
    /// Width of the kick band; the ban starts at `warning + timeout + kick`.
    pub kick: u32,
}

/// Sanction for the `new_count`-th offense.
///
/// `new_count <= w` warns, `new_count <= w + t` times out,
/// `new_count < w + t + k` kicks, anything later bans. With escalation
/// disabled every offense is a warning.
pub fn escalate(new_count: u32, thresholds: Thresholds, escalation_enabled: bool) -> Action {
    if !escalation_enabled {
        return Action::Warning;
    }

    let warn_until = thresholds.warning;
    let timeout_until = warn_until.saturating_add(thresholds.timeout);
    let ban_from = timeout_until.saturating_add(thresholds.kick);

    if new_count <= warn_until {
        Action::Warning
    } else if new_count <= timeout_until {
        Action::Timeout
    } else if new_count < ban_from {
        Action::Kick
    } else {
        Action::Ban
    }
}
