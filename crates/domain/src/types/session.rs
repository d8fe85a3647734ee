//! Session-related domain types
//!
//! Phase, mode and time-of-day of a running game. All three decode unknown
//! backend values to `Unknown` so a newer server never breaks an older client.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Phase of the current turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GamePhase {
    /// Game created, no turn played yet
    #[default]
    Setup,
    MorningDialogue,
    EveningDialogue,
    Action,
    Resolution,
    /// Unknown phase (for forward compatibility)
    #[serde(other)]
    Unknown,
}

impl GamePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            GamePhase::Setup => "setup",
            GamePhase::MorningDialogue => "morning_dialogue",
            GamePhase::EveningDialogue => "evening_dialogue",
            GamePhase::Action => "action",
            GamePhase::Resolution => "resolution",
            GamePhase::Unknown => "unknown",
        }
    }

    /// Dialogue phases are when NPCs talk among themselves.
    pub fn is_dialogue(&self) -> bool {
        matches!(self, GamePhase::MorningDialogue | GamePhase::EveningDialogue)
    }
}

impl fmt::Display for GamePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether the director watches from backstage or plays a character in the scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameMode {
    #[default]
    Backstage,
    InScene,
    #[serde(other)]
    Unknown,
}

impl fmt::Display for GameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameMode::Backstage => write!(f, "backstage"),
            GameMode::InScene => write!(f, "in_scene"),
            GameMode::Unknown => write!(f, "unknown"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeOfDay {
    #[default]
    Morning,
    Afternoon,
    Evening,
    Night,
    #[serde(other)]
    Unknown,
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeOfDay::Morning => write!(f, "morning"),
            TimeOfDay::Afternoon => write!(f, "afternoon"),
            TimeOfDay::Evening => write!(f, "evening"),
            TimeOfDay::Night => write!(f, "night"),
            TimeOfDay::Unknown => write!(f, "unknown"),
        }
    }
}
