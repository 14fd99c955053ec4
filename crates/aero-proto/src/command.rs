use serde::{Deserialize, Serialize};
use std::fmt;

/// One command in the vehicle's ASCII vocabulary. Immutable value; the wire
/// form is the whole identity.
///
/// Linear motion is parameterized in centimeters, rotation in degrees.
/// `EnterSdk` and `StreamOn` are the two setup datagrams sent once at
/// connect time and have no business inside a flight plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verb", rename_all = "snake_case")]
pub enum Command {
    EnterSdk,
    StreamOn,
    Takeoff,
    Land,
    Stop,
    Up { cm: u32 },
    Down { cm: u32 },
    Forward { cm: u32 },
    Back { cm: u32 },
    Left { cm: u32 },
    Right { cm: u32 },
    RotateCw { deg: u32 },
    RotateCcw { deg: u32 },
}

impl Command {
    /// Exact datagram text: bare verb, or "<verb> <integer>".
    pub fn wire(&self) -> String {
        match *self {
            Command::EnterSdk => "command".to_string(),
            Command::StreamOn => "streamon".to_string(),
            Command::Takeoff => "takeoff".to_string(),
            Command::Land => "land".to_string(),
            Command::Stop => "stop".to_string(),
            Command::Up { cm } => format!("up {}", cm),
            Command::Down { cm } => format!("down {}", cm),
            Command::Forward { cm } => format!("forward {}", cm),
            Command::Back { cm } => format!("back {}", cm),
            Command::Left { cm } => format!("left {}", cm),
            Command::Right { cm } => format!("right {}", cm),
            Command::RotateCw { deg } => format!("cw {}", deg),
            Command::RotateCcw { deg } => format!("ccw {}", deg),
        }
    }

    /// The command a revert sends to undo this one. Motion pairs swap
    /// direction keeping their magnitude; anything without a spatial inverse
    /// maps to `Stop` (hold position).
    pub fn inverse(&self) -> Command {
        match *self {
            Command::Up { cm } => Command::Down { cm },
            Command::Down { cm } => Command::Up { cm },
            Command::Forward { cm } => Command::Back { cm },
            Command::Back { cm } => Command::Forward { cm },
            Command::Left { cm } => Command::Right { cm },
            Command::Right { cm } => Command::Left { cm },
            Command::RotateCw { deg } => Command::RotateCcw { deg },
            Command::RotateCcw { deg } => Command::RotateCw { deg },
            _ => Command::Stop,
        }
    }

    /// Connect-time setup verbs, rejected by the plan doctor.
    pub fn is_setup(&self) -> bool {
        matches!(self, Command::EnterSdk | Command::StreamOn)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.wire())
    }
}
