use serde::{Deserialize, Serialize};

// See the real-time status report section of
// https://github.com/gnea/grbl/blob/master/doc/markdown/interface.md
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MachineState {
    Idle,
    Run,
    Hold,
    Jog,
    Alarm,
    Door,
    Check,
    Home,
    Sleep,
    /// A state word this client does not recognize. The report is still
    /// usable; the position is valid.
    Unknown,
}

/// Which coordinate frame a status report's position is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionFrame {
    Machine,
    Work,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const fn letter(self) -> char {
        match self {
            Axis::X => 'X',
            Axis::Y => 'Y',
            Axis::Z => 'Z',
        }
    }
}

/// A position triple in millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    pub fn axis(&self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }
}

/// One parsed real-time status report.
///
/// Only produced by a successful parse; an unparseable status line yields no
/// report rather than a zeroed one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub state: MachineState,
    pub position: Position,
    pub frame: PositionFrame,
}

/// Classification of a single received line.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseLine {
    /// `ok` acknowledgement, terminal for an exchange.
    Ok,
    /// `error` rejection, terminal for an exchange. Newer firmware appends a
    /// numeric code; older builds send text, hence the option.
    Error(Option<u64>),
    /// Asynchronous `ALARM:n` push.
    Alarm(u64),
    Status(StatusReport),
    /// The `Grbl 1.1h ['$' for help]` boot banner.
    Greeting,
    /// A `$n=value` line from a settings dump.
    Setting { index: u32, value: f64 },
    Unrecognized(String),
}
