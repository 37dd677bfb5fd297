//! GRBL protocol support: line classification and the serial client.

pub mod client;
pub mod messages;
pub mod parser;

pub use client::{CommandExchange, ExchangeOutcome, GrblClient, COMMAND_TIMEOUT};
pub use messages::{
    Axis, MachineState, Position, PositionFrame, ResponseLine, StatusReport,
};
