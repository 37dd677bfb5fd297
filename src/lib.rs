//! Game-controller jogging for a GRBL-driven motion stage.
//!
//! The core is a serial protocol client (command exchanges with terminal
//! markers, real-time status reports, the alarm/unlock flow) plus the
//! pipeline that turns input-device deltas into rate-limited `$J=` jog
//! lines and supports the save-home / go-home workflow.
//!
//! Reading the physical pad is a capability the embedding binary provides
//! through [`input::InputDevice`]; everything downstream of that seam,
//! including the control loop itself ([`jog::JogRunner`]), lives here.

pub mod config;
pub mod controller;
pub mod diagnostics;
pub mod error;
pub mod grbl;
pub mod home;
pub mod input;
pub mod jog;
pub mod logging;
pub mod transport;

pub use error::{Error, Result};
