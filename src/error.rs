use std::io;

use thiserror::Error;

/// Errors surfaced by the library.
///
/// A command that times out waiting for its terminal marker is not an error;
/// it comes back as a partial [`crate::grbl::CommandExchange`]. Link noise is
/// expected and must not take the control loop down.
#[derive(Debug, Error)]
pub enum Error {
    /// The serial port could not be opened. Fatal at startup.
    #[error("failed to open serial port {path}: {source}")]
    Connection {
        path: String,
        #[source]
        source: tokio_serial::Error,
    },

    /// An i/o failure on an open link, e.g. a write timeout. Surfaced per
    /// command; the control loop keeps running.
    #[error("serial link i/o failure: {0}")]
    Transport(#[from] io::Error),

    /// No parseable status report arrived within the read window.
    #[error("no parseable status report received")]
    NoStatus,

    /// Go-home was requested before any save-home succeeded.
    #[error("no home position has been saved")]
    NoHomeSet,
}

pub type Result<T> = std::result::Result<T, Error>;
