//! Line-oriented serial transport.
//!
//! Owns the port lifecycle: open at a fixed baud, run the controller's
//! wake/reset dance, then expose bounded line reads and writes. Generic over
//! the underlying stream so the protocol layer is testable over an in-memory
//! pipe.

use std::{io, mem, time::Duration};

use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, ReadHalf, WriteHalf},
    time::{sleep, timeout, timeout_at, Instant},
};
use tokio_serial::{
    ClearBuffer, DataBits, FlowControl, Parity, SerialPort, SerialPortBuilderExt, SerialStream,
    StopBits,
};
use tracing::trace;

use crate::error::{Error, Result};

const WRITE_TIMEOUT: Duration = Duration::from_secs(1);
/// How long the firmware gets to finish its boot/reset cycle after the port
/// opens (opening the port resets Arduino-style boards).
const BOOT_DELAY: Duration = Duration::from_secs(2);
const WAKE_SEQUENCE: &[u8] = b"\r\n\r\n";

pub type SerialLink = LineTransport<ReadHalf<SerialStream>, WriteHalf<SerialStream>>;

/// Open the port and bring the controller to a known-quiet state: pulse DTR,
/// wait out the boot banner, clear the buffer, send the wake sequence, wait
/// and clear once more.
pub async fn open_serial(path: &str, baud: u32) -> Result<SerialLink> {
    let mut port = tokio_serial::new(path, baud)
        .data_bits(DataBits::Eight)
        .flow_control(FlowControl::None)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .timeout(WRITE_TIMEOUT)
        .open_native_async()
        .map_err(|source| Error::Connection {
            path: path.to_string(),
            source,
        })?;

    port.write_data_terminal_ready(false)
        .map_err(io::Error::from)?;
    sleep(Duration::from_millis(2)).await;
    port.write_data_terminal_ready(true).map_err(io::Error::from)?;

    sleep(BOOT_DELAY).await;
    port.clear(ClearBuffer::Input).map_err(io::Error::from)?;
    port.write_all(WAKE_SEQUENCE).await?;
    port.flush().await?;
    sleep(BOOT_DELAY).await;
    port.clear(ClearBuffer::Input).map_err(io::Error::from)?;

    let (reader, writer) = tokio::io::split(port);
    Ok(LineTransport::new(reader, writer))
}

pub struct LineTransport<R, W> {
    reader: BufReader<R>,
    writer: W,
    /// Bytes of a line whose terminator has not arrived yet. Kept across
    /// calls so a deadline cannot drop half a line on the floor.
    pending: Vec<u8>,
}

impl<R: AsyncRead + Unpin, W: AsyncWrite + Unpin> LineTransport<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        LineTransport {
            reader: BufReader::new(reader),
            writer,
            pending: Vec::new(),
        }
    }

    /// Send one command line; the newline terminator is appended here.
    pub async fn write_line(&mut self, line: &str) -> Result<()> {
        let mut bytes = Vec::with_capacity(line.len() + 1);
        bytes.extend_from_slice(line.as_bytes());
        bytes.push(b'\n');
        self.write_raw(&bytes).await
    }

    /// Write bytes with no terminator. Real-time queries like `?` must go
    /// out bare; the firmware handles them ahead of the line buffer.
    pub async fn write_raw(&mut self, bytes: &[u8]) -> Result<()> {
        trace!(tx = %String::from_utf8_lossy(bytes).trim_end(), "serial write");
        let write = async {
            self.writer.write_all(bytes).await?;
            self.writer.flush().await
        };
        timeout(WRITE_TIMEOUT, write)
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "serial write timed out"))??;
        Ok(())
    }

    /// Read one complete line, waiting no later than `deadline`.
    ///
    /// Returns `None` when the deadline passes or the stream ends.
    /// Undecodable bytes are replaced rather than treated as failures.
    pub async fn read_line_until(&mut self, deadline: Instant) -> Result<Option<String>> {
        loop {
            match timeout_at(deadline, self.reader.read_until(b'\n', &mut self.pending)).await {
                Err(_) => return Ok(None),
                Ok(Ok(0)) => return Ok(None),
                Ok(Ok(_)) => {
                    if self.pending.last() == Some(&b'\n') {
                        let raw = mem::take(&mut self.pending);
                        let line = String::from_utf8_lossy(&raw).trim().to_string();
                        trace!(rx = %line, "serial read");
                        return Ok(Some(line));
                    }
                }
                Ok(Err(e)) => return Err(e.into()),
            }
        }
    }

    /// Drain whatever the device is currently sending.
    ///
    /// The wait window resets whenever a line arrives and is capped by
    /// `ceiling`, so a quiet link returns after `idle` while a multi-line
    /// settings dump is still collected in full. Blank lines are dropped.
    pub async fn read_available_lines(
        &mut self,
        idle: Duration,
        ceiling: Duration,
    ) -> Result<Vec<String>> {
        let cap = Instant::now() + ceiling;
        let mut lines = Vec::new();
        loop {
            let deadline = cap.min(Instant::now() + idle);
            match self.read_line_until(deadline).await? {
                Some(line) => {
                    if !line.is_empty() {
                        lines.push(line);
                    }
                }
                None => break,
            }
            if Instant::now() >= cap {
                break;
            }
        }
        Ok(lines)
    }

    /// Release the link. Consuming self makes double-close unrepresentable.
    pub async fn close(mut self) -> Result<()> {
        self.writer.shutdown().await?;
        Ok(())
    }
}
