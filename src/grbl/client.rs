//! Command/response exchanges against the controller.
//!
//! One client owns the link; every exchange runs to its terminal marker (or
//! times out) before the next write, so status queries and motion commands
//! never interleave on the wire.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::Instant;
use tracing::{debug, warn};

use super::{
    messages::{ResponseLine, StatusReport},
    parser,
};
use crate::{error::Result, transport::LineTransport};

/// Overall window for a command to reach its terminal `ok`/`error` line.
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(2);
/// Window for a `?` query to produce a parseable status report.
const STATUS_TIMEOUT: Duration = Duration::from_secs(1);
/// Idle window used when draining unsolicited chatter such as the boot
/// banner.
const DRAIN_IDLE: Duration = Duration::from_millis(250);

/// How a single command exchange ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeOutcome {
    /// Terminated by an `ok` line.
    Ok,
    /// Terminated by an `error` line, with the code when the firmware sent
    /// one.
    Error(Option<u64>),
    /// No terminal marker inside the window. The partial line sequence is
    /// still returned; link noise is expected and not fatal.
    TimedOut,
}

/// One sent line and everything received for it, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandExchange {
    pub sent: String,
    pub lines: Vec<String>,
    pub outcome: ExchangeOutcome,
}

impl CommandExchange {
    pub fn accepted(&self) -> bool {
        self.outcome == ExchangeOutcome::Ok
    }
}

pub struct GrblClient<R, W> {
    transport: LineTransport<R, W>,
}

impl<R: AsyncRead + Unpin, W: AsyncWrite + Unpin> GrblClient<R, W> {
    pub fn new(transport: LineTransport<R, W>) -> Self {
        GrblClient { transport }
    }

    /// Drain late boot chatter. Boards that reset when the port opens emit
    /// their banner on their own schedule; collecting it here keeps the
    /// first real exchange clean.
    pub async fn drain_banner(&mut self) -> Result<()> {
        let banner = self
            .transport
            .read_available_lines(DRAIN_IDLE, STATUS_TIMEOUT)
            .await?;
        for line in &banner {
            if matches!(parser::parse_line(line), ResponseLine::Greeting) {
                debug!(banner = %line, "controller greeting");
            }
        }
        Ok(())
    }

    /// Send one line and collect response lines until the terminal marker or
    /// the overall window elapses. Never retries.
    pub async fn send_command(&mut self, line: &str) -> Result<CommandExchange> {
        let sent = line.trim().to_string();
        self.transport.write_line(&sent).await?;

        let deadline = Instant::now() + COMMAND_TIMEOUT;
        let mut lines = Vec::new();
        let outcome = loop {
            match self.transport.read_line_until(deadline).await? {
                None => break ExchangeOutcome::TimedOut,
                Some(line) => {
                    if line.is_empty() {
                        continue;
                    }
                    let parsed = parser::parse_line(&line);
                    lines.push(line);
                    match parsed {
                        ResponseLine::Ok => break ExchangeOutcome::Ok,
                        ResponseLine::Error(code) => break ExchangeOutcome::Error(code),
                        _ => {}
                    }
                }
            }
        };

        let exchange = CommandExchange {
            sent,
            lines,
            outcome,
        };
        match exchange.outcome {
            ExchangeOutcome::TimedOut => {
                warn!(sent = %exchange.sent, lines = ?exchange.lines, "no terminal marker before timeout");
            }
            _ => debug!(sent = %exchange.sent, lines = ?exchange.lines, "exchange complete"),
        }
        Ok(exchange)
    }

    /// `$X`: clear an alarm lockout.
    pub async fn unlock(&mut self) -> Result<CommandExchange> {
        self.send_command("$X").await
    }

    /// One-byte real-time `?` query. Returns the first line that parses as a
    /// status report, or `None` if nothing parseable arrives in the window.
    pub async fn query_status(&mut self) -> Result<Option<StatusReport>> {
        self.transport.write_raw(b"?").await?;
        let deadline = Instant::now() + STATUS_TIMEOUT;
        while let Some(line) = self.transport.read_line_until(deadline).await? {
            if let Some(report) = parser::parse_status(&line) {
                return Ok(Some(report));
            }
        }
        Ok(None)
    }

    /// Release the link.
    pub async fn close(self) -> Result<()> {
        self.transport.close().await
    }
}
