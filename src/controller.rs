//! The capability contract a motion controller provides to the rest of the
//! crate.
//!
//! The jog loop, home store and diagnostics are written against this trait,
//! not against the serial client, so they run unchanged over scripted
//! controllers in tests and over other firmware variants later.

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::warn;

use crate::{
    error::Result,
    grbl::{Axis, CommandExchange, GrblClient, MachineState, StatusReport},
    jog::format::{absolute_move, JogRequest},
};

#[async_trait]
pub trait MotionController: Send {
    /// Bring the controller to a usable state after the link opens.
    async fn connect(&mut self) -> Result<()>;

    /// Forward one line verbatim and collect its response.
    async fn send_command(&mut self, line: &str) -> Result<CommandExchange>;

    /// Real-time status query.
    async fn query_status(&mut self) -> Result<Option<StatusReport>>;

    /// Clear an alarm lockout.
    async fn unlock(&mut self) -> Result<CommandExchange>;

    /// Issue a relative jog. `None` when the request holds no motion.
    async fn jog(&mut self, request: &JogRequest) -> Result<Option<CommandExchange>>;

    /// Absolute rapid move to the given axis targets. `None` for an empty
    /// target list.
    async fn move_to(&mut self, targets: &[(Axis, f64)]) -> Result<Option<CommandExchange>>;

    /// If the controller reports an alarm, send exactly one unlock and
    /// re-query once. A machine still alarming after that is surfaced to the
    /// caller, never retried in a loop.
    async fn ensure_unlocked(&mut self) -> Result<Option<StatusReport>> {
        match self.query_status().await? {
            Some(report) if report.state == MachineState::Alarm => {
                warn!("controller in alarm lockout, sending unlock");
                self.unlock().await?;
                self.query_status().await
            }
            other => Ok(other),
        }
    }
}

#[async_trait]
impl<R, W> MotionController for GrblClient<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn connect(&mut self) -> Result<()> {
        self.drain_banner().await?;
        self.ensure_unlocked().await?;
        Ok(())
    }

    async fn send_command(&mut self, line: &str) -> Result<CommandExchange> {
        GrblClient::send_command(self, line).await
    }

    async fn query_status(&mut self) -> Result<Option<StatusReport>> {
        GrblClient::query_status(self).await
    }

    async fn unlock(&mut self) -> Result<CommandExchange> {
        GrblClient::unlock(self).await
    }

    async fn jog(&mut self, request: &JogRequest) -> Result<Option<CommandExchange>> {
        match request.to_line() {
            Some(line) => GrblClient::send_command(self, &line).await.map(Some),
            None => Ok(None),
        }
    }

    async fn move_to(&mut self, targets: &[(Axis, f64)]) -> Result<Option<CommandExchange>> {
        match absolute_move(targets) {
            Some(line) => GrblClient::send_command(self, &line).await.map(Some),
            None => Ok(None),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::LineTransport;
    use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};

    fn serial_pair() -> (
        GrblClient<
            tokio::io::ReadHalf<tokio::io::DuplexStream>,
            tokio::io::WriteHalf<tokio::io::DuplexStream>,
        >,
        tokio::io::DuplexStream,
    ) {
        let (near, far) = tokio::io::duplex(64 * 1024);
        let (reader, writer) = tokio::io::split(near);
        (GrblClient::new(LineTransport::new(reader, writer)), far)
    }

    #[tokio::test]
    async fn alarm_drives_exactly_one_unlock() {
        let (mut client, far) = serial_pair();
        let server = tokio::spawn(async move {
            let (r, mut writer) = tokio::io::split(far);
            let mut reader = BufReader::new(r);
            let mut transcript: Vec<String> = Vec::new();
            loop {
                let mut byte = [0u8; 1];
                if reader.read_exact(&mut byte).await.is_err() {
                    break;
                }
                if byte[0] == b'?' {
                    let first_query = !transcript.iter().any(|t| t == "?");
                    transcript.push("?".to_string());
                    let reply = if first_query {
                        "<Alarm|MPos:0.000,0.000,0.000>\r\n"
                    } else {
                        "<Idle|MPos:0.000,0.000,0.000>\r\n"
                    };
                    writer.write_all(reply.as_bytes()).await.unwrap();
                } else {
                    let mut rest = Vec::new();
                    reader.read_until(b'\n', &mut rest).await.unwrap();
                    let mut line = vec![byte[0]];
                    line.extend(rest);
                    transcript.push(String::from_utf8_lossy(&line).trim().to_string());
                    writer.write_all(b"ok\r\n").await.unwrap();
                }
            }
            transcript
        });

        let report = client.ensure_unlocked().await.unwrap().unwrap();
        assert_eq!(report.state, MachineState::Idle);
        drop(client);
        let transcript = server.await.unwrap();
        assert_eq!(transcript, vec!["?", "$X", "?"]);
    }

    #[tokio::test]
    async fn no_alarm_means_no_unlock() {
        let (mut client, mut far) = serial_pair();
        far.write_all(b"<Idle|MPos:0.000,0.000,0.000>\r\n")
            .await
            .unwrap();
        let report = client.ensure_unlocked().await.unwrap().unwrap();
        assert_eq!(report.state, MachineState::Idle);
        // Nothing but the query byte went out.
        let mut buf = [0u8; 1];
        far.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf[0], b'?');
        drop(client);
        assert_eq!(far.read(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn zero_motion_jog_sends_nothing() {
        let (mut client, mut far) = serial_pair();
        let request = JogRequest {
            dx: 0.0,
            dy: 0.0,
            dz: 0.0,
            feed: 500.0,
        };
        assert_eq!(client.jog(&request).await.unwrap(), None);
        drop(client);
        let mut buf = [0u8; 1];
        assert_eq!(far.read(&mut buf).await.unwrap(), 0);
    }
}
