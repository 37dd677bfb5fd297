//! Link health checks.
//!
//! A bench-time mirror of what the jog loop assumes: round trips terminate,
//! bad input is rejected, status reports parse, the settings dump is
//! readable. Every result accumulates into a [`LinkReport`] returned to the
//! caller; nothing here keeps process-wide state.
//!
//! The jog-syntax probe asks for a 1 mm X move. With steppers powered that
//! is real motion; this suite is meant for the bench, before the stage is
//! wired up.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::{
    controller::MotionController,
    error::Result,
    grbl::{parser, ExchangeOutcome, MachineState, ResponseLine},
};

/// Setting probed by the write-and-restore check: X max rate, harmless to
/// rewrite and present on every stock build.
const PROBE_SETTING: u32 = 110;
const PROBE_VALUE: f64 = 999.0;
const LATENCY_ROUNDS: u32 = 10;
const LATENCY_WARN_THRESHOLD: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckOutcome {
    Pass,
    Warn,
    Fail,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub name: &'static str,
    pub outcome: CheckOutcome,
    pub detail: String,
}

/// Immutable record of one diagnostic run.
#[derive(Debug, Default, Serialize)]
pub struct LinkReport {
    pub checks: Vec<CheckResult>,
}

impl LinkReport {
    fn record(&mut self, name: &'static str, outcome: CheckOutcome, detail: impl Into<String>) {
        self.checks.push(CheckResult {
            name,
            outcome,
            detail: detail.into(),
        });
    }

    fn count(&self, outcome: CheckOutcome) -> usize {
        self.checks.iter().filter(|c| c.outcome == outcome).count()
    }

    pub fn passed(&self) -> usize {
        self.count(CheckOutcome::Pass)
    }

    pub fn warned(&self) -> usize {
        self.count(CheckOutcome::Warn)
    }

    pub fn failed(&self) -> usize {
        self.count(CheckOutcome::Fail)
    }

    pub fn is_healthy(&self) -> bool {
        self.failed() == 0
    }
}

fn parse_settings(lines: &[String]) -> BTreeMap<u32, f64> {
    lines
        .iter()
        .filter_map(|line| match parser::parse_line(line) {
            ResponseLine::Setting { index, value } => Some((index, value)),
            _ => None,
        })
        .collect()
}

/// Run the full check suite. Transport failures abort the run; everything
/// protocol-level lands in the report.
pub async fn run_link_checks<C: MotionController>(controller: &mut C) -> Result<LinkReport> {
    let mut report = LinkReport::default();

    // Cheapest possible round trip: an empty line is acknowledged with ok.
    let exchange = controller.send_command("").await?;
    match exchange.outcome {
        ExchangeOutcome::Ok => report.record(
            "round_trip",
            CheckOutcome::Pass,
            "empty line acknowledged",
        ),
        ExchangeOutcome::Error(_) => report.record(
            "round_trip",
            CheckOutcome::Fail,
            format!("empty line rejected: {:?}", exchange.lines),
        ),
        ExchangeOutcome::TimedOut => report.record(
            "round_trip",
            CheckOutcome::Fail,
            "no terminal marker before timeout",
        ),
    }

    // A nonsense word must come back as an error, proving rejections
    // propagate rather than vanish.
    let exchange = controller.send_command("HELLO").await?;
    match exchange.outcome {
        ExchangeOutcome::Error(code) => report.record(
            "rejects_garbage",
            CheckOutcome::Pass,
            match code {
                Some(code) => format!("rejected with error:{code}"),
                None => "rejected".to_string(),
            },
        ),
        ExchangeOutcome::Ok => report.record(
            "rejects_garbage",
            CheckOutcome::Fail,
            "nonsense command was accepted",
        ),
        ExchangeOutcome::TimedOut => {
            report.record("rejects_garbage", CheckOutcome::Warn, "no reply at all")
        }
    }

    // Status query, clearing an alarm lockout if one is active.
    match controller.ensure_unlocked().await? {
        Some(status) if status.state == MachineState::Alarm => report.record(
            "status",
            CheckOutcome::Warn,
            "still in alarm after unlock",
        ),
        Some(status) => report.record(
            "status",
            CheckOutcome::Pass,
            format!(
                "state {:?}, position ({:.3}, {:.3}, {:.3})",
                status.state, status.position.x, status.position.y, status.position.z
            ),
        ),
        None => report.record(
            "status",
            CheckOutcome::Fail,
            "no parseable status report",
        ),
    }

    // Settings dump.
    let exchange = controller.send_command("$$").await?;
    let settings = parse_settings(&exchange.lines);
    if settings.is_empty() {
        report.record(
            "settings_dump",
            CheckOutcome::Fail,
            format!("no settings parsed from {} lines", exchange.lines.len()),
        );
    } else {
        report.record(
            "settings_dump",
            CheckOutcome::Pass,
            format!("{} settings parsed", settings.len()),
        );
    }

    // Write one harmless numeric setting and put it back.
    match settings.get(&PROBE_SETTING).copied() {
        Some(original) => {
            let probe = controller
                .send_command(&format!("${PROBE_SETTING}={PROBE_VALUE:.3}"))
                .await?;
            if probe.accepted() {
                let restore = controller
                    .send_command(&format!("${PROBE_SETTING}={original:.3}"))
                    .await?;
                if restore.accepted() {
                    report.record(
                        "setting_write",
                        CheckOutcome::Pass,
                        format!("${PROBE_SETTING} written and restored to {original:.3}"),
                    );
                } else {
                    report.record(
                        "setting_write",
                        CheckOutcome::Fail,
                        format!("restore failed, ${PROBE_SETTING} may be left at {PROBE_VALUE:.3}"),
                    );
                }
            } else {
                report.record(
                    "setting_write",
                    CheckOutcome::Warn,
                    "setting write rejected",
                );
            }
        }
        None => report.record(
            "setting_write",
            CheckOutcome::Warn,
            format!("${PROBE_SETTING} missing from dump, write test skipped"),
        ),
    }

    // Jog syntax acceptance.
    let exchange = controller.send_command("$J=G91 X1.000 F100.0").await?;
    match exchange.outcome {
        ExchangeOutcome::Ok => report.record(
            "jog_syntax",
            CheckOutcome::Pass,
            "jog command accepted",
        ),
        ExchangeOutcome::Error(Some(9)) => report.record(
            "jog_syntax",
            CheckOutcome::Warn,
            "machine locked (error:9), unlock and retry",
        ),
        ExchangeOutcome::Error(code) => report.record(
            "jog_syntax",
            CheckOutcome::Warn,
            format!("jog rejected: {code:?}"),
        ),
        ExchangeOutcome::TimedOut => report.record(
            "jog_syntax",
            CheckOutcome::Fail,
            "no reply to jog command",
        ),
    }

    // Mean round-trip latency over empty-line exchanges.
    let mut total = Duration::ZERO;
    let mut completed = 0u32;
    for _ in 0..LATENCY_ROUNDS {
        let start = Instant::now();
        let exchange = controller.send_command("").await?;
        if exchange.outcome == ExchangeOutcome::Ok {
            total += start.elapsed();
            completed += 1;
        }
    }
    if completed == 0 {
        report.record("latency", CheckOutcome::Fail, "no successful round trips");
    } else {
        let mean = total / completed;
        let outcome = if mean <= LATENCY_WARN_THRESHOLD {
            CheckOutcome::Pass
        } else {
            CheckOutcome::Warn
        };
        report.record(
            "latency",
            outcome,
            format!("mean {:.1} ms over {completed} round trips", mean.as_secs_f64() * 1000.0),
        );
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::testing::ScriptedController;
    use crate::grbl::{MachineState, Position, PositionFrame, StatusReport};

    fn idle_status() -> StatusReport {
        StatusReport {
            state: MachineState::Idle,
            position: Position {
                x: 0.0,
                y: 0.0,
                z: 0.0,
            },
            frame: PositionFrame::Machine,
        }
    }

    fn alarm_status() -> StatusReport {
        StatusReport {
            state: MachineState::Alarm,
            ..idle_status()
        }
    }

    #[tokio::test]
    async fn healthy_link_passes_every_check() {
        let mut controller = ScriptedController::with_statuses([Some(idle_status())]);
        controller.push_reply(&["ok"], ExchangeOutcome::Ok);
        controller.push_reply(&["error:20"], ExchangeOutcome::Error(Some(20)));
        controller.push_reply(
            &["$0=10", "$110=500.000", "ok"],
            ExchangeOutcome::Ok,
        );
        // Everything after the dump is acknowledged with the default ok.

        let report = run_link_checks(&mut controller).await.unwrap();
        assert!(report.is_healthy());
        assert_eq!(report.failed(), 0);
        assert_eq!(report.warned(), 0);
        assert_eq!(report.checks.len(), 7);

        // The probed setting was rewritten and then restored.
        assert!(controller.sent.iter().any(|l| l == "$110=999.000"));
        assert!(controller.sent.iter().any(|l| l == "$110=500.000"));
    }

    #[tokio::test]
    async fn silent_link_fails_and_skips() {
        let mut controller = ScriptedController::new();
        for _ in 0..20 {
            controller.push_reply(&[], ExchangeOutcome::TimedOut);
        }

        let report = run_link_checks(&mut controller).await.unwrap();
        assert!(!report.is_healthy());
        assert_eq!(report.checks.len(), 7);
        let by_name = |name: &str| {
            report
                .checks
                .iter()
                .find(|c| c.name == name)
                .unwrap()
                .outcome
        };
        assert_eq!(by_name("round_trip"), CheckOutcome::Fail);
        assert_eq!(by_name("rejects_garbage"), CheckOutcome::Warn);
        assert_eq!(by_name("status"), CheckOutcome::Fail);
        assert_eq!(by_name("settings_dump"), CheckOutcome::Fail);
        assert_eq!(by_name("setting_write"), CheckOutcome::Warn);
        assert_eq!(by_name("jog_syntax"), CheckOutcome::Fail);
        assert_eq!(by_name("latency"), CheckOutcome::Fail);
    }

    #[tokio::test]
    async fn alarm_is_cleared_during_the_status_check() {
        let mut controller =
            ScriptedController::with_statuses([Some(alarm_status()), Some(idle_status())]);
        controller.push_reply(&["ok"], ExchangeOutcome::Ok);
        controller.push_reply(&["error:20"], ExchangeOutcome::Error(Some(20)));
        // The unlock itself consumes a reply ahead of the settings dump.
        controller.push_reply(&["ok"], ExchangeOutcome::Ok);
        controller.push_reply(&["$110=500.000", "ok"], ExchangeOutcome::Ok);

        let report = run_link_checks(&mut controller).await.unwrap();
        assert!(report.is_healthy());
        assert!(controller.sent.iter().any(|l| l == "$X"));
        // Exactly one unlock attempt.
        assert_eq!(controller.sent.iter().filter(|l| *l == "$X").count(), 1);
    }
}
