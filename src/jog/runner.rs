//! The operator control loop.
//!
//! Each tick: snapshot the device, act on home buttons, rate-gate, map the
//! sticks to deltas, format and send. One task owns the controller, so a
//! query or command always runs to completion before the next write.

use std::{future::Future, time::Duration};

use futures::FutureExt;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{info, warn};

use crate::{
    controller::MotionController,
    error::{Error, Result},
    home::HomeStore,
    input::{mapper::InputMapper, InputDevice, InputSnapshot},
    jog::{format::JogRequest, rate::RateLimiter},
};

/// Button bindings for the home workflow; `None` disables an action.
#[derive(Debug, Clone, Copy, Default)]
pub struct HomeBindings {
    pub save_button: Option<usize>,
    pub go_button: Option<usize>,
}

#[derive(Debug, Clone, Copy)]
pub struct LoopSettings {
    pub feed_mm_per_min: f64,
    /// How often the device is polled. Much faster than commands go out.
    pub poll_interval: Duration,
    /// Minimum spacing between motion commands on the wire.
    pub command_interval: Duration,
}

pub struct JogRunner<C, D> {
    controller: C,
    device: D,
    mapper: InputMapper,
    limiter: RateLimiter,
    home: HomeStore,
    bindings: HomeBindings,
    settings: LoopSettings,
    save_held: bool,
    go_held: bool,
}

impl<C: MotionController, D: InputDevice> JogRunner<C, D> {
    pub fn new(
        controller: C,
        device: D,
        mapper: InputMapper,
        home: HomeStore,
        bindings: HomeBindings,
        settings: LoopSettings,
    ) -> Self {
        JogRunner {
            controller,
            device,
            mapper,
            limiter: RateLimiter::new(settings.command_interval),
            home,
            bindings,
            settings,
            save_held: false,
            go_held: false,
        }
    }

    /// Drive the loop until `shutdown` completes or the input device fails.
    ///
    /// On a clean shutdown the controller is handed back so the caller can
    /// close the link; on any error path it is dropped here, which releases
    /// the port either way.
    pub async fn run<S: Future<Output = ()>>(mut self, shutdown: S) -> Result<C> {
        let shutdown = shutdown.fuse();
        tokio::pin!(shutdown);
        let mut ticks = interval(self.settings.poll_interval);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("jog loop running");
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("shutdown requested, stopping jog loop");
                    break;
                }
                _ = ticks.tick() => {
                    let snapshot = self.device.snapshot()?;
                    if let Err(error) = self.service(&snapshot).await {
                        // Link noise is per-tick trouble; the next tick
                        // retries naturally.
                        warn!(%error, "jog tick failed");
                    }
                }
            }
        }
        Ok(self.controller)
    }

    async fn service(&mut self, snapshot: &InputSnapshot) -> Result<()> {
        self.handle_home_buttons(snapshot).await?;

        let now = Instant::now();
        if !self.limiter.should_emit(now) {
            return Ok(());
        }
        let delta = self.mapper.map(snapshot);
        let request = JogRequest {
            dx: delta.dx,
            dy: delta.dy,
            dz: delta.dz,
            feed: self.settings.feed_mm_per_min,
        };
        if let Some(exchange) = self.controller.jog(&request).await? {
            info!(sent = %exchange.sent, response = ?exchange.lines, "jog");
            self.limiter.mark_emitted(now);
        }
        Ok(())
    }

    /// Save/go actions fire on the press edge, not while held.
    async fn handle_home_buttons(&mut self, snapshot: &InputSnapshot) -> Result<()> {
        let save = self
            .bindings
            .save_button
            .map_or(false, |i| snapshot.button(i));
        if save && !self.save_held {
            match self.home.save_home(&mut self.controller).await {
                Ok(saved) => info!(position = ?saved.position, "home position saved"),
                Err(Error::NoStatus) => warn!("could not read position, home unchanged"),
                Err(error) => return Err(error),
            }
        }
        self.save_held = save;

        let go = self.bindings.go_button.map_or(false, |i| snapshot.button(i));
        if go && !self.go_held {
            match self.home.go_home(&mut self.controller).await {
                Ok(exchange) => {
                    info!(sent = %exchange.sent, response = ?exchange.lines, "returning to home");
                    // A real motion command went out; it counts against the
                    // emission cadence.
                    self.limiter.mark_emitted(Instant::now());
                }
                Err(Error::NoHomeSet) => warn!("go-home pressed but no home is saved"),
                Err(error) => return Err(error),
            }
        }
        self.go_held = go;
        Ok(())
    }
}
