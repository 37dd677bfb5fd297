//! Cached home position and the save/go workflow.

use chrono::{DateTime, Utc};

use crate::{
    controller::MotionController,
    error::{Error, Result},
    grbl::{Axis, CommandExchange, Position},
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HomePosition {
    pub position: Position,
    pub saved_at: DateTime<Utc>,
}

/// Caches a previously queried position. Absent until the first successful
/// save; never cleared, only overwritten by the next save.
pub struct HomeStore {
    axes: Vec<Axis>,
    home: Option<HomePosition>,
}

impl HomeStore {
    /// `axes` selects what go-home restores. An empty list falls back to Z,
    /// the axis that matters for torch height.
    pub fn new(axes: Vec<Axis>) -> Self {
        let axes = if axes.is_empty() { vec![Axis::Z] } else { axes };
        HomeStore { axes, home: None }
    }

    pub fn home(&self) -> Option<&HomePosition> {
        self.home.as_ref()
    }

    /// Capture the current position as home. Requires a successful status
    /// query; on failure any previously saved home is left untouched.
    pub async fn save_home<C: MotionController>(
        &mut self,
        controller: &mut C,
    ) -> Result<HomePosition> {
        match controller.query_status().await? {
            Some(report) => {
                let saved = HomePosition {
                    position: report.position,
                    saved_at: Utc::now(),
                };
                self.home = Some(saved);
                Ok(saved)
            }
            None => Err(Error::NoStatus),
        }
    }

    /// Send the absolute move back to the saved home. Nothing goes on the
    /// wire unless a home exists.
    pub async fn go_home<C: MotionController>(
        &self,
        controller: &mut C,
    ) -> Result<CommandExchange> {
        let home = self.home.ok_or(Error::NoHomeSet)?;
        let targets: Vec<(Axis, f64)> = self
            .axes
            .iter()
            .map(|&axis| (axis, home.position.axis(axis)))
            .collect();
        match controller.move_to(&targets).await? {
            Some(exchange) => Ok(exchange),
            None => Err(Error::NoHomeSet),
        }
    }
}
