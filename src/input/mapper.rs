//! Turning raw device values into per-axis jog deltas.

use serde::{Deserialize, Serialize};

use super::InputSnapshot;

/// Signed per-axis motion in millimetres for one emission cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct JogDelta {
    pub dx: f64,
    pub dy: f64,
    pub dz: f64,
}

impl JogDelta {
    pub fn is_zero(&self) -> bool {
        self.dx == 0.0 && self.dy == 0.0 && self.dz == 0.0
    }
}

/// Deadzone-then-linear law: exactly 0.0 inside the deadzone, `max_step_mm *
/// value` outside it. No further clamping; callers keep `max_step_mm` at or
/// below the safe per-command travel.
pub fn axis_to_step(value: f64, max_step_mm: f64, deadzone: f64) -> f64 {
    if value.abs() < deadzone {
        0.0
    } else {
        max_step_mm * value
    }
}

/// Fold a trigger reading into [0, 1]. Resting triggers report -1 on
/// hardware that uses the [-1, 1] convention and 0 on hardware that uses
/// [0, 1]; both conventions map rest to 0 and fully pulled to 1.
pub fn normalize_trigger(raw: f64) -> f64 {
    if raw < 0.0 {
        (raw + 1.0) / 2.0
    } else {
        raw
    }
}

/// Which physical control drives the Z axis in continuous mode.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ZSource {
    None,
    Stick { axis: usize, invert: bool },
    Triggers { left: usize, right: usize },
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ContinuousLayout {
    pub x_axis: usize,
    pub y_axis: usize,
    /// Sticks report down as positive; inverting makes stick-up jog +Y.
    pub invert_y: bool,
    pub z_source: ZSource,
}

impl Default for ContinuousLayout {
    fn default() -> Self {
        // Left stick for X/Y, trigger pair for Z: the usual pad layout.
        ContinuousLayout {
            x_axis: 0,
            y_axis: 1,
            invert_y: true,
            z_source: ZSource::Triggers { left: 4, right: 5 },
        }
    }
}

/// A pair of momentary buttons driving one axis in opposite directions.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct ButtonPair {
    pub positive: usize,
    pub negative: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DiscreteLayout {
    /// Hat whose x/y pair drives X and Y one step at a time.
    pub hat: Option<usize>,
    pub z_buttons: Option<ButtonPair>,
}

impl Default for DiscreteLayout {
    fn default() -> Self {
        DiscreteLayout {
            hat: Some(0),
            z_buttons: Some(ButtonPair {
                positive: 0,
                negative: 1,
            }),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum InputLayout {
    Continuous(ContinuousLayout),
    Discrete(DiscreteLayout),
}

impl Default for InputLayout {
    fn default() -> Self {
        InputLayout::Continuous(ContinuousLayout::default())
    }
}

/// Converts one input snapshot into per-axis deltas. Both modes produce the
/// same output shape, so the loop does not care which is configured.
pub struct InputMapper {
    layout: InputLayout,
    deadzone: f64,
    max_step_mm: f64,
}

impl InputMapper {
    pub fn new(layout: InputLayout, deadzone: f64, max_step_mm: f64) -> Self {
        InputMapper {
            layout,
            deadzone,
            max_step_mm,
        }
    }

    pub fn map(&self, snapshot: &InputSnapshot) -> JogDelta {
        match &self.layout {
            InputLayout::Continuous(layout) => self.map_continuous(layout, snapshot),
            InputLayout::Discrete(layout) => self.map_discrete(layout, snapshot),
        }
    }

    fn step(&self, value: f64) -> f64 {
        axis_to_step(value, self.max_step_mm, self.deadzone)
    }

    fn map_continuous(&self, layout: &ContinuousLayout, snapshot: &InputSnapshot) -> JogDelta {
        let dx = self.step(snapshot.axis(layout.x_axis));
        let y = snapshot.axis(layout.y_axis);
        let dy = self.step(if layout.invert_y { -y } else { y });
        let dz = match layout.z_source {
            ZSource::None => 0.0,
            ZSource::Stick { axis, invert } => {
                let v = snapshot.axis(axis);
                self.step(if invert { -v } else { v })
            }
            ZSource::Triggers { left, right } => {
                // Deadzone applies to the combined deflection, not to each
                // trigger alone.
                let deflection = normalize_trigger(snapshot.axis(right))
                    - normalize_trigger(snapshot.axis(left));
                self.step(deflection)
            }
        };
        JogDelta { dx, dy, dz }
    }

    fn map_discrete(&self, layout: &DiscreteLayout, snapshot: &InputSnapshot) -> JogDelta {
        let (hx, hy) = layout.hat.map(|i| snapshot.hat(i)).unwrap_or((0, 0));
        let dz = layout
            .z_buttons
            .map(|pair| self.pair_step(pair, snapshot))
            .unwrap_or(0.0);
        JogDelta {
            dx: f64::from(hx) * self.max_step_mm,
            dy: f64::from(hy) * self.max_step_mm,
            dz,
        }
    }

    /// The positive-direction button wins when both are held. TODO: confirm
    /// against the pad actually wired to the welder before relying on it.
    fn pair_step(&self, pair: ButtonPair, snapshot: &InputSnapshot) -> f64 {
        if snapshot.button(pair.positive) {
            self.max_step_mm
        } else if snapshot.button(pair.negative) {
            -self.max_step_mm
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn continuous(deadzone: f64, max_step: f64) -> InputMapper {
        InputMapper::new(
            InputLayout::Continuous(ContinuousLayout::default()),
            deadzone,
            max_step,
        )
    }

    #[test]
    fn inside_deadzone_is_exactly_zero() {
        assert_eq!(axis_to_step(0.19, 1.0, 0.2), 0.0);
        assert_eq!(axis_to_step(-0.19, 1.0, 0.2), 0.0);
        assert_eq!(axis_to_step(0.0, 1.0, 0.2), 0.0);
    }

    #[test]
    fn outside_deadzone_is_linear() {
        assert_eq!(axis_to_step(0.2, 1.0, 0.2), 0.2);
        assert_eq!(axis_to_step(-0.5, 2.0, 0.2), -1.0);
        assert_eq!(axis_to_step(1.0, 0.75, 0.2), 0.75);
    }

    #[test]
    fn trigger_ranges_normalize_to_unit() {
        // [-1, 1] hardware.
        assert_eq!(normalize_trigger(-1.0), 0.0);
        assert_eq!(normalize_trigger(-0.5), 0.25);
        assert_eq!(normalize_trigger(1.0), 1.0);
        // [0, 1] hardware.
        assert_eq!(normalize_trigger(0.0), 0.0);
        assert_eq!(normalize_trigger(0.5), 0.5);
    }

    #[test]
    fn stick_up_jogs_positive_y() {
        let mapper = continuous(0.2, 1.0);
        let snapshot = InputSnapshot {
            axes: vec![0.0, -0.8, 0.0, 0.0, -1.0, -1.0],
            ..Default::default()
        };
        let delta = mapper.map(&snapshot);
        assert_eq!(delta.dy, 0.8);
        assert_eq!(delta.dx, 0.0);
        assert_eq!(delta.dz, 0.0);
    }

    #[test]
    fn triggers_drive_z_in_both_ranges() {
        let mapper = continuous(0.2, 1.0);
        // Right trigger fully pulled on [-1, 1] hardware, left resting.
        let snapshot = InputSnapshot {
            axes: vec![0.0, 0.0, 0.0, 0.0, -1.0, 1.0],
            ..Default::default()
        };
        assert_eq!(mapper.map(&snapshot).dz, 1.0);
        // Left trigger half pulled on [0, 1] hardware.
        let snapshot = InputSnapshot {
            axes: vec![0.0, 0.0, 0.0, 0.0, 0.5, 0.0],
            ..Default::default()
        };
        assert_eq!(mapper.map(&snapshot).dz, -0.5);
    }

    #[test]
    fn trigger_deadzone_applies_to_the_difference() {
        let mapper = continuous(0.2, 5.0);
        // Both triggers lightly pulled; deflection 0.1 sits inside the
        // deadzone even though 5.0 mm * 0.1 would not.
        let snapshot = InputSnapshot {
            axes: vec![0.0, 0.0, 0.0, 0.0, 0.3, 0.4],
            ..Default::default()
        };
        let delta = mapper.map(&snapshot);
        assert!((delta.dz - 0.0).abs() < 1e-12);
    }

    #[test]
    fn stick_z_source_with_inversion() {
        let layout = ContinuousLayout {
            z_source: ZSource::Stick {
                axis: 3,
                invert: true,
            },
            ..Default::default()
        };
        let mapper = InputMapper::new(InputLayout::Continuous(layout), 0.2, 1.0);
        let snapshot = InputSnapshot {
            axes: vec![0.0, 0.0, 0.0, -0.6],
            ..Default::default()
        };
        assert_eq!(mapper.map(&snapshot).dz, 0.6);
    }

    #[test]
    fn hat_steps_one_unit_per_axis() {
        let mapper = InputMapper::new(
            InputLayout::Discrete(DiscreteLayout::default()),
            0.2,
            5.0,
        );
        let snapshot = InputSnapshot {
            hats: vec![(1, -1)],
            ..Default::default()
        };
        let delta = mapper.map(&snapshot);
        assert_eq!(delta.dx, 5.0);
        assert_eq!(delta.dy, -5.0);
    }

    #[test]
    fn opposing_buttons_positive_wins() {
        let mapper = InputMapper::new(
            InputLayout::Discrete(DiscreteLayout::default()),
            0.2,
            5.0,
        );
        let snapshot = InputSnapshot {
            buttons: vec![true, true],
            ..Default::default()
        };
        assert_eq!(mapper.map(&snapshot).dz, 5.0);
    }

    #[test]
    fn sparse_device_reads_neutral() {
        let mapper = continuous(0.2, 1.0);
        assert!(mapper.map(&InputSnapshot::default()).is_zero());
        let discrete = InputMapper::new(
            InputLayout::Discrete(DiscreteLayout::default()),
            0.2,
            1.0,
        );
        assert!(discrete.map(&InputSnapshot::default()).is_zero());
    }
}
