//! Rendering of the motion lines this core emits.

use std::fmt::{self, Display};

use crate::grbl::Axis;

/// A relative jog to issue: signed per-axis deltas in millimetres plus a
/// feed rate in mm/min. Built fresh each emission cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JogRequest {
    pub dx: f64,
    pub dy: f64,
    pub dz: f64,
    pub feed: f64,
}

impl JogRequest {
    fn axis_words(&self) -> Vec<(Axis, f64)> {
        let mut words = Vec::with_capacity(3);
        if self.dx != 0.0 {
            words.push((Axis::X, self.dx));
        }
        if self.dy != 0.0 {
            words.push((Axis::Y, self.dy));
        }
        if self.dz != 0.0 {
            words.push((Axis::Z, self.dz));
        }
        words
    }

    /// Render the `$J=G91` line, or `None` when every delta is zero: no
    /// motion means no command at all.
    pub fn to_line(&self) -> Option<String> {
        let words = self.axis_words();
        if words.is_empty() {
            return None;
        }
        Some(format!("$J=G91 {} F{:.1}", AxisWords(&words), self.feed))
    }
}

/// `G90 G0` absolute rapid move restoring the given axis targets, or `None`
/// for an empty target list.
pub fn absolute_move(targets: &[(Axis, f64)]) -> Option<String> {
    if targets.is_empty() {
        return None;
    }
    Some(format!("G90 G0 {}", AxisWords(targets)))
}

/// Space-separated `X1.000`-style words, three decimals each.
struct AxisWords<'a>(&'a [(Axis, f64)]);

impl Display for AxisWords<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (axis, value) in self.0 {
            if first {
                first = false;
            } else {
                write!(f, " ")?;
            }
            write!(f, "{}{:.3}", axis.letter(), value)?;
        }
        Ok(())
    }
}
