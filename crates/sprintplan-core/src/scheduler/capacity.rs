//! Daily capacity constraints and the slack withheld from them.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Limits applied to every planned day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlanConstraints {
    /// Distinct context prefixes allowed on one day.
    #[serde(default = "default_max_contexts_per_day")]
    pub max_contexts_per_day: u32,
    /// Raw daily block capacity before slack is withheld.
    #[serde(default = "default_max_focus_blocks_per_day")]
    pub max_focus_blocks_per_day: u32,
    /// Fraction of capacity kept free, in `[0, 1]`.
    #[serde(default = "default_buffer_ratio")]
    pub buffer_ratio: f64,
}

fn default_max_contexts_per_day() -> u32 {
    2
}
fn default_max_focus_blocks_per_day() -> u32 {
    4
}
fn default_buffer_ratio() -> f64 {
    0.20
}

impl Default for PlanConstraints {
    fn default() -> Self {
        Self {
            max_contexts_per_day: default_max_contexts_per_day(),
            max_focus_blocks_per_day: default_max_focus_blocks_per_day(),
            buffer_ratio: default_buffer_ratio(),
        }
    }
}

impl PlanConstraints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_contexts(mut self, max: u32) -> Self {
        self.max_contexts_per_day = max;
        self
    }

    pub fn with_max_focus_blocks(mut self, max: u32) -> Self {
        self.max_focus_blocks_per_day = max;
        self
    }

    pub fn with_buffer_ratio(mut self, ratio: f64) -> Self {
        self.buffer_ratio = ratio;
        self
    }

    /// Reject constraints the builder cannot honor.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_focus_blocks_per_day == 0 {
            return Err(ValidationError::invalid(
                "max_focus_blocks_per_day",
                "must be at least 1",
            ));
        }
        if self.max_contexts_per_day == 0 {
            return Err(ValidationError::invalid("max_contexts_per_day", "must be at least 1"));
        }
        if !self.buffer_ratio.is_finite() || !(0.0..=1.0).contains(&self.buffer_ratio) {
            return Err(ValidationError::invalid(
                "buffer_ratio",
                format!("must be within [0, 1] (got {})", self.buffer_ratio),
            ));
        }
        Ok(())
    }

    /// Blocks withheld as slack each day; never less than one.
    ///
    /// Halves round to even, so 4 blocks at 0.625 withhold 2, not 3.
    pub fn buffer_blocks(&self) -> u32 {
        let raw = (self.max_focus_blocks_per_day as f64 * self.buffer_ratio).round_ties_even();
        (raw as u32).max(1)
    }

    /// Focus blocks the builder may fill each day; never less than one.
    pub fn focus_blocks_per_day(&self) -> u32 {
        self.max_focus_blocks_per_day
            .saturating_sub(self.buffer_blocks())
            .max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_leave_three_focus_blocks() {
        let c = PlanConstraints::default();
        assert_eq!(c.buffer_blocks(), 1);
        assert_eq!(c.focus_blocks_per_day(), 3);
    }

    #[test]
    fn half_buffer_of_two_leaves_one() {
        let c = PlanConstraints::new().with_max_focus_blocks(2).with_buffer_ratio(0.5);
        assert_eq!(c.buffer_blocks(), 1);
        assert_eq!(c.focus_blocks_per_day(), 1);
    }

    #[test]
    fn buffer_floor_is_one() {
        let c = PlanConstraints::new().with_max_focus_blocks(6).with_buffer_ratio(0.0);
        assert_eq!(c.buffer_blocks(), 1);
        assert_eq!(c.focus_blocks_per_day(), 5);
    }

    #[test]
    fn focus_floor_is_one() {
        let c = PlanConstraints::new().with_max_focus_blocks(1).with_buffer_ratio(1.0);
        assert_eq!(c.focus_blocks_per_day(), 1);
    }

    #[test]
    fn ties_round_to_even() {
        // 5 * 0.5 = 2.5 -> 2
        let c = PlanConstraints::new().with_max_focus_blocks(5).with_buffer_ratio(0.5);
        assert_eq!(c.buffer_blocks(), 2);
        assert_eq!(c.focus_blocks_per_day(), 3);
    }

    #[test]
    fn invalid_values_rejected() {
        assert!(PlanConstraints::new().with_buffer_ratio(1.5).validate().is_err());
        assert!(PlanConstraints::new().with_buffer_ratio(f64::NAN).validate().is_err());
        assert!(PlanConstraints::new().with_max_focus_blocks(0).validate().is_err());
        assert!(PlanConstraints::new().with_max_contexts(0).validate().is_err());
        assert!(PlanConstraints::default().validate().is_ok());
    }
}
