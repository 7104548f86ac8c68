//! Numeric status values such as affection or trust.

use serde::{Deserialize, Serialize};

use crate::simulation::{ordered_bounds, StatusDef};

/// A bounded status value. `min <= current <= max` holds after every mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusValue {
    pub name: String,
    current: f64,
    min: f64,
    max: f64,
    pub description: String,
}

impl StatusValue {
    /// Create a status value; bounds are put in order and `current` is clamped into range.
    pub fn new(name: impl Into<String>, min: f64, max: f64, current: f64) -> Self {
        let mut value = Self {
            name: name.into(),
            current,
            min,
            max,
            description: String::new(),
        };
        value.normalize();
        value
    }

    /// Create a status value at its configured default.
    pub fn from_def(def: &StatusDef) -> Self {
        Self::new(def.name.clone(), def.min, def.max, def.default)
            .with_description(def.description.clone())
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn current(&self) -> f64 {
        self.current
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    /// Restore `min <= current <= max`, e.g. after deserializing an edited snapshot.
    ///
    /// Swapped bounds are put back in order and a NaN value falls to the lower bound.
    /// Returns whether anything changed.
    pub fn normalize(&mut self) -> bool {
        let (min, max) = ordered_bounds(self.min, self.max);
        let current = if self.current.is_nan() {
            min
        } else {
            self.current.clamp(min, max)
        };
        let changed = (min, max, current) != (self.min, self.max, self.current);
        self.min = min;
        self.max = max;
        self.current = current;
        changed
    }

    /// Set the value, clamped into range.
    pub fn set(&mut self, value: f64) {
        if value.is_nan() {
            return;
        }
        self.current = value.clamp(self.min, self.max);
    }

    /// Add a (possibly negative) delta, clamping the result.
    ///
    /// Returns the change actually applied after clamping.
    pub fn apply(&mut self, delta: f64) -> f64 {
        let before = self.current;
        self.set(before + delta);
        self.current - before
    }

    /// Whether the value sits inside its bounds.
    pub fn in_bounds(&self) -> bool {
        self.min <= self.current && self.current <= self.max
    }

    /// Position of the value within its range, from 0.0 to 1.0.
    pub fn ratio(&self) -> f64 {
        let span = self.max - self.min;
        if span > 0.0 {
            (self.current - self.min) / span
        } else {
            1.0
        }
    }
}

/// Render a status number without a trailing `.0` for whole values.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{:.2}", value)
            .trim_end_matches('0')
            .trim_end_matches('.')
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_clamps_current() {
        let value = StatusValue::new("affection", 0.0, 100.0, 140.0);
        assert_eq!(value.current(), 100.0);

        let value = StatusValue::new("affection", 0.0, 100.0, -1.0);
        assert_eq!(value.current(), 0.0);
    }

    #[test]
    fn test_apply_clamps_and_reports_change() {
        let mut value = StatusValue::new("affection", 0.0, 100.0, 95.0);

        let applied = value.apply(10.0);
        assert_eq!(value.current(), 100.0);
        assert_eq!(applied, 5.0);

        let applied = value.apply(-250.0);
        assert_eq!(value.current(), 0.0);
        assert_eq!(applied, -100.0);
        assert!(value.in_bounds());
    }

    #[test]
    fn test_from_def_uses_default() {
        let def = StatusDef::new("trust", 0.0, 10.0)
            .with_default(3.0)
            .with_description("Trust");
        let value = StatusValue::from_def(&def);

        assert_eq!(value.current(), 3.0);
        assert_eq!(value.description, "Trust");
    }

    #[test]
    fn test_nan_is_ignored() {
        let mut value = StatusValue::new("trust", 0.0, 10.0, 4.0);
        value.set(f64::NAN);
        assert_eq!(value.current(), 4.0);
    }

    #[test]
    fn test_swapped_bounds_are_ordered() {
        let value = StatusValue::new("trust", 10.0, 0.0, 40.0);
        assert_eq!((value.min(), value.max(), value.current()), (0.0, 10.0, 10.0));

        let value = StatusValue::new("trust", f64::NAN, 5.0, f64::NAN);
        assert_eq!((value.min(), value.max(), value.current()), (5.0, 5.0, 5.0));
        assert!(value.in_bounds());
    }

    #[test]
    fn test_ratio() {
        let value = StatusValue::new("mood", -10.0, 10.0, 0.0);
        assert!((value.ratio() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(100.0), "100");
        assert_eq!(format_number(-3.0), "-3");
        assert_eq!(format_number(2.5), "2.5");
        assert_eq!(format_number(1.0 / 3.0), "0.33");
    }
}
