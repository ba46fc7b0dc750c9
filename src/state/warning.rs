//! Warning thresholds and the policy deciding when they are crossed

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, MAX_THRESHOLD_MINUTES, MIN_THRESHOLD_MINUTES};

/// Validated pair of warning thresholds in minutes
///
/// The only way to obtain one is [`WarningThresholds::new`], so every value in
/// circulation satisfies `1 <= first < second <= 120`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawThresholds", into = "RawThresholds")]
pub struct WarningThresholds {
    first: u32,
    second: u32,
}

impl WarningThresholds {
    /// Validate and build a threshold pair
    pub fn new(first: u32, second: u32) -> Result<Self, ConfigError> {
        check_range("first", first)?;
        check_range("second", second)?;
        if second <= first {
            return Err(ConfigError::ThresholdOrder { first, second });
        }
        Ok(Self { first, second })
    }

    pub fn first(&self) -> u32 {
        self.first
    }

    pub fn second(&self) -> u32 {
        self.second
    }
}

impl Default for WarningThresholds {
    fn default() -> Self {
        Self {
            first: 10,
            second: 20,
        }
    }
}

fn check_range(which: &'static str, minutes: u32) -> Result<(), ConfigError> {
    if (MIN_THRESHOLD_MINUTES..=MAX_THRESHOLD_MINUTES).contains(&minutes) {
        Ok(())
    } else {
        Err(ConfigError::ThresholdOutOfRange { which, minutes })
    }
}

#[derive(Serialize, Deserialize)]
struct RawThresholds {
    first_minutes: u32,
    second_minutes: u32,
}

impl TryFrom<RawThresholds> for WarningThresholds {
    type Error = ConfigError;

    fn try_from(raw: RawThresholds) -> Result<Self, Self::Error> {
        Self::new(raw.first_minutes, raw.second_minutes)
    }
}

impl From<WarningThresholds> for RawThresholds {
    fn from(t: WarningThresholds) -> Self {
        Self {
            first_minutes: t.first,
            second_minutes: t.second,
        }
    }
}

/// Thresholds newly crossed by one evaluation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Crossings {
    pub first: bool,
    pub second: bool,
}

impl Crossings {
    pub fn any(&self) -> bool {
        self.first || self.second
    }
}

/// Decide which warnings are newly crossed at `elapsed_minutes`
pub fn evaluate(
    elapsed_minutes: u64,
    thresholds: WarningThresholds,
    already_first: bool,
    already_second: bool,
) -> Crossings {
    Crossings {
        first: !already_first && elapsed_minutes >= u64::from(thresholds.first),
        second: !already_second && elapsed_minutes >= u64::from(thresholds.second),
    }
}
