//! Tier decay periods and the need catalog.
//!
//! Mirrors the `needs` section of `lifeweave-config.yaml`. Every field has a
//! default so an absent section yields the stock catalog. Crisis thresholds
//! live here rather than in the tracker so hosts can tune them per world.

use std::collections::BTreeSet;

use lifeweave_types::{NeedPolarity, NeedTier};
use serde::Deserialize;

use crate::error::NeedsError;

/// Configuration consumed by [`NeedsTracker`](crate::NeedsTracker).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NeedsConfig {
    /// Minutes of simulated time over which one `decay_rate` is applied, per tier.
    #[serde(default)]
    pub tier_periods: TierPeriods,

    /// Needs given to every newly spawned entity.
    #[serde(default = "default_catalog")]
    pub catalog: Vec<NeedSpec>,
}

impl Default for NeedsConfig {
    fn default() -> Self {
        Self {
            tier_periods: TierPeriods::default(),
            catalog: default_catalog(),
        }
    }
}

impl NeedsConfig {
    /// Check that periods are non-zero, values are in range, and keys are unique.
    ///
    /// # Errors
    ///
    /// Returns [`NeedsError::InvalidConfig`] describing the first problem found.
    pub fn validate(&self) -> Result<(), NeedsError> {
        for tier in [NeedTier::Survival, NeedTier::Security, NeedTier::Psychological] {
            if self.tier_periods.minutes_for(tier) == 0 {
                return Err(NeedsError::InvalidConfig {
                    reason: format!("tier {} decay period must be non-zero", tier.number()),
                });
            }
        }

        let mut seen = BTreeSet::new();
        for spec in &self.catalog {
            if !seen.insert(spec.key.as_str()) {
                return Err(NeedsError::InvalidConfig {
                    reason: format!("duplicate need key `{}`", spec.key),
                });
            }
            if spec.initial_value > 100 || spec.crisis.threshold > 100 {
                return Err(NeedsError::InvalidConfig {
                    reason: format!("need `{}` has a value outside 0..=100", spec.key),
                });
            }
        }
        Ok(())
    }

    /// Look up a catalog entry by key.
    pub fn spec(&self, key: &str) -> Option<&NeedSpec> {
        self.catalog.iter().find(|s| s.key == key)
    }
}

/// Decay time scale per tier, in minutes of simulated time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct TierPeriods {
    /// Tier 1 (default: 60, hourly).
    #[serde(default = "default_survival_minutes")]
    pub survival_minutes: u64,

    /// Tier 2 (default: 360).
    #[serde(default = "default_security_minutes")]
    pub security_minutes: u64,

    /// Tier 3 (default: 1440, daily).
    #[serde(default = "default_psychological_minutes")]
    pub psychological_minutes: u64,
}

impl Default for TierPeriods {
    fn default() -> Self {
        Self {
            survival_minutes: default_survival_minutes(),
            security_minutes: default_security_minutes(),
            psychological_minutes: default_psychological_minutes(),
        }
    }
}

impl TierPeriods {
    /// The decay period for `tier`.
    pub const fn minutes_for(&self, tier: NeedTier) -> u64 {
        match tier {
            NeedTier::Survival => self.survival_minutes,
            NeedTier::Security => self.security_minutes,
            NeedTier::Psychological => self.psychological_minutes,
        }
    }
}

/// One entry of the need catalog.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NeedSpec {
    /// Need key, unique within the catalog.
    pub key: String,
    /// Tier of the need.
    pub tier: NeedTier,
    /// Points drifted per tier period.
    pub decay_rate: u32,
    /// Value assigned at spawn.
    #[serde(default = "default_initial_value")]
    pub initial_value: u8,
    /// Where the crisis band begins.
    pub crisis: CrisisBand,
}

/// Crisis band boundary of a need.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct CrisisBand {
    /// Boundary value in `0..=100`.
    pub threshold: u8,
    /// Whether the need is in crisis below (depleting) or above (accumulating).
    #[serde(default)]
    pub polarity: NeedPolarity,
}

const fn default_survival_minutes() -> u64 {
    60
}

const fn default_security_minutes() -> u64 {
    360
}

const fn default_psychological_minutes() -> u64 {
    1440
}

const fn default_initial_value() -> u8 {
    80
}

fn spec(key: &str, tier: NeedTier, decay_rate: u32, threshold: u8) -> NeedSpec {
    NeedSpec {
        key: key.to_owned(),
        tier,
        decay_rate,
        initial_value: default_initial_value(),
        crisis: CrisisBand {
            threshold,
            polarity: NeedPolarity::Depleting,
        },
    }
}

fn default_catalog() -> Vec<NeedSpec> {
    vec![
        spec("hunger", NeedTier::Survival, 4, 20),
        spec("thirst", NeedTier::Survival, 6, 20),
        spec("rest", NeedTier::Survival, 3, 15),
        spec("safety", NeedTier::Security, 2, 25),
        spec("belonging", NeedTier::Security, 2, 25),
        spec("purpose", NeedTier::Psychological, 5, 30),
        spec("recognition", NeedTier::Psychological, 4, 30),
        NeedSpec {
            key: String::from("intimacy"),
            tier: NeedTier::Psychological,
            decay_rate: 3,
            initial_value: 20,
            crisis: CrisisBand {
                threshold: 75,
                polarity: NeedPolarity::Accumulating,
            },
        },
    ]
}
