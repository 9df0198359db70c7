//! Need decay, crisis episodes, and satisfaction.
//!
//! Decay for one need over `m` elapsed minutes is
//!
//! ```text
//! points = (remainder + decay_rate * modifier_pct * m) / (100 * tier_period)
//! ```
//!
//! with the division remainder carried on the need so that many short
//! intervals add up to the same drift as one long one. Values are clamped to
//! `0..=100`; a modifier scales the drift and nothing else.
//!
//! A crisis is emitted once per episode: the first time a need is observed
//! inside its crisis band with its episode flag clear. The flag is cleared
//! by [`NeedsTracker::satisfy`] or when the value leaves the band.

use lifeweave_types::{EntityId, EntityNeeds, NEED_MAX, Need, NeedCrisis, NeedPolarity, Severity};
use tracing::debug;

use crate::config::NeedsConfig;
use crate::error::NeedsError;

/// Applies decay and satisfaction to entity needs.
#[derive(Debug, Clone)]
pub struct NeedsTracker {
    config: NeedsConfig,
}

impl NeedsTracker {
    /// Create a tracker after validating the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`NeedsError::InvalidConfig`] if the configuration is inconsistent.
    pub fn new(config: NeedsConfig) -> Result<Self, NeedsError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The active configuration.
    pub const fn config(&self) -> &NeedsConfig {
        &self.config
    }

    /// Build the starting needs of a freshly spawned entity from the catalog.
    pub fn spawn_needs(&self, entity_id: EntityId, turn: u64) -> EntityNeeds {
        let mut needs = EntityNeeds::empty(entity_id);
        for spec in &self.config.catalog {
            needs.needs.insert(
                spec.key.clone(),
                Need {
                    key: spec.key.clone(),
                    tier: spec.tier,
                    value: spec.initial_value.min(NEED_MAX),
                    decay_rate: spec.decay_rate,
                    polarity: spec.crisis.polarity,
                    crisis_threshold: spec.crisis.threshold,
                    crisis_flagged: false,
                    decay_remainder: 0,
                    last_satisfied_turn: Some(turn),
                },
            );
        }
        needs
    }

    /// Apply `elapsed_minutes` of decay to every need and collect new crises.
    ///
    /// Crises are returned in need-key order. A need already flagged for the
    /// current episode produces no further crisis until it is satisfied.
    ///
    /// # Errors
    ///
    /// Returns [`NeedsError::ArithmeticOverflow`] if the decay computation
    /// overflows (absurdly large `elapsed_minutes` or rates). On error the
    /// needs may be partially advanced and should be discarded by the caller.
    pub fn advance(
        &self,
        needs: &mut EntityNeeds,
        elapsed_minutes: u64,
    ) -> Result<Vec<NeedCrisis>, NeedsError> {
        let EntityNeeds {
            entity_id,
            needs: map,
            decay_modifiers,
        } = needs;

        let mut crises = Vec::new();
        for (key, need) in map.iter_mut() {
            let pct = decay_modifiers.get(key).copied().unwrap_or(100);
            self.apply_decay(need, pct, elapsed_minutes)?;

            if !need.in_crisis() {
                need.crisis_flagged = false;
                continue;
            }
            if need.crisis_flagged {
                continue;
            }

            need.crisis_flagged = true;
            let severity = need.crisis_severity().unwrap_or(Severity::Minor);
            debug!(
                entity = %entity_id,
                need = %key,
                value = need.value,
                severity = ?severity,
                "need entered crisis band"
            );
            crises.push(NeedCrisis {
                entity_id: *entity_id,
                need_key: key.clone(),
                tier: need.tier,
                severity,
                value: need.value,
            });
        }
        Ok(crises)
    }

    /// Move a need away from its crisis band by `amount` and end its episode.
    ///
    /// Depleting needs rise, accumulating needs fall; both clamp to
    /// `0..=100`. Returns the new value.
    ///
    /// # Errors
    ///
    /// Returns [`NeedsError::NeedNotFound`] if the entity has no such need.
    pub fn satisfy(
        &self,
        needs: &mut EntityNeeds,
        key: &str,
        amount: u8,
        turn: u64,
    ) -> Result<u8, NeedsError> {
        let entity_id = needs.entity_id;
        let need = needs
            .needs
            .get_mut(key)
            .ok_or_else(|| NeedsError::NeedNotFound {
                entity_id,
                key: key.to_owned(),
            })?;

        need.value = match need.polarity {
            NeedPolarity::Depleting => need.value.saturating_add(amount).min(NEED_MAX),
            NeedPolarity::Accumulating => need.value.min(NEED_MAX).saturating_sub(amount),
        };
        need.last_satisfied_turn = Some(turn);
        need.crisis_flagged = false;

        debug!(entity = %entity_id, need = key, value = need.value, turn, "need satisfied");
        Ok(need.value)
    }

    /// Set the decay modifier (percent, 100 = neutral) for one need.
    ///
    /// # Errors
    ///
    /// Returns [`NeedsError::NeedNotFound`] if the entity has no such need.
    pub fn set_modifier(
        &self,
        needs: &mut EntityNeeds,
        key: &str,
        pct: u32,
    ) -> Result<(), NeedsError> {
        if !needs.needs.contains_key(key) {
            return Err(NeedsError::NeedNotFound {
                entity_id: needs.entity_id,
                key: key.to_owned(),
            });
        }
        needs.decay_modifiers.insert(key.to_owned(), pct);
        Ok(())
    }

    fn apply_decay(
        &self,
        need: &mut Need,
        pct: u32,
        elapsed_minutes: u64,
    ) -> Result<(), NeedsError> {
        need.value = need.value.min(NEED_MAX);

        let period = self.config.tier_periods.minutes_for(need.tier);
        let denominator = period
            .checked_mul(100)
            .filter(|d| *d > 0)
            .ok_or_else(|| overflow("tier period scaling"))?;

        let drift = u64::from(need.decay_rate)
            .checked_mul(u64::from(pct))
            .and_then(|d| d.checked_mul(elapsed_minutes))
            .and_then(|d| d.checked_add(need.decay_remainder))
            .ok_or_else(|| overflow("decay drift"))?;

        let points = drift
            .checked_div(denominator)
            .ok_or_else(|| overflow("decay points"))?;
        need.decay_remainder = drift
            .checked_rem(denominator)
            .ok_or_else(|| overflow("decay remainder"))?;

        let step = u8::try_from(points.min(u64::from(NEED_MAX))).unwrap_or(NEED_MAX);
        need.value = match need.polarity {
            NeedPolarity::Depleting => need.value.saturating_sub(step),
            NeedPolarity::Accumulating => need.value.saturating_add(step).min(NEED_MAX),
        };

        let at_bound = match need.polarity {
            NeedPolarity::Depleting => need.value == 0,
            NeedPolarity::Accumulating => need.value == NEED_MAX,
        };
        if at_bound {
            need.decay_remainder = 0;
        }
        Ok(())
    }
}

fn overflow(context: &str) -> NeedsError {
    NeedsError::ArithmeticOverflow {
        context: context.to_owned(),
    }
}
