use crate::core::vehicle::AIR_DENSITY;
use crate::error::RaceError;
use serde::Deserialize;
use std::collections::BTreeMap;

/// (s) Largest simulated time a single engine step may advance.
pub const DT_MAX: f64 = 0.1;

/// * `eta` - (-) Learning rate of a skill
/// * `target` - (-) Skill value at which the regular learning progress vanishes
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct ProgressionPars {
    pub eta: f64,
    pub target: f64,
}

/// Physics, incident and progression tuning of the engine. Every field has a default, so a
/// constants file only needs to contain the values it changes.
///
/// * `use_rolling_resistance` - Subtract rolling resistance on straights
/// * `c_rr` - (-) Rolling resistance coefficient
/// * `air_density` - (kg/m^3) Air density
/// * `error_rate_base` - (-) Base probability of a minor incident per tick and unit load
/// * `minor_penalty_range` - (s) Time penalty range of a minor incident
/// * `major_mistakes` - Enable the rare major incident trial
/// * `major_mistake_rate` - (-) Probability of a major incident per tick
/// * `major_penalty_range` - (s) Time penalty range of a major incident
/// * `dt_max` - (s) Maximum timestep size
/// * `corner_speed_bounds` - Lower and upper clamp of the corner target speed
/// * `segment_tick_interval` - (s) Dwell time on one segment between two progress events
/// * `xp_per_km` - Experience gained per driven kilometre
/// * `progression` - Learning parameters per skill name, "consistency" is the fallback
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SimConstants {
    pub use_rolling_resistance: bool,
    pub c_rr: f64,
    pub air_density: f64,
    pub error_rate_base: f64,
    pub minor_penalty_range: [f64; 2],
    pub major_mistakes: bool,
    pub major_mistake_rate: f64,
    pub major_penalty_range: [f64; 2],
    pub dt_max: f64,
    pub corner_speed_bounds: [f64; 2],
    pub segment_tick_interval: f64,
    pub xp_per_km: f64,
    pub progression: BTreeMap<String, ProgressionPars>,
}

impl Default for SimConstants {
    fn default() -> Self {
        let mut progression = BTreeMap::new();
        progression.insert(
            "braking".to_owned(),
            ProgressionPars {
                eta: 0.60,
                target: 92.0,
            },
        );
        progression.insert(
            "consistency".to_owned(),
            ProgressionPars {
                eta: 0.40,
                target: 88.0,
            },
        );
        progression.insert(
            "stress".to_owned(),
            ProgressionPars {
                eta: 0.50,
                target: 94.0,
            },
        );

        SimConstants {
            use_rolling_resistance: true,
            c_rr: 0.012,
            air_density: AIR_DENSITY,
            error_rate_base: 0.002,
            minor_penalty_range: [0.10, 0.35],
            major_mistakes: true,
            major_mistake_rate: 0.0003,
            major_penalty_range: [1.2, 3.0],
            dt_max: DT_MAX,
            corner_speed_bounds: [12.0, 120.0],
            segment_tick_interval: 7.5,
            xp_per_km: 1.0,
            progression,
        }
    }
}

impl SimConstants {
    /// The method returns the learning parameters of a skill, falling back to the
    /// "consistency" entry for skills without their own entry.
    pub fn progression_for(&self, skill: &str) -> Option<ProgressionPars> {
        self.progression
            .get(skill)
            .or_else(|| self.progression.get("consistency"))
            .copied()
    }

    pub fn validate(&self) -> Result<(), RaceError> {
        let ranges = [
            ("minor_penalty_range", self.minor_penalty_range),
            ("major_penalty_range", self.major_penalty_range),
            ("corner_speed_bounds", self.corner_speed_bounds),
        ];
        for (label, [lo, hi]) in ranges.iter() {
            if !lo.is_finite() || !hi.is_finite() || lo > hi || *lo < 0.0 {
                return Err(RaceError::Configuration(format!(
                    "{} must be an ascending non-negative range, is [{}, {}]",
                    label, lo, hi
                )));
            }
        }

        let positives = [
            ("air_density", self.air_density),
            ("dt_max", self.dt_max),
            ("segment_tick_interval", self.segment_tick_interval),
        ];
        for (label, value) in positives.iter() {
            if !value.is_finite() || *value <= 0.0 {
                return Err(RaceError::Configuration(format!(
                    "{} must be positive, is {}",
                    label, value
                )));
            }
        }

        let rates = [
            ("c_rr", self.c_rr),
            ("error_rate_base", self.error_rate_base),
            ("major_mistake_rate", self.major_mistake_rate),
            ("xp_per_km", self.xp_per_km),
        ];
        for (label, value) in rates.iter() {
            if !value.is_finite() || *value < 0.0 {
                return Err(RaceError::Configuration(format!(
                    "{} must not be negative, is {}",
                    label, value
                )));
            }
        }

        match self.progression.get("consistency") {
            Some(pars) if pars.target > 0.0 => Ok(()),
            Some(pars) => Err(RaceError::Configuration(format!(
                "progression target must be positive, is {}",
                pars.target
            ))),
            None => Err(RaceError::Configuration(
                "progression table needs a consistency entry".to_owned(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(SimConstants::default().validate().is_ok());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let consts: SimConstants =
            serde_json::from_str(r#"{"error_rate_base": 0.0, "major_mistakes": false}"#).unwrap();
        assert_eq!(consts.error_rate_base, 0.0);
        assert!(!consts.major_mistakes);
        assert_eq!(consts.dt_max, DT_MAX);
        assert!(consts.progression.contains_key("stress"));
    }

    #[test]
    fn unknown_skill_uses_consistency_pars() {
        let consts = SimConstants::default();
        assert_eq!(
            consts.progression_for("cornering"),
            consts.progression_for("consistency")
        );
    }

    #[test]
    fn inverted_penalty_range_is_rejected() {
        let consts = SimConstants {
            minor_penalty_range: [0.5, 0.1],
            ..SimConstants::default()
        };
        assert!(matches!(
            consts.validate(),
            Err(RaceError::Configuration(_))
        ));
    }
}
