use crate::error::RaceError;
use crate::pre::sim_constants::SimConstants;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Skill value every new driver starts with.
pub const DEFAULT_SKILL: f64 = 70.0;
pub const MAX_SKILL: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Skill {
    Braking,
    Consistency,
    Stress,
    Throttle,
    Cornering,
    Starts,
}

impl Skill {
    pub const ALL: [Skill; 6] = [
        Skill::Braking,
        Skill::Consistency,
        Skill::Stress,
        Skill::Throttle,
        Skill::Cornering,
        Skill::Starts,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Skill::Braking => "braking",
            Skill::Consistency => "consistency",
            Skill::Stress => "stress",
            Skill::Throttle => "throttle",
            Skill::Cornering => "cornering",
            Skill::Starts => "starts",
        }
    }
}

impl fmt::Display for Skill {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.pad(self.name())
    }
}

/// SkillGain describes the change of one skill after a race.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SkillGain {
    pub skill: Skill,
    pub delta: f64,
    pub new: f64,
}

/// DriverProfile is the persistable progression state of a driver. The core only ever reads
/// and returns snapshots of it, storing them is up to the caller.
///
/// * `id` - Driver id, equal to the user id
/// * `name` - Driver name
/// * `braking` ... `starts` - Skills in [0, 100]
/// * `experience` - Accumulated experience points
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverProfile {
    pub id: String,
    pub name: String,
    pub braking: f64,
    pub consistency: f64,
    pub stress: f64,
    pub throttle: f64,
    pub cornering: f64,
    pub starts: f64,
    #[serde(default, alias = "xp")]
    pub experience: f64,
}

impl DriverProfile {
    pub fn default_for(id: &str, name: &str) -> DriverProfile {
        DriverProfile {
            id: id.to_owned(),
            name: name.to_owned(),
            braking: DEFAULT_SKILL,
            consistency: DEFAULT_SKILL,
            stress: DEFAULT_SKILL,
            throttle: DEFAULT_SKILL,
            cornering: DEFAULT_SKILL,
            starts: DEFAULT_SKILL,
            experience: 0.0,
        }
    }

    pub fn to_json(&self) -> Result<String, RaceError> {
        serde_json::to_string(self)
            .map_err(|e| RaceError::Configuration(format!("could not encode driver profile: {}", e)))
    }

    pub fn from_json(s: &str) -> Result<DriverProfile, RaceError> {
        let driver: DriverProfile = serde_json::from_str(s).map_err(|e| {
            RaceError::Configuration(format!("could not decode driver profile: {}", e))
        })?;
        driver.validate()?;
        Ok(driver)
    }

    /// validate checks that every skill is in [0, MAX_SKILL] and the experience is finite and
    /// not negative.
    pub fn validate(&self) -> Result<(), RaceError> {
        for &skill in Skill::ALL.iter() {
            let value = self.skill(skill);
            if !(0.0..=MAX_SKILL).contains(&value) {
                return Err(RaceError::Configuration(format!(
                    "driver {} has invalid {} skill: {}",
                    self.id, skill, value
                )));
            }
        }
        if !self.experience.is_finite() || self.experience < 0.0 {
            return Err(RaceError::Configuration(format!(
                "driver {} has invalid experience: {}",
                self.id, self.experience
            )));
        }
        Ok(())
    }

    pub fn skill(&self, skill: Skill) -> f64 {
        match skill {
            Skill::Braking => self.braking,
            Skill::Consistency => self.consistency,
            Skill::Stress => self.stress,
            Skill::Throttle => self.throttle,
            Skill::Cornering => self.cornering,
            Skill::Starts => self.starts,
        }
    }

    fn skill_mut(&mut self, skill: Skill) -> &mut f64 {
        match skill {
            Skill::Braking => &mut self.braking,
            Skill::Consistency => &mut self.consistency,
            Skill::Stress => &mut self.stress,
            Skill::Throttle => &mut self.throttle,
            Skill::Cornering => &mut self.cornering,
            Skill::Starts => &mut self.starts,
        }
    }

    /// update_after_race applies the progression of a finished race to all skills and the
    /// experience. It returns the gain of every skill in the order of `Skill::ALL`, including
    /// zero gains of skills that already reached the maximum.
    pub fn update_after_race(
        &mut self,
        km_driven: f64,
        incidents: u32,
        clean_corners: u32,
        sim_consts: &SimConstants,
    ) -> Result<Vec<SkillGain>, RaceError> {
        self.validate()?;
        self.experience += km_driven * sim_consts.xp_per_km;

        let perf = performance(clean_corners, incidents);
        let mut gains = Vec::with_capacity(Skill::ALL.len());

        for &skill in Skill::ALL.iter() {
            let pars = sim_consts.progression_for(skill.name()).ok_or_else(|| {
                RaceError::Configuration(format!("no progression parameters for {}", skill))
            })?;

            let cur = self.skill(skill);
            let delta = (pars.eta * (1.0 - cur / pars.target) * (0.25 + 0.75 * perf)).clamp(0.05, 1.2);
            let new = (cur + delta).min(MAX_SKILL);
            *self.skill_mut(skill) = new;

            gains.push(SkillGain {
                skill,
                delta: new - cur,
                new,
            });
        }

        Ok(gains)
    }
}

/// Race performance in [0.7, 1.3] derived from the share of clean corner ticks.
pub fn performance(clean_corners: u32, incidents: u32) -> f64 {
    let total = (clean_corners + incidents).max(1);
    0.7 + 0.6 * clean_corners as f64 / total as f64
}
