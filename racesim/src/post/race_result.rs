use crate::core::driver::{DriverProfile, SkillGain};
use crate::core::race_state::PenaltyRecord;
use serde::{Deserialize, Serialize};

/// RaceSummary is the final result of one simulated race.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceSummary {
    /// (s) Driving time plus all penalties
    pub total_time: f64,
    pub total_distance_km: f64,
    pub incident_count: u32,
    pub clean_corner_count: u32,
    pub penalty_log: Vec<PenaltyRecord>,
}

/// RaceReport bundles the summary of a race with the progression it caused.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceReport {
    pub summary: RaceSummary,
    pub skill_gains: Vec<SkillGain>,
    /// Driver profile after the progression was applied
    pub profile: DriverProfile,
}

/// Outcome of a single lobby participant: a report, or the error that ended its race.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Finished(RaceReport),
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantOutcome {
    pub user_id: String,
    pub name: String,
    pub outcome: Outcome,
}

impl ParticipantOutcome {
    pub fn finished(user_id: &str, name: &str, report: RaceReport) -> ParticipantOutcome {
        ParticipantOutcome {
            user_id: user_id.to_owned(),
            name: name.to_owned(),
            outcome: Outcome::Finished(report),
        }
    }

    pub fn failed(user_id: &str, name: &str, error: impl ToString) -> ParticipantOutcome {
        ParticipantOutcome {
            user_id: user_id.to_owned(),
            name: name.to_owned(),
            outcome: Outcome::Failed {
                error: error.to_string(),
            },
        }
    }

    pub fn summary(&self) -> Option<&RaceSummary> {
        match &self.outcome {
            Outcome::Finished(report) => Some(&report.summary),
            Outcome::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            Outcome::Finished(_) => None,
            Outcome::Failed { error } => Some(error),
        }
    }
}
