use crate::post::race_result::ParticipantOutcome;
use helpers::general::{argsort, SortOrder};
use std::fmt::Write;
use std::io::Write as IoWrite;
use std::path::Path;

/// (s) Time deltas up to this value are shown as leader.
const LEADER_TOLERANCE: f64 = 1e-4;

#[derive(Debug, Clone, PartialEq)]
pub struct StandingEntry {
    pub position: usize,
    pub user_id: String,
    pub name: String,
    /// (s)
    pub total_time: f64,
    /// (s) Gap to the leader, 0.0 for the leader itself
    pub delta: f64,
    pub incident_count: u32,
}

impl StandingEntry {
    pub fn is_leader(&self) -> bool {
        self.delta <= LEADER_TOLERANCE
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FailedEntry {
    pub user_id: String,
    pub name: String,
    pub error: String,
}

/// Standings is the ranked view on the outcomes of a lobby race. Finished participants are
/// sorted by total time, equal times keep the order of the outcome list.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Standings {
    pub finished: Vec<StandingEntry>,
    pub failed: Vec<FailedEntry>,
}

impl Standings {
    pub fn from_outcomes(outcomes: &[ParticipantOutcome]) -> Standings {
        let finished_outcomes: Vec<&ParticipantOutcome> =
            outcomes.iter().filter(|o| o.summary().is_some()).collect();
        let times: Vec<f64> = finished_outcomes
            .iter()
            .filter_map(|o| o.summary().map(|s| s.total_time))
            .collect();

        let idxs_sorted = argsort(&times, SortOrder::Ascending);
        let t_leader = idxs_sorted.first().map(|&i| times[i]).unwrap_or(0.0);

        let finished = idxs_sorted
            .iter()
            .enumerate()
            .filter_map(|(pos, &i)| {
                let outcome = finished_outcomes[i];
                outcome.summary().map(|summary| StandingEntry {
                    position: pos + 1,
                    user_id: outcome.user_id.to_owned(),
                    name: outcome.name.to_owned(),
                    total_time: summary.total_time,
                    delta: summary.total_time - t_leader,
                    incident_count: summary.incident_count,
                })
            })
            .collect();

        let failed = outcomes
            .iter()
            .filter_map(|o| {
                o.error().map(|error| FailedEntry {
                    user_id: o.user_id.to_owned(),
                    name: o.name.to_owned(),
                    error: error.to_owned(),
                })
            })
            .collect();

        Standings { finished, failed }
    }

    pub fn leader(&self) -> Option<&StandingEntry> {
        self.finished.first()
    }

    /// format_standings returns the standings as text, one participant per line.
    pub fn format_standings(&self, title: &str) -> Result<String, std::fmt::Error> {
        let mut content = String::new();
        writeln!(&mut content, "RESULT: {}", title)?;

        for entry in self.finished.iter() {
            let diff = if entry.is_leader() {
                "leader".to_owned()
            } else {
                format!("+{:.2}s", entry.delta)
            };
            writeln!(
                &mut content,
                "{:2}. {:<20} {:9.2}s ({}), {} incidents",
                entry.position, entry.name, entry.total_time, diff, entry.incident_count
            )?;
        }

        for entry in self.failed.iter() {
            writeln!(&mut content, "    {:<20} failed: {}", entry.name, entry.error)?;
        }

        Ok(content)
    }

    /// print_standings prints the standings to the console output.
    pub fn print_standings(&self, title: &str) {
        match self.format_standings(title) {
            Ok(content) => print!("{}", content),
            Err(e) => tracing::warn!("could not format standings: {}", e),
        }
    }

    /// write_standings_to_file writes the standings to a text file. Missing parent directories
    /// are created.
    pub fn write_standings_to_file(&self, title: &str, path: &Path) -> anyhow::Result<()> {
        let content = self.format_standings(title)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(path)?;
        file.write_all(content.as_bytes())?;
        file.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::driver::DriverProfile;
    use crate::post::race_result::{RaceReport, RaceSummary};
    use approx::assert_relative_eq;

    fn finished(user_id: &str, total_time: f64) -> ParticipantOutcome {
        ParticipantOutcome::finished(
            user_id,
            &user_id.to_uppercase(),
            RaceReport {
                summary: RaceSummary {
                    total_time,
                    total_distance_km: 1.0,
                    incident_count: 0,
                    clean_corner_count: 10,
                    penalty_log: vec![],
                },
                skill_gains: vec![],
                profile: DriverProfile::default_for(user_id, user_id),
            },
        )
    }

    #[test]
    fn leader_and_deltas() {
        let outcomes = vec![finished("a", 12.3), finished("b", 11.8), finished("c", 12.3)];
        let standings = Standings::from_outcomes(&outcomes);

        let leader = standings.leader().unwrap();
        assert_eq!(leader.user_id, "b");
        assert_relative_eq!(leader.delta, 0.0);
        assert!(leader.is_leader());

        let others: Vec<&StandingEntry> = standings.finished.iter().skip(1).collect();
        assert_eq!(others[0].user_id, "a");
        assert_eq!(others[1].user_id, "c");
        for entry in others {
            assert_relative_eq!(entry.delta, 0.5, epsilon = 1e-9);
            assert!(!entry.is_leader());
        }
    }

    #[test]
    fn failed_entries_are_kept_apart() {
        let outcomes = vec![
            finished("a", 20.0),
            ParticipantOutcome::failed("x", "X", "configuration error: vehicle x has invalid mass: 0"),
            finished("b", 19.0),
        ];
        let standings = Standings::from_outcomes(&outcomes);
        assert_eq!(standings.finished.len(), 2);
        assert_eq!(standings.failed.len(), 1);
        assert_eq!(standings.failed[0].user_id, "x");

        let text = standings.format_standings("Lobby abc").unwrap();
        assert!(text.contains("leader"));
        assert!(text.contains("+1.00s"));
        assert!(text.contains("failed: configuration error"));
    }

    #[test]
    fn no_finishers_means_no_leader() {
        let outcomes = vec![ParticipantOutcome::failed("x", "X", "boom")];
        let standings = Standings::from_outcomes(&outcomes);
        assert!(standings.leader().is_none());
    }
}
