use crate::interfaces::event_sink::Severity;
use serde::{Deserialize, Serialize};

/// PenaltyRecord is one entry of the penalty log of a race.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PenaltyRecord {
    pub severity: Severity,
    pub delta_s: f64,
    pub segment: String,
    pub load: f64,
}

/// Transition is the result of advancing the race progress by one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The car is still on the same segment.
    None,
    /// The car entered the segment with the contained index.
    Segment(usize),
    /// The car completed the contained lap; `finished` is set on the last lap.
    Lap { completed: u32, finished: bool },
}

/// RaceState holds the mutable progress of a single race. It is owned by exactly one engine.
#[derive(Debug, Clone)]
pub struct RaceState {
    pub lap: u32,
    pub segment_index: usize,
    /// (m/s)
    pub speed: f64,
    /// (m)
    pub distance_into_segment: f64,
    /// (s) Includes incident penalties.
    pub total_time: f64,
    pub incident_count: u32,
    pub clean_corner_count: u32,
    pub penalty_log: Vec<PenaltyRecord>,
    pub finished: bool,
    // total_time at the last segment event, used for the segment tick pacing
    t_last_segment_event: f64,
}

impl Default for RaceState {
    fn default() -> Self {
        RaceState {
            lap: 1,
            segment_index: 0,
            speed: 1.0,
            distance_into_segment: 0.0,
            total_time: 0.0,
            incident_count: 0,
            clean_corner_count: 0,
            penalty_log: Vec::new(),
            finished: false,
            t_last_segment_event: 0.0,
        }
    }
}

impl RaceState {
    /// integrate applies the acceleration of the current step: the speed is floored at 0.1 m/s
    /// and the car moves with the new speed for dt.
    pub fn integrate(&mut self, accel: f64, dt: f64) {
        self.speed = (self.speed + accel * dt).max(0.1);
        self.distance_into_segment += self.speed * dt;
        self.total_time += dt;
    }

    pub fn add_penalty(&mut self, record: PenaltyRecord) {
        self.total_time += record.delta_s;
        self.incident_count += 1;
        self.penalty_log.push(record);
    }

    /// segment_tick_due returns true if the car stayed on its segment for at least `interval`
    /// seconds since the last segment event and restarts the dwell timer in that case.
    pub fn segment_tick_due(&mut self, interval: f64) -> bool {
        if self.total_time - self.t_last_segment_event >= interval {
            self.t_last_segment_event = self.total_time;
            true
        } else {
            false
        }
    }

    /// advance moves the car to the next segment if it passed the end of the current one. The
    /// excess distance is carried over; passing the last segment completes a lap.
    pub fn advance(&mut self, segment_length: f64, no_segments: usize, tot_no_laps: u32) -> Transition {
        if self.distance_into_segment < segment_length {
            return Transition::None;
        }

        self.distance_into_segment -= segment_length;
        self.segment_index += 1;
        self.t_last_segment_event = self.total_time;

        if self.segment_index < no_segments {
            return Transition::Segment(self.segment_index);
        }

        self.segment_index = 0;
        self.lap += 1;
        if self.lap > tot_no_laps {
            self.finished = true;
        }

        Transition::Lap {
            completed: self.lap - 1,
            finished: self.finished,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_carries_excess_distance() {
        let mut state = RaceState::default();
        state.distance_into_segment = 105.0;
        assert_eq!(state.advance(100.0, 3, 1), Transition::Segment(1));
        assert!((state.distance_into_segment - 5.0).abs() < 1e-12);
        assert_eq!(state.advance(100.0, 3, 1), Transition::None);
    }

    #[test]
    fn wrap_completes_lap_and_finishes() {
        let mut state = RaceState::default();
        state.segment_index = 1;
        state.distance_into_segment = 50.0;
        assert_eq!(
            state.advance(50.0, 2, 2),
            Transition::Lap {
                completed: 1,
                finished: false
            }
        );

        state.segment_index = 1;
        state.distance_into_segment = 50.0;
        assert_eq!(
            state.advance(50.0, 2, 2),
            Transition::Lap {
                completed: 2,
                finished: true
            }
        );
        assert!(state.finished);
    }

    #[test]
    fn transition_restarts_tick_timer() {
        let mut state = RaceState::default();
        state.total_time = 8.0;
        state.distance_into_segment = 10.0;
        state.advance(5.0, 2, 1);
        assert!(!state.segment_tick_due(7.5));
        state.total_time = 15.5;
        assert!(state.segment_tick_due(7.5));
        assert!(!state.segment_tick_due(7.5));
    }
}
