use crate::core::driver::{DriverProfile, SkillGain};
use crate::core::race_state::{PenaltyRecord, RaceState, Transition};
use crate::core::track::{Track, TrackSegment};
use crate::core::vehicle::Vehicle;
use crate::error::RaceError;
use crate::interfaces::event_sink::{EventSink, RaceEvent, Severity};
use crate::post::race_result::RaceSummary;
use crate::pre::sim_constants::SimConstants;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Uniform};
use std::panic::{catch_unwind, AssertUnwindSafe};

/// (m/s^2) Gravitational acceleration.
const G: f64 = 9.81;

/// RaceEngine simulates a single vehicle on a track, tick by tick. All randomness is drawn
/// from one generator seeded at construction, so a given seed reproduces the same race.
pub struct RaceEngine {
    vehicle: Vehicle,
    track: Track,
    tot_no_laps: u32,
    driver: DriverProfile,
    sim_consts: SimConstants,
    rng: ChaCha8Rng,
    minor_penalty: Uniform<f64>,
    major_penalty: Uniform<f64>,
    vmax_power_limited: f64,
    sink: Box<dyn EventSink + Send>,
    state: RaceState,
    progression_applied: bool,
}

impl RaceEngine {
    /// Creates an engine with the default simulation constants.
    pub fn new(
        vehicle: Vehicle,
        track: Track,
        tot_no_laps: u32,
        driver: DriverProfile,
        rng_seed: u64,
        sink: Box<dyn EventSink + Send>,
    ) -> Result<RaceEngine, RaceError> {
        RaceEngine::with_constants(
            vehicle,
            track,
            tot_no_laps,
            driver,
            rng_seed,
            sink,
            SimConstants::default(),
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn with_constants(
        vehicle: Vehicle,
        track: Track,
        tot_no_laps: u32,
        driver: DriverProfile,
        rng_seed: u64,
        sink: Box<dyn EventSink + Send>,
        sim_consts: SimConstants,
    ) -> Result<RaceEngine, RaceError> {
        vehicle.validate()?;
        driver.validate()?;
        sim_consts.validate()?;

        if track.segments.is_empty() {
            return Err(RaceError::SimulationFault(format!(
                "track {} has no segments",
                track.id
            )));
        }
        if tot_no_laps == 0 {
            return Err(RaceError::Configuration(
                "number of laps must be at least 1".to_owned(),
            ));
        }

        let [minor_lo, minor_hi] = sim_consts.minor_penalty_range;
        let [major_lo, major_hi] = sim_consts.major_penalty_range;

        Ok(RaceEngine {
            vmax_power_limited: vehicle.max_power_limited_speed(sim_consts.air_density),
            vehicle,
            track,
            tot_no_laps,
            driver,
            rng: ChaCha8Rng::seed_from_u64(rng_seed),
            minor_penalty: Uniform::new_inclusive(minor_lo, minor_hi),
            major_penalty: Uniform::new_inclusive(major_lo, major_hi),
            sim_consts,
            sink,
            state: RaceState::default(),
            progression_applied: false,
        })
    }

    // ---------------------------------------------------------------------------------------------
    // MAIN METHOD ---------------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    /// Simulates one timestep. dt is clamped to the maximum timestep size, non-positive values
    /// and steps after the finish are ignored.
    pub fn step(&mut self, dt: f64) {
        if self.state.finished || !(dt > 0.0) {
            return;
        }
        let dt = dt.min(self.sim_consts.dt_max);
        let seg_idx = self.state.segment_index;

        if self.track.segments[seg_idx].is_corner() {
            self.step_corner(seg_idx, dt);
        } else {
            self.step_straight(seg_idx, dt);
        }

        self.handle_progress(seg_idx);
    }

    /// Steps until the race is finished and returns the summary. dt must be positive and finite,
    /// values above the maximum timestep size are clamped by `step`.
    pub fn run(&mut self, dt: f64) -> Result<RaceSummary, RaceError> {
        if !dt.is_finite() || dt <= 0.0 {
            return Err(RaceError::Configuration(format!(
                "timestep size must be positive, is {}",
                dt
            )));
        }

        let mut last_logged_lap = self.state.lap;
        while !self.state.finished {
            self.step(dt);

            if self.state.lap > last_logged_lap {
                tracing::debug!(
                    vehicle = %self.vehicle.id,
                    "lap {} done after {:.3}s",
                    last_logged_lap,
                    self.state.total_time
                );
                last_logged_lap = self.state.lap;
            }
        }

        Ok(self.summary())
    }

    // ---------------------------------------------------------------------------------------------
    // RACE SIMULATOR PARTS ------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    fn step_straight(&mut self, seg_idx: usize, dt: f64) {
        let seg = &self.track.segments[seg_idx];
        let lam = seg.load();
        let accel = self.calc_straight_accel(seg);

        self.state.integrate(accel, dt);

        // straights use the same incident model at the reduced base rate
        self.check_incident(seg_idx, lam, false);
    }

    fn step_corner(&mut self, seg_idx: usize, dt: f64) {
        let seg = &self.track.segments[seg_idx];
        let lam = seg.load().max(0.1);
        let accel = self.calc_corner_accel(lam, dt);

        self.state.integrate(accel, dt);

        if !self.check_incident(seg_idx, lam, true) {
            self.state.clean_corner_count += 1;
        }
    }

    /// Tractive acceleration on a straight: power or grip limited, reduced by rolling
    /// resistance and the segment load, but never above the unscaled maximum.
    fn calc_straight_accel(&self, seg: &TrackSegment) -> f64 {
        let v = self.state.speed.max(1.0);
        let drag_power = self.vehicle.drag_factor(self.sim_consts.air_density) * v.powi(3);
        let a_power = (self.vehicle.power_watts() - drag_power) / (self.vehicle.mass * v);
        let a_tire = G * self.vehicle.tire_grip;

        let mut a_long_max = a_power.min(a_tire);
        if self.sim_consts.use_rolling_resistance {
            a_long_max -= G * self.sim_consts.c_rr;
        }

        let lam_factor = (1.0 - 0.11 * seg.load()).max(0.08);
        (a_long_max * seg.accel_coef * lam_factor).min(a_long_max)
    }

    /// Acceleration towards the corner target speed, limited by the tire grip. Above the target
    /// speed the car always brakes with full grip.
    fn calc_corner_accel(&self, lam: f64, dt: f64) -> f64 {
        let [v_min, v_max] = self.sim_consts.corner_speed_bounds;
        let v_factor = (1.0 - 0.10 * lam).max(0.1);
        let v_target = (self.vmax_power_limited * v_factor).clamp(v_min, v_max);
        let v_in = self.state.speed.max(0.1);

        let a_long_max = 0.8 * G * self.vehicle.tire_grip;
        let mut a_eff = ((v_target - v_in) / dt.max(1e-3)).clamp(-a_long_max, a_long_max);
        if self.state.speed > v_target {
            a_eff = a_eff.min(-a_long_max);
        }
        a_eff
    }

    /// Runs the incident trials of one tick: first the minor one, then, only if it did not fire,
    /// the major one. Returns true if an incident happened.
    fn check_incident(&mut self, seg_idx: usize, lam: f64, in_corner: bool) -> bool {
        let base = self.sim_consts.error_rate_base * if in_corner { 1.5 } else { 1.0 };
        let p_minor = (base * lam).clamp(0.0, 0.9);

        if self.rng.gen::<f64>() < p_minor {
            let delta_s = self.minor_penalty.sample(&mut self.rng);
            self.apply_penalty(seg_idx, Severity::Minor, delta_s, lam);
            return true;
        }

        if self.sim_consts.major_mistakes
            && self.rng.gen::<f64>() < self.sim_consts.major_mistake_rate
        {
            let delta_s = self.major_penalty.sample(&mut self.rng);
            self.apply_penalty(seg_idx, Severity::Major, delta_s, lam);
            return true;
        }

        false
    }

    fn apply_penalty(&mut self, seg_idx: usize, severity: Severity, delta_s: f64, lam: f64) {
        let segment = self.track.segments[seg_idx].name.to_owned();

        self.state.add_penalty(PenaltyRecord {
            severity,
            delta_s,
            segment: segment.to_owned(),
            load: lam,
        });

        self.notify(RaceEvent::Penalty {
            severity,
            delta_s,
            segment,
            load: lam,
            time_s: self.state.total_time,
        });
    }

    /// Emits the pacing tick and handles segment and lap transitions after integration.
    fn handle_progress(&mut self, seg_idx: usize) {
        let seg_length = self.track.segments[seg_idx].length;

        if self.state.segment_tick_due(self.sim_consts.segment_tick_interval) {
            self.notify(RaceEvent::SegmentTick {
                segment: self.track.segments[seg_idx].name.to_owned(),
                segment_id: seg_idx + 1,
                segment_length: seg_length,
                distance: self.state.distance_into_segment,
                lap: self.state.lap,
                laps: self.tot_no_laps,
                time_s: self.state.total_time,
                speed: self.state.speed * 3.6,
            });
        }

        match self
            .state
            .advance(seg_length, self.track.no_segments(), self.tot_no_laps)
        {
            Transition::None => {}
            Transition::Segment(_) => self.notify_segment_change(),
            Transition::Lap {
                completed,
                finished,
            } => {
                self.notify(RaceEvent::LapComplete {
                    lap: completed,
                    time_s: self.state.total_time,
                });

                if finished {
                    self.notify(RaceEvent::RaceComplete {
                        time_s: self.state.total_time,
                        incidents: self.state.incident_count,
                    });
                }
            }
        }
    }

    fn notify_segment_change(&mut self) {
        let idx = self.state.segment_index;
        self.notify(RaceEvent::SegmentChange {
            segment: self.track.segments[idx].name.to_owned(),
            segment_id: idx + 1,
            lap: self.state.lap,
            laps: self.tot_no_laps,
            time_s: self.state.total_time,
            speed: self.state.speed * 3.6,
        });
    }

    /// Delivers an event to the sink. Errors and panics of the sink are logged and dropped.
    fn notify(&mut self, event: RaceEvent) {
        let sink = &mut self.sink;
        match catch_unwind(AssertUnwindSafe(|| sink.deliver(&event))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::debug!(error = %e, kind = event.kind(), "dropped race event"),
            Err(_) => tracing::debug!(kind = event.kind(), "event sink panicked, event dropped"),
        }
    }

    // ---------------------------------------------------------------------------------------------
    // PROGRESSION ---------------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    /// Applies the driver progression of the finished race and emits one skill_up event per
    /// improved skill. It can only be applied once per race.
    pub fn apply_progression(&mut self) -> Result<Vec<SkillGain>, RaceError> {
        if !self.state.finished {
            return Err(RaceError::SimulationFault(
                "driver progression requested before the race finished".to_owned(),
            ));
        }
        if self.progression_applied {
            return Err(RaceError::SimulationFault(
                "driver progression was already applied".to_owned(),
            ));
        }

        let gains = self.driver.update_after_race(
            self.total_distance_km(),
            self.state.incident_count,
            self.state.clean_corner_count,
            &self.sim_consts,
        )?;
        self.progression_applied = true;

        for gain in gains.iter().filter(|g| g.delta > 0.0) {
            self.notify(RaceEvent::SkillUp {
                skill: gain.skill,
                delta: gain.delta,
                new: gain.new,
            });
        }

        Ok(gains)
    }

    // ---------------------------------------------------------------------------------------------
    // METHODS (HELPERS) ---------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    pub fn summary(&self) -> RaceSummary {
        RaceSummary {
            total_time: self.state.total_time,
            total_distance_km: self.total_distance_km(),
            incident_count: self.state.incident_count,
            clean_corner_count: self.state.clean_corner_count,
            penalty_log: self.state.penalty_log.to_owned(),
        }
    }

    fn total_distance_km(&self) -> f64 {
        self.track.total_length * self.tot_no_laps as f64 / 1000.0
    }

    pub fn is_finished(&self) -> bool {
        self.state.finished
    }

    pub fn state(&self) -> &RaceState {
        &self.state
    }

    pub fn driver(&self) -> &DriverProfile {
        &self.driver
    }

    pub fn into_driver(self) -> DriverProfile {
        self.driver
    }
}
