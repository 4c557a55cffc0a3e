use crate::core::driver::DriverProfile;
use crate::core::lobby::Participant;
use crate::core::race::RaceEngine;
use crate::core::track::Track;
use crate::core::vehicle::Vehicle;
use crate::error::RaceError;
use crate::interfaces::catalog::RaceCatalog;
use crate::interfaces::event_sink::EventSink;
use crate::interfaces::profile_store::ProfileStore;
use crate::post::race_result::RaceReport;
use crate::pre::sim_constants::SimConstants;

/// * `tot_no_laps` - Number of laps to drive
/// * `timestep_size` - (s) Requested timestep size, clamped by the engine
/// * `rng_seed` - Seed of the incident model
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunPars {
    pub tot_no_laps: u32,
    pub timestep_size: f64,
    pub rng_seed: u64,
}

impl Default for RunPars {
    fn default() -> Self {
        RunPars {
            tot_no_laps: 1,
            timestep_size: 0.1,
            rng_seed: 42,
        }
    }
}

/// RaceResources are the collaborators a race needs besides its parameters. They are shared
/// by all participants of a lobby race.
#[derive(Clone, Copy)]
pub struct RaceResources<'a> {
    pub catalog: &'a (dyn RaceCatalog + Sync),
    pub profiles: &'a (dyn ProfileStore + Sync),
    pub sim_consts: &'a SimConstants,
}

/// handle_race creates and simulates a race on the basis of the inserted parameters, applies
/// the driver progression and returns the report. The first error aborts the race.
pub fn handle_race(
    vehicle: Vehicle,
    track: Track,
    driver: DriverProfile,
    run_pars: RunPars,
    sink: Box<dyn EventSink + Send>,
    sim_consts: &SimConstants,
) -> Result<RaceReport, RaceError> {
    let mut race = RaceEngine::with_constants(
        vehicle,
        track,
        run_pars.tot_no_laps,
        driver,
        run_pars.rng_seed,
        sink,
        sim_consts.to_owned(),
    )?;

    let summary = race.run(run_pars.timestep_size)?;
    let skill_gains = race.apply_progression()?;

    Ok(RaceReport {
        summary,
        skill_gains,
        profile: race.into_driver(),
    })
}

/// handle_participant_race looks up the vehicle, track and driver profile of a participant,
/// simulates the race and stores the progressed profile afterwards.
pub fn handle_participant_race(
    resources: RaceResources,
    participant: &Participant,
    track_id: &str,
    run_pars: RunPars,
    sink: Box<dyn EventSink + Send>,
) -> Result<RaceReport, RaceError> {
    let vehicle = resources.catalog.vehicle(&participant.vehicle_id)?;
    let track = resources.catalog.track(track_id)?;
    let driver = resources
        .profiles
        .load_or_default(&participant.user_id, &participant.display_name);

    tracing::debug!(
        user_id = %participant.user_id,
        vehicle = %vehicle.id,
        track = %track.id,
        "starting race over {} laps",
        run_pars.tot_no_laps
    );

    let report = handle_race(vehicle, track, driver, run_pars, sink, resources.sim_consts)?;
    resources.profiles.store(report.profile.to_owned())?;

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::track::{SegmentKind, TrackPars, TrackSegment};
    use crate::core::vehicle::VehiclePars;
    use crate::interfaces::catalog::MemoryCatalog;
    use crate::interfaces::event_sink::NullSink;
    use crate::interfaces::profile_store::MemoryProfileStore;

    fn catalog() -> MemoryCatalog {
        MemoryCatalog::new(
            &[VehiclePars {
                id: "matiz".to_owned(),
                name: "Daewoo Matiz".to_owned(),
                power: 38.0,
                mass: 800.0,
                cd: 0.32,
                area: 1.9,
                tire_grip: 0.9,
            }],
            &[TrackPars {
                id: "oval".to_owned(),
                name: "Oval".to_owned(),
                segments: vec![
                    TrackSegment {
                        name: "straight".to_owned(),
                        kind: SegmentKind::Straight,
                        length: 300.0,
                        entry_complexity: 0.5,
                        exit_complexity: 1.0,
                        accel_coef: 1.0,
                        brake_coef: 1.0,
                    },
                    TrackSegment {
                        name: "turn".to_owned(),
                        kind: SegmentKind::Corner,
                        length: 150.0,
                        entry_complexity: 2.0,
                        exit_complexity: 1.5,
                        accel_coef: 1.0,
                        brake_coef: 1.0,
                    },
                ],
            }],
        )
    }

    fn participant(vehicle_id: &str) -> Participant {
        Participant {
            user_id: "u1".to_owned(),
            display_name: "Anna".to_owned(),
            channel_ref: "chat-1".to_owned(),
            vehicle_id: vehicle_id.to_owned(),
            vehicle_name: "Daewoo Matiz".to_owned(),
            vehicle_mass: 800.0,
            vehicle_power: 38.0,
        }
    }

    #[test]
    fn participant_race_persists_profile() {
        let catalog = catalog();
        let profiles = MemoryProfileStore::default();
        let sim_consts = SimConstants::default();
        let resources = RaceResources {
            catalog: &catalog,
            profiles: &profiles,
            sim_consts: &sim_consts,
        };

        let report = handle_participant_race(
            resources,
            &participant("matiz"),
            "oval",
            RunPars::default(),
            Box::new(NullSink),
        )
        .unwrap();

        let stored = profiles.load("u1").unwrap();
        assert_eq!(stored, report.profile);
        assert!(stored.braking > 70.0);
        assert!((stored.experience - 0.45).abs() < 1e-12);
    }

    #[test]
    fn missing_vehicle_is_reported_and_profile_untouched() {
        let catalog = catalog();
        let profiles = MemoryProfileStore::default();
        let sim_consts = SimConstants::default();
        let resources = RaceResources {
            catalog: &catalog,
            profiles: &profiles,
            sim_consts: &sim_consts,
        };

        let err = handle_participant_race(
            resources,
            &participant("ferrari"),
            "oval",
            RunPars::default(),
            Box::new(NullSink),
        )
        .unwrap_err();

        assert!(matches!(err, RaceError::Configuration(_)));
        assert!(profiles.load("u1").is_none());
    }
}
