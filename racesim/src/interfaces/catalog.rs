use crate::core::track::{Track, TrackPars};
use crate::core::vehicle::{Vehicle, VehiclePars};
use crate::error::RaceError;
use std::collections::HashMap;

/// RaceCatalog supplies vehicles and tracks by id. A missing id is a configuration error.
pub trait RaceCatalog {
    fn vehicle(&self, vehicle_id: &str) -> Result<Vehicle, RaceError>;
    fn track(&self, track_id: &str) -> Result<Track, RaceError>;
}

/// MemoryCatalog keeps vehicle and track parameters in memory, e.g. after reading them from a
/// parameter file.
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    vehicle_pars_all: HashMap<String, VehiclePars>,
    track_pars_all: HashMap<String, TrackPars>,
}

impl MemoryCatalog {
    pub fn new(vehicle_pars_all: &[VehiclePars], track_pars_all: &[TrackPars]) -> MemoryCatalog {
        MemoryCatalog {
            vehicle_pars_all: vehicle_pars_all
                .iter()
                .map(|v| (v.id.to_owned(), v.to_owned()))
                .collect(),
            track_pars_all: track_pars_all
                .iter()
                .map(|t| (t.id.to_owned(), t.to_owned()))
                .collect(),
        }
    }
}

impl RaceCatalog for MemoryCatalog {
    fn vehicle(&self, vehicle_id: &str) -> Result<Vehicle, RaceError> {
        self.vehicle_pars_all
            .get(vehicle_id)
            .map(Vehicle::new)
            .ok_or_else(|| RaceError::Configuration(format!("vehicle {} not found", vehicle_id)))
    }

    fn track(&self, track_id: &str) -> Result<Track, RaceError> {
        let track_pars = self
            .track_pars_all
            .get(track_id)
            .ok_or_else(|| RaceError::Configuration(format!("track {} not found", track_id)))?;
        Track::new(track_pars)
    }
}
