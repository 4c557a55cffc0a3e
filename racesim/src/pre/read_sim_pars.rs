use crate::core::driver::DriverProfile;
use crate::core::lobby::Participant;
use crate::core::track::TrackPars;
use crate::core::vehicle::VehiclePars;
use crate::interfaces::catalog::MemoryCatalog;
use crate::interfaces::profile_store::MemoryProfileStore;
use crate::pre::sim_constants::SimConstants;
use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fs::OpenOptions;
use std::path::Path;

/// * `tot_no_laps` - Number of laps of the race
/// * `seed` - Base seed of the incident model, participant i races with `seed + i`
/// * `track_id` - Track the race takes place on
/// * `participants` - One participant for a solo race, at least two for a lobby race
#[derive(Debug, Deserialize, Clone)]
pub struct RacePars {
    #[serde(rename = "laps")]
    pub tot_no_laps: u32,
    #[serde(default = "default_seed")]
    pub seed: u64,
    pub track_id: String,
    pub participants: Vec<Participant>,
}

fn default_seed() -> u64 {
    42
}

/// SimPars is used to store all other parameter structs.
#[derive(Debug, Deserialize, Clone)]
pub struct SimPars {
    pub race_pars: RacePars,
    #[serde(rename = "tracks")]
    pub track_pars_all: Vec<TrackPars>,
    #[serde(rename = "vehicles")]
    pub vehicle_pars_all: Vec<VehiclePars>,
    #[serde(rename = "drivers", default)]
    pub driver_profiles: Vec<DriverProfile>,
}

impl SimPars {
    pub fn catalog(&self) -> MemoryCatalog {
        MemoryCatalog::new(&self.vehicle_pars_all, &self.track_pars_all)
    }

    pub fn profile_store(&self) -> MemoryProfileStore {
        MemoryProfileStore::new(self.driver_profiles.to_owned())
    }
}

fn read_json<T: DeserializeOwned>(filepath: &Path, what: &str) -> anyhow::Result<T> {
    let fh = OpenOptions::new()
        .read(true)
        .open(filepath)
        .with_context(|| format!("Failed to open {} file {}!", what, filepath.display()))?;
    let pars = serde_json::from_reader(&fh)
        .with_context(|| format!("Failed to parse {} file {}!", what, filepath.display()))?;
    Ok(pars)
}

/// read_sim_pars reads the JSON file and decodes the JSON string into the simulation parameters
/// struct.
pub fn read_sim_pars(filepath: &Path) -> anyhow::Result<SimPars> {
    read_json(filepath, "parameter")
}

/// Read simulation constants (physics/progression parameters) from a JSON file and validate
/// them.
pub fn read_sim_constants(filepath: &Path) -> anyhow::Result<SimConstants> {
    let sim_consts: SimConstants = read_json(filepath, "simulation constants")?;
    sim_consts.validate()?;
    Ok(sim_consts)
}
