use crate::core::driver::DriverProfile;
use crate::error::RaceError;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// ProfileStore hands out and takes back driver profile snapshots. Persisting them is the
/// business of the implementation, the core only calls `load` before and `store` after a race.
pub trait ProfileStore {
    fn load(&self, user_id: &str) -> Option<DriverProfile>;
    fn store(&self, profile: DriverProfile) -> Result<(), RaceError>;

    /// Returns the stored profile or a new default profile for a first race.
    fn load_or_default(&self, user_id: &str, name: &str) -> DriverProfile {
        self.load(user_id)
            .unwrap_or_else(|| DriverProfile::default_for(user_id, name))
    }
}

/// MemoryProfileStore keeps profiles for the lifetime of the process.
#[derive(Debug, Default)]
pub struct MemoryProfileStore {
    profiles: Mutex<HashMap<String, DriverProfile>>,
}

impl MemoryProfileStore {
    pub fn new(profiles: Vec<DriverProfile>) -> MemoryProfileStore {
        MemoryProfileStore {
            profiles: Mutex::new(profiles.into_iter().map(|p| (p.id.to_owned(), p)).collect()),
        }
    }

    pub fn snapshot(&self) -> Vec<DriverProfile> {
        let profiles = self.profiles.lock().unwrap_or_else(PoisonError::into_inner);
        let mut all: Vec<DriverProfile> = profiles.values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }
}

impl ProfileStore for MemoryProfileStore {
    fn load(&self, user_id: &str) -> Option<DriverProfile> {
        self.profiles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(user_id)
            .cloned()
    }

    fn store(&self, profile: DriverProfile) -> Result<(), RaceError> {
        self.profiles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(profile.id.to_owned(), profile);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_race_gets_default_profile() {
        let store = MemoryProfileStore::default();
        let profile = store.load_or_default("u1", "Anna");
        assert_eq!(profile.braking, crate::core::driver::DEFAULT_SKILL);

        let mut improved = profile.to_owned();
        improved.braking = 71.0;
        store.store(improved).unwrap();
        assert_eq!(store.load_or_default("u1", "Anna").braking, 71.0);
        assert_eq!(store.snapshot().len(), 1);
    }
}
