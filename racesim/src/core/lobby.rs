use crate::core::handle_lobby_race::handle_lobby_race;
use crate::core::handle_race::{RaceResources, RunPars};
use crate::error::{RaceError, ValidationError};
use crate::interfaces::event_sink::TaggedEvent;
use crate::post::race_result::ParticipantOutcome;
use flume::Sender;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

pub const MAX_PLAYERS: usize = 8;

/// Number of hex characters of a generated lobby id.
const LOBBY_ID_LEN: usize = 6;

/// * `user_id` - Id of the user
/// * `display_name` - Name shown in events and standings
/// * `channel_ref` - Reference of the chat the user joined from
/// * `vehicle_id` - Catalog id of the vehicle the user races with
/// * `vehicle_name`, `vehicle_mass`, `vehicle_power` - Vehicle details shown in the lobby
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub user_id: String,
    #[serde(alias = "name")]
    pub display_name: String,
    #[serde(default)]
    pub channel_ref: String,
    pub vehicle_id: String,
    #[serde(default)]
    pub vehicle_name: String,
    #[serde(default)]
    pub vehicle_mass: f64,
    #[serde(default)]
    pub vehicle_power: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LobbyStatus {
    Created,
    Forming,
    Ready,
    Racing,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Lobby {
    pub id: String,
    pub track_id: String,
    pub participants: Vec<Participant>,
    racing: bool,
}

impl Lobby {
    pub fn status(&self) -> LobbyStatus {
        if self.racing {
            return LobbyStatus::Racing;
        }
        match self.participants.len() {
            0 => LobbyStatus::Created,
            1 => LobbyStatus::Forming,
            _ => LobbyStatus::Ready,
        }
    }

    fn contains(&self, user_id: &str) -> bool {
        self.participants.iter().any(|p| p.user_id == user_id)
    }
}

/// LobbyRegistry owns all lobbies of a service instance. Every mutation happens under one
/// lock, which keeps a user in at most one lobby and every lobby within MAX_PLAYERS.
#[derive(Debug, Default)]
pub struct LobbyRegistry {
    lobbies: Mutex<HashMap<String, Lobby>>,
}

impl LobbyRegistry {
    pub fn new() -> LobbyRegistry {
        LobbyRegistry::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Lobby>> {
        self.lobbies.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Removes all lobbies.
    pub fn reset(&self) {
        self.lock().clear();
    }

    /// Creates an empty lobby for the track and returns its id.
    pub fn create(&self, track_id: &str) -> String {
        let mut lobbies = self.lock();

        let lobby_id = loop {
            let candidate = uuid::Uuid::new_v4().simple().to_string()[..LOBBY_ID_LEN].to_owned();
            if !lobbies.contains_key(&candidate) {
                break candidate;
            }
        };

        lobbies.insert(
            lobby_id.to_owned(),
            Lobby {
                id: lobby_id.to_owned(),
                track_id: track_id.to_owned(),
                participants: Vec::new(),
                racing: false,
            },
        );
        tracing::info!(lobby_id = %lobby_id, track_id, "lobby created");

        lobby_id
    }

    /// Returns the id of the lobby the user belongs to.
    pub fn find_lobby(&self, user_id: &str) -> Option<String> {
        find_lobby_of(&self.lock(), user_id)
    }

    /// Returns a copy of the lobby.
    pub fn lobby(&self, lobby_id: &str) -> Option<Lobby> {
        self.lock().get(lobby_id).cloned()
    }

    pub fn status(&self, lobby_id: &str) -> Option<LobbyStatus> {
        self.lock().get(lobby_id).map(Lobby::status)
    }

    /// Adds the participant to the lobby. Joining the same lobby again is a no-op.
    pub fn join(&self, lobby_id: &str, participant: Participant) -> Result<(), RaceError> {
        let mut lobbies = self.lock();

        if !lobbies.contains_key(lobby_id) {
            return Err(ValidationError::LobbyNotFound(lobby_id.to_owned()).into());
        }

        if let Some(other) = find_lobby_of(&lobbies, &participant.user_id) {
            if other != lobby_id {
                return Err(ValidationError::AlreadyInLobby { other }.into());
            }
            return Ok(());
        }

        let lobby = lobbies
            .get_mut(lobby_id)
            .ok_or_else(|| ValidationError::LobbyNotFound(lobby_id.to_owned()))?;

        if lobby.participants.len() >= MAX_PLAYERS {
            return Err(ValidationError::LobbyFull {
                lobby_id: lobby_id.to_owned(),
                max: MAX_PLAYERS,
            }
            .into());
        }

        tracing::info!(
            lobby_id,
            user_id = %participant.user_id,
            "{} joined with {}",
            participant.display_name,
            participant.vehicle_name
        );
        lobby.participants.push(participant);

        Ok(())
    }

    /// Removes the user from the lobby and deletes the lobby once it is empty. Unknown lobbies
    /// and users are ignored.
    pub fn leave(&self, lobby_id: &str, user_id: &str) {
        let mut lobbies = self.lock();

        let now_empty = match lobbies.get_mut(lobby_id) {
            Some(lobby) => {
                let no_before = lobby.participants.len();
                lobby.participants.retain(|p| p.user_id != user_id);
                if lobby.participants.len() < no_before {
                    tracing::info!(lobby_id, user_id, "participant left");
                }
                lobby.participants.is_empty()
            }
            None => return,
        };

        if now_empty {
            lobbies.remove(lobby_id);
            tracing::info!(lobby_id, "lobby deleted");
        }
    }

    /// Starts the race of a lobby and blocks until every participant finished or failed. The
    /// race works on a copy of the participant list, so joins and leaves during the race only
    /// affect the next one. The outcomes are returned in completion order.
    pub fn start(
        &self,
        lobby_id: &str,
        resources: RaceResources,
        run_pars: RunPars,
        events: Option<Sender<TaggedEvent>>,
    ) -> Result<Vec<ParticipantOutcome>, RaceError> {
        let (racing, track_id, participants) = self.begin_race(lobby_id)?;
        let outcomes = handle_lobby_race(
            lobby_id,
            &track_id,
            participants,
            resources,
            run_pars,
            events,
        );
        drop(racing);

        outcomes
    }

    /// Marks the lobby as racing and returns a copy of its participants. The returned guard
    /// clears the flag when dropped, also while unwinding.
    fn begin_race(
        &self,
        lobby_id: &str,
    ) -> Result<(RacingGuard<'_>, String, Vec<Participant>), RaceError> {
        let mut lobbies = self.lock();
        let lobby = lobbies
            .get_mut(lobby_id)
            .ok_or_else(|| ValidationError::LobbyNotFound(lobby_id.to_owned()))?;

        if lobby.racing {
            return Err(ValidationError::AlreadyRacing(lobby_id.to_owned()).into());
        }
        if lobby.participants.len() < 2 {
            return Err(ValidationError::NotEnoughParticipants {
                lobby_id: lobby_id.to_owned(),
                count: lobby.participants.len(),
            }
            .into());
        }

        lobby.racing = true;
        let guard = RacingGuard {
            registry: self,
            lobby_id: lobby_id.to_owned(),
        };
        Ok((guard, lobby.track_id.to_owned(), lobby.participants.to_owned()))
    }
}

struct RacingGuard<'a> {
    registry: &'a LobbyRegistry,
    lobby_id: String,
}

impl Drop for RacingGuard<'_> {
    fn drop(&mut self) {
        if let Some(lobby) = self.registry.lock().get_mut(&self.lobby_id) {
            lobby.racing = false;
        }
    }
}

fn find_lobby_of(lobbies: &HashMap<String, Lobby>, user_id: &str) -> Option<String> {
    lobbies
        .values()
        .find(|lobby| lobby.contains(user_id))
        .map(|lobby| lobby.id.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn participant(user_id: &str) -> Participant {
        Participant {
            user_id: user_id.to_owned(),
            display_name: user_id.to_uppercase(),
            channel_ref: "1".to_owned(),
            vehicle_id: "matiz".to_owned(),
            vehicle_name: "Matiz".to_owned(),
            vehicle_mass: 800.0,
            vehicle_power: 38.0,
        }
    }

    #[test]
    fn join_stores_vehicle_and_is_idempotent() {
        let registry = LobbyRegistry::new();
        let lid = registry.create("track1");
        assert_eq!(registry.status(&lid), Some(LobbyStatus::Created));

        registry.join(&lid, participant("u1")).unwrap();
        registry.join(&lid, participant("u1")).unwrap();

        let lobby = registry.lobby(&lid).unwrap();
        assert_eq!(lobby.participants.len(), 1);
        assert_eq!(lobby.participants[0].vehicle_name, "Matiz");
        assert_eq!(lobby.status(), LobbyStatus::Forming);
    }

    #[test]
    fn ninth_participant_is_rejected() {
        let registry = LobbyRegistry::new();
        let lid = registry.create("track1");
        for i in 0..MAX_PLAYERS {
            registry.join(&lid, participant(&format!("u{}", i))).unwrap();
        }

        let err = registry.join(&lid, participant("u9")).unwrap_err();
        assert!(matches!(
            err,
            RaceError::Validation(ValidationError::LobbyFull { max: MAX_PLAYERS, .. })
        ));
        assert_eq!(registry.lobby(&lid).unwrap().participants.len(), MAX_PLAYERS);
        assert_eq!(registry.status(&lid), Some(LobbyStatus::Ready));
    }

    #[test]
    fn member_of_other_lobby_must_leave_first() {
        let registry = LobbyRegistry::new();
        let lobby_a = registry.create("track1");
        let lobby_b = registry.create("track2");
        registry.join(&lobby_a, participant("u1")).unwrap();
        registry.join(&lobby_a, participant("u2")).unwrap();

        match registry.join(&lobby_b, participant("u1")) {
            Err(RaceError::Validation(ValidationError::AlreadyInLobby { other })) => {
                assert_eq!(other, lobby_a)
            }
            other => panic!("unexpected result {:?}", other),
        }
        assert!(registry.lobby(&lobby_b).unwrap().participants.is_empty());

        registry.leave(&lobby_a, "u1");
        registry.join(&lobby_b, participant("u1")).unwrap();
        assert_eq!(registry.find_lobby("u1"), Some(lobby_b));
    }

    #[test]
    fn empty_lobby_is_deleted() {
        let registry = LobbyRegistry::new();
        let lid = registry.create("track1");
        registry.join(&lid, participant("u1")).unwrap();
        registry.leave(&lid, "nobody");
        assert!(registry.lobby(&lid).is_some());

        registry.leave(&lid, "u1");
        assert!(registry.lobby(&lid).is_none());
        assert_eq!(registry.find_lobby("u1"), None);
        registry.leave(&lid, "u1");
    }

    #[test]
    fn reset_removes_all_lobbies() {
        let registry = LobbyRegistry::new();
        let lobby_a = registry.create("track1");
        let lobby_b = registry.create("track2");
        registry.join(&lobby_a, participant("u1")).unwrap();
        registry.join(&lobby_b, participant("u2")).unwrap();

        registry.reset();

        assert_eq!(registry.find_lobby("u1"), None);
        assert_eq!(registry.find_lobby("u2"), None);
        assert!(registry.lobby(&lobby_a).is_none());
        assert!(registry.lobby(&lobby_b).is_none());
        assert_eq!(registry.status(&lobby_a), None);
    }

    #[test]
    fn racing_flag_is_cleared_after_panic() {
        let registry = LobbyRegistry::new();
        let lid = registry.create("track1");
        registry.join(&lid, participant("u1")).unwrap();
        registry.join(&lid, participant("u2")).unwrap();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let (_racing, _, participants) = registry.begin_race(&lid).unwrap();
            assert_eq!(participants.len(), 2);
            assert_eq!(registry.status(&lid), Some(LobbyStatus::Racing));
            assert!(matches!(
                registry.begin_race(&lid),
                Err(RaceError::Validation(ValidationError::AlreadyRacing(_)))
            ));
            panic!("race aborted");
        }));

        assert!(result.is_err());
        assert_eq!(registry.status(&lid), Some(LobbyStatus::Ready));
        assert!(registry.begin_race(&lid).is_ok());
    }

    #[test]
    fn join_unknown_lobby_fails() {
        let registry = LobbyRegistry::new();
        let err = registry.join("abcdef", participant("u1")).unwrap_err();
        assert!(matches!(
            err,
            RaceError::Validation(ValidationError::LobbyNotFound(_))
        ));
    }

    #[test]
    fn concurrent_joins_respect_capacity() {
        let registry = LobbyRegistry::new();
        let lid = registry.create("track1");

        std::thread::scope(|s| {
            for i in 0..32 {
                let registry = &registry;
                let lid = &lid;
                s.spawn(move || {
                    let _ = registry.join(lid, participant(&format!("u{}", i)));
                });
            }
        });

        assert_eq!(registry.lobby(&lid).unwrap().participants.len(), MAX_PLAYERS);
    }
}
