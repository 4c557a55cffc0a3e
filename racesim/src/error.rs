use thiserror::Error;

/// RaceError is the error type of every fallible core operation.
///
/// * `Configuration` - Missing or invalid vehicle, track, profile or constants data. Fatal to
/// the affected race, never retried.
/// * `Validation` - A lobby precondition was not met. No state was mutated.
/// * `SimulationFault` - Unexpected internal state, e.g. an empty segment list.
#[derive(Debug, Error)]
pub enum RaceError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("simulation fault: {0}")]
    SimulationFault(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("lobby {0} not found")]
    LobbyNotFound(String),
    #[error("leave lobby {other} first")]
    AlreadyInLobby { other: String },
    #[error("lobby {lobby_id} is full (max {max} players)")]
    LobbyFull { lobby_id: String, max: usize },
    #[error("lobby {lobby_id} needs at least 2 players, has {count}")]
    NotEnoughParticipants { lobby_id: String, count: usize },
    #[error("lobby {0} is already racing")]
    AlreadyRacing(String),
}

/// SinkError is returned by an event sink that failed to accept an event. The engine logs and
/// drops it, the simulation continues.
#[derive(Debug, Clone, Error)]
#[error("event delivery failed: {0}")]
pub struct SinkError(pub String);
