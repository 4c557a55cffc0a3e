pub mod driver;
pub mod handle_lobby_race;
pub mod handle_race;
pub mod lobby;
pub mod race;
pub mod race_state;
pub mod track;
pub mod vehicle;
