pub mod catalog;
pub mod event_sink;
pub mod profile_store;
