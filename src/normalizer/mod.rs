pub mod environment;
pub mod event_normalizer;
pub mod normalized_event;
pub mod target;
