pub mod captured_event;
pub mod event_capture;
pub mod extract;
