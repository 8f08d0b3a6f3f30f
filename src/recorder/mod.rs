pub mod collaborators;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod state;

pub use config::RecorderConfig;
pub use coordinator::Recorder;
pub use error::{RecorderError, StoreError};
pub use events::RecorderEvent;
pub use state::{RecordingSession, RecordingState, RecordingStatus};
