//! Records user interactions on a page as replayable, human-readable steps.
//!
//! The pipeline runs against the arena page model in [`dom`]:
//! capture ([`capture`]) → value tracking ([`tracker`]) → normalization
//! ([`normalizer`]) → step building ([`step`]), driven by the
//! [`recorder::Recorder`] coordinator. Element descriptions come from
//! [`element`]; frame and shadow-root crossings from [`boundary`].

pub mod boundary;
pub mod capture;
pub mod cli;
pub mod dom;
pub mod element;
pub mod normalizer;
pub mod recorder;
pub mod step;
pub mod subscribers;
pub mod timer;
pub mod tracker;

pub use dom::{Dom, DomError, DomEvent, EventType, NodeId};
pub use element::element_model::{ElementInfo, ElementKind, LocatorBundle};
pub use recorder::{
    Recorder, RecorderConfig, RecorderError, RecorderEvent, RecordingSession, RecordingState,
    RecordingStatus,
};
pub use step::step_model::Step;
