pub mod document;
pub mod event;
pub mod node;
pub mod query;
pub mod scenario;

use thiserror::Error;

pub use document::Dom;
pub use event::{DomEvent, EventType, Invocation, ListenerId, Modifiers};
pub use node::{ElementData, FrameContent, MutationRecord, NodeId, Rect, ShadowMode};

#[derive(Debug, Error, PartialEq)]
pub enum DomError {
    #[error("node {0:?} does not exist")]
    UnknownNode(NodeId),

    #[error("node {0:?} is not an element")]
    NotAnElement(NodeId),

    #[error("node {0:?} is not a document")]
    NotADocument(NodeId),

    #[error("node {0:?} cannot have children")]
    NotAContainer(NodeId),

    #[error("node {child:?} is not a child of {parent:?}")]
    NotAChild { parent: NodeId, child: NodeId },

    #[error("element {0:?} is not an iframe")]
    NotAFrame(NodeId),

    #[error("element {0:?} already hosts a shadow root")]
    ShadowAlreadyAttached(NodeId),

    #[error("element {0:?} has no shadow root")]
    NoShadowRoot(NodeId),

    #[error("node {0:?} is not connected to a document")]
    Detached(NodeId),

    #[error("invalid selector '{0}'")]
    InvalidSelector(String),

    #[error("scenario references unknown element '{0}'")]
    UnknownRef(String),
}
