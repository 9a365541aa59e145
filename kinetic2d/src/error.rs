use std::path::PathBuf;

use thiserror::Error;

/// Structural and shape violations reported by explicit setters.
///
/// Lifecycle hooks never surface these; they log and self-destruct instead.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SceneError {
    #[error("node {0} is not alive")]
    DeadNode(String),

    #[error("component owner is fixed at creation")]
    ComponentOwnerFixed,

    #[error("the owning node has no body component")]
    MissingBody,

    #[error("the parent node has no body component")]
    MissingParentBody,

    #[error("both joined bodies need at least one fixture")]
    MissingFixture,

    #[error("the fixture belongs to a different body than the owning node's body")]
    FixtureBodyMismatch,

    #[error("invalid shape: {0}")]
    InvalidShape(String),

    #[error("the physics world rejected the shape")]
    DegenerateShape,
}

/// Failures while loading a declarative map document.
#[derive(Debug, Error)]
pub enum MapError {
    #[error("failed to read map {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse map: {0}")]
    Parse(#[from] serde_json::Error),
}
