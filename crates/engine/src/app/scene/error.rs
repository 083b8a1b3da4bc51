use std::fmt;

use thiserror::Error;

use super::EntityId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudKind {
    Child,
    Behavior,
}

impl fmt::Display for BudKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Child => f.write_str("child"),
            Self::Behavior => f.write_str("behavior"),
        }
    }
}

#[derive(Debug, Error)]
pub enum SceneError {
    /// Truncates the running frame. Swallowed by `Scene::frame`.
    #[error("frame break")]
    FrameBreak,
    #[error("ambiguous {kind} edit: neither a value nor a name was given")]
    AmbiguousRemoval { kind: BudKind },
    #[error("entity {entity:?} has no {slot} capability")]
    MissingCapability { entity: EntityId, slot: String },
    #[error("unknown entity {0:?}")]
    UnknownEntity(EntityId),
    #[error("entity {0:?} is still attached to a tree")]
    StillAttached(EntityId),
    #[error("attaching {child:?} under {parent:?} would create a cycle")]
    WouldCycle { parent: EntityId, child: EntityId },
    #[error("render target does not expose readable pixels")]
    SnapshotUnavailable,
    #[error("failed to write snapshot: {0}")]
    Snapshot(#[from] image::ImageError),
    #[error(transparent)]
    Hook(Box<dyn std::error::Error + Send + Sync>),
}

impl SceneError {
    pub fn hook(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Hook(Box::new(error))
    }

    pub fn is_frame_break(&self) -> bool {
        matches!(self, Self::FrameBreak)
    }
}
