pub mod marker;
pub mod scripted;

#[cfg(feature = "backend-tract")]
pub mod tract;

pub use marker::{MarkerBackend, PERSON_MARKER};
pub use scripted::{ScriptStep, ScriptedBackend};

#[cfg(feature = "backend-tract")]
pub use tract::TractBackend;
