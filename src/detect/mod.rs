mod backend;
pub mod backends;
pub mod labels;
mod registry;
mod result;
pub mod yolo;

pub use backend::{DetectParams, DetectorBackend};
pub use backends::{MarkerBackend, ScriptStep, ScriptedBackend};
pub use labels::ClassLabels;
pub use registry::BackendRegistry;
pub use result::Detection;
