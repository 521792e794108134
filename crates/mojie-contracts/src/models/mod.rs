mod registry;
mod selectors;

pub use registry::{ModelRegistry, ModelSpec, ResolutionPreset, BATCH_CHOICES, DEFAULT_MODEL};
pub use selectors::{ModelSelection, ModelSelector};
