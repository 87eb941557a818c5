//! Standard node library
//!
//! Collection of built-in operations for common media-pipeline steps.

mod api;
mod csvdata;
mod debug;
mod input;
mod util;

pub use api::HttpRequestNode;
pub use csvdata::{ConvertTimecodesNode, ProcessCsvNode};
pub use debug::DebugNode;
pub use input::{LoadAudioNode, LoadVideoNode};
pub use util::{CreateManifestNode, FilterFilesNode, MergeDirectoriesNode, RenameFilesNode};

use std::sync::Arc;
use syncruntime::NodeRegistry;

/// Register all standard nodes with a registry
pub fn register_all(registry: &mut NodeRegistry) {
    registry.register(Arc::new(api::HttpRequestFactory));
    registry.register(Arc::new(csvdata::ConvertTimecodesFactory));
    registry.register(Arc::new(csvdata::ProcessCsvFactory));
    registry.register(Arc::new(debug::DebugFactory));
    registry.register(Arc::new(input::LoadAudioFactory));
    registry.register(Arc::new(input::LoadVideoFactory));
    registry.register(Arc::new(util::CreateManifestFactory));
    registry.register(Arc::new(util::FilterFilesFactory));
    registry.register(Arc::new(util::MergeDirectoriesFactory));
    registry.register(Arc::new(util::RenameFilesFactory));
}
