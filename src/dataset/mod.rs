//! Benchmark cases and their images

pub mod case;
pub mod loader;

pub use case::{Case, CaseId};
pub use loader::{find_case_images, image_path, Dataset, DatasetConfig};
