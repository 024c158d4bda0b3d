//! Image generation and storage
//!
//! Provides:
//! - On-disk storage of generated PNGs
//! - The prompt-to-image pipeline used by the form

mod gen;
mod store;

use thiserror::Error;

use crate::provider::ProviderError;

pub use gen::{generate_image, submit_prompt, GeneratedImage, Submission};
pub use store::{ImageFile, ImageStore};

/// Why a generation produced no image.
///
/// Every variant is reported to the user the same way, with its text.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("could not decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("could not write image: {0}")]
    Io(#[from] std::io::Error),
    #[error("image file {0} already exists")]
    Collision(String),
    #[error("image processing task failed: {0}")]
    Join(String),
}
