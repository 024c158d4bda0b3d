//! Prompt-to-image pipeline
//!
//! 1. Ask the provider for an image URL
//! 2. Download the image
//! 3. Decode it and re-encode as PNG
//! 4. Write it under the session's next file name
//! 5. Append the generation to the session history

use std::io::Cursor;
use std::path::PathBuf;

use image::{DynamicImage, ImageFormat};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{GenerationError, ImageStore};
use crate::provider::ImageClient;
use crate::session::{Generation, Session};

/// A freshly generated image
#[derive(Debug, Clone)]
pub struct GeneratedImage {
    /// Decoded image
    pub image: DynamicImage,
    /// Where the PNG was written
    pub path: PathBuf,
    /// File name inside the output directory
    pub file_name: String,
}

/// Result of submitting a prompt for a session
#[derive(Debug)]
pub enum Submission {
    Generated(GeneratedImage),
    Failed(GenerationError),
    /// A generation was already in flight; nothing was sent
    Busy,
}

/// Generate one image and store it as the session's `index`-th file
pub async fn generate_image(
    client: &ImageClient,
    store: &ImageStore,
    session_id: Uuid,
    index: usize,
    prompt: &str,
) -> Result<GeneratedImage, GenerationError> {
    info!("Generating image {} for session {}", index, session_id);

    let file_name = ImageStore::file_name(&session_id, index);
    store.ensure_available(&file_name).await?;

    let url = client.generate(prompt).await?;
    debug!("Image generated at URL: {}", url);

    let bytes = client.fetch(&url).await?;

    let (image, png) = tokio::task::spawn_blocking(move || decode_to_png(&bytes))
        .await
        .map_err(|e| GenerationError::Join(e.to_string()))??;

    let path = store.write_new(&file_name, png).await?;

    info!(
        "Image {} stored at {} ({}x{})",
        index,
        path.display(),
        image.width(),
        image.height()
    );

    Ok(GeneratedImage {
        image,
        path,
        file_name,
    })
}

/// Run one generation for a session, guarded by its busy flag.
///
/// History is appended only on success. The busy flag is cleared on every
/// exit, and the session counts as active once the result is in.
pub async fn submit_prompt(
    client: &ImageClient,
    store: &ImageStore,
    session: &Session,
    prompt: &str,
) -> Submission {
    let Some(_in_flight) = session.begin_generation() else {
        debug!("Session {} already generating, rejecting submit", session.id());
        return Submission::Busy;
    };

    let result = generate_image(client, store, session.id(), session.next_index(), prompt).await;
    session.touch();

    match result {
        Ok(generated) => {
            session.append(Generation::new(prompt, generated.path.clone()));
            Submission::Generated(generated)
        }
        Err(e) => {
            warn!("Generation failed for session {}: {}", session.id(), e);
            Submission::Failed(e)
        }
    }
}

/// Decode any supported format and re-encode as PNG
fn decode_to_png(bytes: &[u8]) -> Result<(DynamicImage, Vec<u8>), image::ImageError> {
    let image = image::load_from_memory(bytes)?;
    let mut png = Vec::new();
    image.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
    Ok((image, png))
}
