//! FakeProvider - mockito server speaking the images API
//!
//! Serves `POST /images/generations` and the image URL it hands out, so a
//! test controls every byte the server receives.

use std::io::Cursor;

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use mockito::{Matcher, Mock, ServerGuard};
use serde_json::json;

/// API key the test server is configured with
pub const TEST_API_KEY: &str = "sk-test";

/// Path the fake provider hosts generated images under
const IMAGE_PATH: &str = "/files/generated.png";

/// A small valid PNG
pub fn sample_png() -> Vec<u8> {
    let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(16, 16, Rgb([180, 20, 20])));
    let mut out = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
        .expect("encode sample png");
    out
}

/// Mocks registered for one scenario; dropping them unregisters them
pub struct ProviderMocks {
    pub generate: Mock,
    pub image: Mock,
}

impl ProviderMocks {
    /// Assert both endpoints saw the expected number of hits
    pub async fn assert(&self) {
        self.generate.assert_async().await;
        self.image.assert_async().await;
    }
}

pub struct FakeProvider {
    server: ServerGuard,
}

impl FakeProvider {
    pub async fn start() -> Self {
        Self {
            server: mockito::Server::new_async().await,
        }
    }

    /// Base URL to configure the image client with
    pub fn base_url(&self) -> String {
        self.server.url()
    }

    fn generation_mock(&mut self) -> mockito::Mock {
        self.server
            .mock("POST", "/images/generations")
            .match_header("authorization", format!("Bearer {}", TEST_API_KEY).as_str())
            .match_body(Matcher::PartialJson(json!({
                "model": "dall-e-3",
                "n": 1,
                "size": "1024x1024",
                "quality": "standard"
            })))
    }

    /// Answer `hits` generations with a URL to `body`
    pub async fn serve_image(&mut self, body: Vec<u8>, hits: usize) -> ProviderMocks {
        let image_url = format!("{}{}", self.server.url(), IMAGE_PATH);

        let generate = self
            .generation_mock()
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({ "created": 1, "data": [{ "url": image_url }] }).to_string())
            .expect(hits)
            .create_async()
            .await;

        let image = self
            .server
            .mock("GET", IMAGE_PATH)
            .with_status(200)
            .with_header("content-type", "image/png")
            .with_body(body)
            .expect(hits)
            .create_async()
            .await;

        ProviderMocks { generate, image }
    }

    /// Answer `hits` generations with a valid PNG
    pub async fn serve_png(&mut self, hits: usize) -> ProviderMocks {
        self.serve_image(sample_png(), hits).await
    }

    /// Reject generations with an API error
    pub async fn reject(&mut self, status: usize, message: &str) -> Mock {
        self.generation_mock()
            .with_status(status)
            .with_header("content-type", "application/json")
            .with_body(json!({ "error": { "message": message } }).to_string())
            .create_async()
            .await
    }
}
