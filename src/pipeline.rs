//! Scanning a single document, from uploaded bytes to annotated image.

use chrono::{DateTime, Utc};
use image::DynamicImage;

use crate::{
    async_utils::spawn_blocking_propagating_panics,
    cache::ResponseCache,
    detect::TextDetector,
    ingest::{check_supported_image, encode_png, normalize_orientation},
    model::DetectionResponse,
    overlay::render_overlay,
    prelude::*,
    storage::{ObjectStore, object_key},
    ui::{ProgressConfig, Ui},
};

/// Where and how to store a document.
#[derive(Clone, Debug)]
pub struct ScanRequest {
    /// The bucket to upload to.
    pub bucket: String,

    /// The folder within the bucket, such as `Invoices`.
    pub folder: String,

    /// The document type, such as `invoice`.
    pub doc_type: String,

    /// When the document was uploaded. Used to build the storage key.
    pub uploaded_at: DateTime<Utc>,
}

/// The external services a scan talks to.
pub struct Collaborators<'a> {
    pub store: &'a dyn ObjectStore,
    pub detector: &'a dyn TextDetector,
    pub cache: Option<&'a ResponseCache>,
}

/// Everything produced by a scan.
#[derive(Debug)]
pub struct ScanOutput {
    /// The storage key of the uploaded image.
    pub key: String,

    /// The uploaded image, in display orientation.
    pub image: DynamicImage,

    /// The response as the service sent it.
    pub raw_response: Value,

    /// What we found in the response.
    pub annotation: Annotation,
}

/// Output of [`annotate`].
#[derive(Debug)]
pub struct Annotation {
    /// The parsed response.
    pub response: DetectionResponse,

    /// The text of each detected line.
    pub lines: Vec<String>,

    /// The image with the detected lines outlined.
    pub annotated: DynamicImage,
}

/// Scan a document: upload it, detect text, and draw what we found.
///
/// Any failure aborts the scan.
#[instrument(level = "debug", skip_all, fields(bucket = %request.bucket))]
pub async fn scan_document(
    ui: &Ui,
    bytes: Vec<u8>,
    request: &ScanRequest,
    collaborators: Collaborators<'_>,
) -> Result<ScanOutput> {
    let spinner = ui.new_spinner(&ProgressConfig {
        emoji: "🖼️",
        msg: "Loading image",
        done_msg: "Loaded image",
    });
    check_supported_image(&bytes)?;
    let (image, png_bytes) = spawn_blocking_propagating_panics(move || {
        let image = normalize_orientation(&bytes)?;
        let png_bytes = encode_png(&image)?;
        Ok::<_, anyhow::Error>((image, png_bytes))
    })
    .await?;
    spinner.finish();

    let key = object_key(&request.folder, &request.doc_type, request.uploaded_at);
    let cache_key = collaborators
        .cache
        .map(|_| ResponseCache::cache_key(&png_bytes, &request.bucket, &key));
    let cached = match (collaborators.cache, &cache_key) {
        (Some(cache), Some(cache_key)) => cache.get(cache_key).await?,
        _ => None,
    };

    let (key, raw_response, fresh) = match cached {
        Some(raw_response) => {
            info!(%key, "Using cached response");
            (key, raw_response, false)
        }
        None => {
            let spinner = ui.new_spinner(&ProgressConfig {
                emoji: "☁️",
                msg: "Uploading image",
                done_msg: "Uploaded image",
            });
            let key = collaborators
                .store
                .put(png_bytes, &request.bucket, &key)
                .await?;
            spinner.finish_with_message(format!("Uploaded image as {key}"));

            let spinner = ui.new_spinner(&ProgressConfig {
                emoji: "🔍",
                msg: "Detecting text in the image",
                done_msg: "Detected text",
            });
            let raw_response = collaborators.detector.detect(&request.bucket, &key).await?;
            spinner.finish();
            (key, raw_response, true)
        }
    };

    let annotation = annotate(ui, image.clone(), raw_response.clone()).await?;

    // Only cache responses which validated.
    if fresh && let (Some(cache), Some(cache_key)) = (collaborators.cache, &cache_key) {
        cache.put(cache_key, &raw_response).await?;
    }

    Ok(ScanOutput {
        key,
        image,
        raw_response,
        annotation,
    })
}

/// Validate a raw response, extract its lines, and draw them on `image`.
#[instrument(level = "debug", skip_all)]
pub async fn annotate(ui: &Ui, image: DynamicImage, raw_response: Value) -> Result<Annotation> {
    let response = DetectionResponse::from_value(raw_response)?;
    let lines = response.extract_lines();
    info!("Found {} lines of text", lines.len());

    let spinner = ui.new_spinner(&ProgressConfig {
        emoji: "✏️",
        msg: "Drawing detected boxes",
        done_msg: "Drew detected boxes",
    });
    let (response, annotated) = spawn_blocking_propagating_panics(move || {
        let annotated = render_overlay(&image, &response);
        (response, annotated)
    })
    .await;
    spinner.finish();

    Ok(Annotation {
        response,
        lines,
        annotated,
    })
}
