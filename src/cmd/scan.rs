//! The `scan` subcommand.

use chrono::Utc;
use clap::Args;
use image::GenericImageView as _;

use crate::{
    aws::load_aws_config,
    cache::ResponseCache,
    cmd::OutputOpts,
    detect::TextractDetector,
    pipeline::{Collaborators, ScanRequest, scan_document},
    prelude::*,
    storage::S3Store,
    ui::Ui,
};

/// Scan command line arguments.
#[derive(Debug, Args)]
pub struct ScanOpts {
    /// The image to scan (PNG or JPEG).
    pub image_path: PathBuf,

    /// The S3 bucket to upload the image to.
    #[clap(long, env = "DOC_SCANNER_BUCKET")]
    pub bucket: String,

    /// The folder within the bucket, such as `Invoices`, `Reports`,
    /// `Origination` or `Taxes`.
    #[clap(long, env = "DOC_SCANNER_FOLDER", default_value = "test", value_parser = parse_key_segment)]
    pub folder: String,

    /// The document type, such as `invoice`, `report`, `application` or
    /// `1098`.
    #[clap(long = "type", env = "DOC_SCANNER_TYPE", default_value = "doc", value_parser = parse_key_segment)]
    pub doc_type: String,

    /// The AWS region to use. Defaults to the standard AWS configuration.
    #[clap(long)]
    pub region: Option<String>,

    /// Cache Textract responses in this directory, and reuse them when the
    /// same image is scanned again.
    #[clap(long, env = "DOC_SCANNER_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    #[clap(flatten)]
    pub output: OutputOpts,
}

/// Folder and document type names become part of the storage key.
fn parse_key_segment(value: &str) -> Result<String, String> {
    if value.is_empty() {
        Err("must not be empty".to_owned())
    } else if value.contains('/') {
        Err("must not contain '/'".to_owned())
    } else {
        Ok(value.to_owned())
    }
}

/// The `scan` subcommand.
#[instrument(level = "debug", skip_all, fields(image = %opts.image_path.display()))]
pub async fn cmd_scan(ui: Ui, opts: &ScanOpts) -> Result<()> {
    let bytes = tokio::fs::read(&opts.image_path)
        .await
        .with_context(|| format!("failed to read {:?}", opts.image_path.display()))?;

    let config = load_aws_config(opts.region.as_deref()).await?;
    let store = S3Store::new(&config);
    let detector = TextractDetector::new(&config);
    let cache = opts.cache_dir.as_ref().map(ResponseCache::new);

    let request = ScanRequest {
        bucket: opts.bucket.clone(),
        folder: opts.folder.clone(),
        doc_type: opts.doc_type.clone(),
        uploaded_at: Utc::now(),
    };
    let output = scan_document(
        &ui,
        bytes,
        &request,
        Collaborators {
            store: &store,
            detector: &detector,
            cache: cache.as_ref(),
        },
    )
    .await?;

    opts.output
        .write(&output.key, &output.annotation, &output.raw_response)
        .await?;
    let (width, height) = output.image.dimensions();
    let response = &output.annotation.response;
    info!(
        key = %output.key,
        width,
        height,
        pages = response.document_metadata.pages,
        model_version = %response.detect_document_text_model_version,
        lines = output.annotation.lines.len(),
        "Scanned document"
    );
    Ok(())
}
