//! The `render` subcommand, which draws a previously saved response without
//! talking to AWS.

use clap::Args;

use crate::{
    async_utils::spawn_blocking_propagating_panics,
    cmd::OutputOpts,
    ingest::{check_supported_image, normalize_orientation},
    pipeline::annotate,
    prelude::*,
    ui::Ui,
};

/// Render command line arguments.
#[derive(Debug, Args)]
pub struct RenderOpts {
    /// The image the response was produced from.
    pub image_path: PathBuf,

    /// A saved Textract response, such as a `*_response.json` file.
    pub response_path: PathBuf,

    #[clap(flatten)]
    pub output: OutputOpts,
}

/// The `render` subcommand.
#[instrument(level = "debug", skip_all, fields(image = %opts.image_path.display()))]
pub async fn cmd_render(ui: Ui, opts: &RenderOpts) -> Result<()> {
    let bytes = tokio::fs::read(&opts.image_path)
        .await
        .with_context(|| format!("failed to read {:?}", opts.image_path.display()))?;
    check_supported_image(&bytes)
        .with_context(|| format!("cannot load {:?}", opts.image_path.display()))?;
    let image = spawn_blocking_propagating_panics(move || normalize_orientation(&bytes)).await?;

    let raw = tokio::fs::read_to_string(&opts.response_path)
        .await
        .with_context(|| format!("failed to read {:?}", opts.response_path.display()))?;
    let raw_response: Value = serde_json::from_str(&raw).with_context(|| {
        format!("failed to parse JSON from {:?}", opts.response_path.display())
    })?;

    let annotation = annotate(&ui, image, raw_response.clone()).await?;

    // Name the outputs after the image, the way `scan` names them after the
    // storage key.
    let name = opts
        .image_path
        .file_name()
        .context("image path has no file name")?
        .to_string_lossy()
        .into_owned();
    opts.output.write(&name, &annotation, &raw_response).await
}
