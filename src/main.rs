use std::str::FromStr;

use clap::{Parser, Subcommand};
use tracing_subscriber::{
    EnvFilter, Layer as _, filter::Directive, fmt::format::FmtSpan, layer::SubscriberExt,
    util::SubscriberInitExt as _,
};

use self::{prelude::*, ui::Ui};

mod artifacts;
mod async_utils;
mod aws;
mod cache;
mod cmd;
mod detect;
mod ingest;
mod model;
mod overlay;
mod pipeline;
mod prelude;
mod storage;
mod ui;

/// Scan document images with AWS Textract and draw the detected lines.
#[derive(Debug, Parser)]
#[clap(
    version,
    author,
    after_help = r#"
Environment Variables:
  - DOC_SCANNER_BUCKET: The S3 bucket to upload images to.
  - DOC_SCANNER_FOLDER (optional): The folder within the bucket.
  - DOC_SCANNER_TYPE (optional): The document type.
  - DOC_SCANNER_CACHE_DIR (optional): Where to cache Textract responses.

  Standard AWS environment variables and credential files
  are used for S3 and Textract.

  These variables may be set in a standard `.env` file.
"#
)]
struct Opts {
    #[clap(subcommand)]
    subcmd: Cmd,
}

/// The subcommands we support.
#[derive(Debug, Subcommand)]
enum Cmd {
    /// Upload an image, detect its text, and write the annotated image and
    /// text files.
    Scan(cmd::scan::ScanOpts),
    /// Draw a saved Textract response on its image, without calling AWS.
    Render(cmd::render::RenderOpts),
    /// Print the JSON Schema for Textract responses.
    Schema(cmd::schema::SchemaOpts),
}

impl Cmd {
    /// Are we using stdout for output?
    fn using_stdout_for_output(&self) -> bool {
        match self {
            Cmd::Scan(_) | Cmd::Render(_) => false,
            Cmd::Schema(opts) => opts.output_path.is_none(),
        }
    }
}

/// Our entry point, which can return an error. [`anyhow::Result`] will
/// automatically print a nice error message with optional backtrace.
#[tokio::main]
async fn main() -> Result<()> {
    let ui = Ui::init();

    // Initialize tracing.
    let directive =
        Directive::from_str("info").expect("built-in directive should be valid");
    let env_filter = EnvFilter::builder()
        .with_default_directive(directive)
        .from_env_lossy();

    let subscriber = tracing_subscriber::fmt::layer()
        .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
        .with_writer(ui.get_stderr_writer())
        .with_filter(env_filter);
    tracing_subscriber::registry().with(subscriber).init();

    real_main(ui).await
}

/// Our real entry point.
#[instrument(level = "debug", name = "main", skip_all)]
async fn real_main(ui: Ui) -> Result<()> {
    // Load environment variables from a `.env` file, if it exists. This
    // needs to happen before we parse arguments, which may come from the
    // environment.
    dotenvy::dotenv().ok();

    let opts = Opts::parse();
    debug!("Parsed options: {:?}", opts);

    if opts.subcmd.using_stdout_for_output() {
        ui.hide_progress_bars();
    }

    match &opts.subcmd {
        Cmd::Scan(opts) => cmd::scan::cmd_scan(ui, opts).await,
        Cmd::Render(opts) => cmd::render::cmd_render(ui, opts).await,
        Cmd::Schema(opts) => cmd::schema::cmd_schema(opts).await,
    }
}
