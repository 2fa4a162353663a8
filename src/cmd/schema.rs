//! The `schema` subcommand.

use clap::Args;
use schemars::schema_for;
use tokio::io::AsyncWriteExt as _;

use crate::{async_utils::io::create_writer, model::DetectionResponse, prelude::*};

/// Schema command line arguments.
#[derive(Debug, Args)]
pub struct SchemaOpts {
    /// The output path to write the schema to.
    #[clap(short = 'o', long = "out")]
    pub output_path: Option<PathBuf>,
}

/// The `schema` subcommand: print the JSON Schema for Textract responses.
#[instrument(level = "debug", skip_all)]
pub async fn cmd_schema(schema_opts: &SchemaOpts) -> Result<()> {
    let schema = schema_for!(DetectionResponse);

    let mut wtr = create_writer(schema_opts.output_path.as_deref()).await?;
    let schema_str =
        serde_json::to_string_pretty(&schema).context("failed to serialize schema")?;
    wtr.write_all(schema_str.as_bytes())
        .await
        .context("failed to write schema")?;
    wtr.write_all(b"\n")
        .await
        .context("failed to write schema")?;
    wtr.flush().await.context("failed to flush schema")?;
    Ok(())
}
