//! Command-line entry points.

use clap::Args;

use crate::{artifacts::Artifacts, pipeline::Annotation, prelude::*};

pub mod render;
pub mod scan;
pub mod schema;

/// Where to put the files we produce.
#[derive(Debug, Clone, Args)]
pub struct OutputOpts {
    /// Directory to write the annotated image and text files to.
    #[clap(short = 'o', long = "out-dir", default_value = ".")]
    pub out_dir: PathBuf,
}

impl OutputOpts {
    /// Write the artifacts for an annotated image named after `key`.
    pub async fn write(
        &self,
        key: &str,
        annotation: &Annotation,
        raw_response: &Value,
    ) -> Result<()> {
        let written = crate::artifacts::write_artifacts(
            &self.out_dir,
            key,
            Artifacts {
                lines: &annotation.lines,
                raw_response,
                annotated: &annotation.annotated,
            },
        )
        .await?;
        for path in written {
            info!(path = %path.display(), "Wrote file");
        }
        Ok(())
    }
}
