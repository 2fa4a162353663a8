//! Files we write for the user to download.
//!
//! Every artifact is named after the storage key, minus its extension.

use image::DynamicImage;
use serde_json::ser::PrettyFormatter;

use crate::{
    async_utils::{io::write_file_creating_dirs, spawn_blocking_propagating_panics},
    ingest::encode_png,
    prelude::*,
};

/// Names of the artifacts for one scan, relative to the output directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArtifactNames {
    /// Lines of text, one per line.
    pub text: PathBuf,
    /// Lines of text, as a JSON array.
    pub lines: PathBuf,
    /// The raw service response.
    pub response: PathBuf,
    /// The image with detected lines outlined.
    pub annotated: PathBuf,
}

impl ArtifactNames {
    /// Derive artifact names from a storage key like `Invoices/invoice_2023_01_05_07_08_09.png`.
    pub fn for_key(key: &str) -> Self {
        let stem = Path::new(key).with_extension("");
        let stem = stem.to_string_lossy();
        Self {
            text: PathBuf::from(format!("{stem}_text.txt")),
            lines: PathBuf::from(format!("{stem}_lines.json")),
            response: PathBuf::from(format!("{stem}_response.json")),
            annotated: PathBuf::from(format!("{stem}_annotated.png")),
        }
    }
}

/// What goes into the artifacts.
pub struct Artifacts<'a> {
    pub lines: &'a [String],
    pub raw_response: &'a Value,
    pub annotated: &'a DynamicImage,
}

/// Serialize JSON with 4-space indentation.
pub fn to_json_pretty(value: &impl Serialize) -> Result<String> {
    let mut buf = Vec::new();
    let mut ser =
        serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
    value
        .serialize(&mut ser)
        .context("failed to serialize JSON")?;
    String::from_utf8(buf).context("serialized JSON was not UTF-8")
}

/// Write all artifacts for `key` under `out_dir`, returning the paths
/// written.
#[instrument(level = "debug", skip(artifacts))]
pub async fn write_artifacts(
    out_dir: &Path,
    key: &str,
    artifacts: Artifacts<'_>,
) -> Result<Vec<PathBuf>> {
    let names = ArtifactNames::for_key(key);

    let annotated = artifacts.annotated.clone();
    let png_bytes = spawn_blocking_propagating_panics(move || encode_png(&annotated)).await?;

    let files = [
        (names.text, artifacts.lines.join("\n").into_bytes()),
        (names.lines, to_json_pretty(&artifacts.lines)?.into_bytes()),
        (
            names.response,
            to_json_pretty(artifacts.raw_response)?.into_bytes(),
        ),
        (names.annotated, png_bytes),
    ];
    let mut written = Vec::with_capacity(files.len());
    for (name, data) in files {
        let path = out_dir.join(name);
        write_file_creating_dirs(&path, &data).await?;
        debug!(path = %path.display(), "Wrote artifact");
        written.push(path);
    }
    Ok(written)
}
