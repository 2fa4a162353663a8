//! I/O utilities.

use tokio::{
    fs::{self, File},
    io::{AsyncWrite, AsyncWriteExt as _},
};

use crate::prelude::*;

/// Create an [`AsyncWrite`] for a file or stdout.
pub async fn create_writer(
    path: Option<&Path>,
) -> Result<Box<dyn AsyncWrite + Unpin + Send + Sync + 'static>> {
    match path {
        Some(path) => {
            let file = File::create(path)
                .await
                .with_context(|| format!("Failed to create file at path: {:?}", path))?;
            Ok(Box::new(file))
        }
        None => Ok(Box::new(tokio::io::stdout())),
    }
}

/// Write `data` to `path`, creating any missing parent directories.
pub async fn write_file_creating_dirs(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create directory: {:?}", parent))?;
    }
    let mut file = File::create(path)
        .await
        .with_context(|| format!("Failed to create file at path: {:?}", path))?;
    file.write_all(data)
        .await
        .with_context(|| format!("Failed to write file at path: {:?}", path))?;
    file.flush()
        .await
        .with_context(|| format!("Failed to flush file at path: {:?}", path))?;
    Ok(())
}
