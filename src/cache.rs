//! Optional on-disk cache of raw Textract responses.
//!
//! Entries are keyed on a hash of the normalized image, the bucket and the
//! storage key, never on client handles. A hit lets us skip both the upload
//! and the detection call. Only responses which validated get stored.

use sha2::{Digest as _, Sha256};

use crate::prelude::*;

/// A directory of raw Textract responses, one JSON file each.
#[derive(Clone, Debug)]
pub struct ResponseCache {
    dir: PathBuf,
}

impl ResponseCache {
    /// Create a cache in `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Compute the cache key for a normalized PNG stored at `bucket`/`key`.
    pub fn cache_key(png_bytes: &[u8], bucket: &str, key: &str) -> String {
        let mut hasher = Sha256::new();
        // Length-prefix each field so that different splits can't collide.
        for field in [png_bytes, bucket.as_bytes(), key.as_bytes()] {
            hasher.update((field.len() as u64).to_le_bytes());
            hasher.update(field);
        }
        format!("{:x}", hasher.finalize())
    }

    fn entry_path(&self, cache_key: &str) -> PathBuf {
        self.dir.join(format!("{cache_key}.json"))
    }

    /// Look up an entry.
    #[instrument(level = "debug", skip(self))]
    pub async fn get(&self, cache_key: &str) -> Result<Option<Value>> {
        let path = self.entry_path(cache_key);
        let data = match tokio::fs::read_to_string(&path).await {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("failed to read cache entry {:?}", path.display())
                });
            }
        };
        let entry = serde_json::from_str(&data).with_context(|| {
            format!("failed to parse cache entry {:?}", path.display())
        })?;
        debug!("Cache hit");
        Ok(Some(entry))
    }

    /// Store an entry.
    #[instrument(level = "debug", skip(self, raw_response))]
    pub async fn put(&self, cache_key: &str, raw_response: &Value) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| {
                format!("failed to create cache directory {:?}", self.dir.display())
            })?;
        let path = self.entry_path(cache_key);
        let data =
            serde_json::to_string(raw_response).context("failed to serialize cache entry")?;
        tokio::fs::write(&path, data)
            .await
            .with_context(|| format!("failed to write cache entry {:?}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_depends_on_every_argument() {
        let object = "Invoices/invoice_2026_10_19_12_00_00.png";
        let key = ResponseCache::cache_key(b"png", "bucket", object);
        assert_eq!(key.len(), 64);
        assert_eq!(key, ResponseCache::cache_key(b"png", "bucket", object));
        for other in [
            ResponseCache::cache_key(b"png!", "bucket", object),
            ResponseCache::cache_key(b"png", "bucket2", object),
            ResponseCache::cache_key(b"png", "bucket", "Invoices/invoice_2026_10_19_12_00_01.png"),
            ResponseCache::cache_key(b"pngbucket", "", object),
        ] {
            assert_ne!(key, other);
        }
    }

    #[tokio::test]
    async fn stores_and_loads_entries() -> Result<()> {
        let tmpdir = tempfile::TempDir::with_prefix("cache")?;
        let cache = ResponseCache::new(tmpdir.path().join("nested"));
        assert_eq!(cache.get("abc").await?, None);

        let entry = json!({ "Blocks": [] });
        cache.put("abc", &entry).await?;
        assert_eq!(cache.get("abc").await?, Some(entry));
        Ok(())
    }

    #[tokio::test]
    async fn corrupt_entries_are_errors() -> Result<()> {
        let tmpdir = tempfile::TempDir::with_prefix("cache")?;
        tokio::fs::write(tmpdir.path().join("abc.json"), "not json").await?;
        let cache = ResponseCache::new(tmpdir.path());
        assert!(cache.get("abc").await.is_err());
        Ok(())
    }
}
