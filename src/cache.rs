use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;

use crate::session::BackendUrl;
use crate::types::now_rfc3339;

/// Last successfully resolved backend, kept between launches to skip discovery.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CachedBackend {
    pub base_url: BackendUrl,
    pub resolved_at: String,
}

/// Read the cache. Missing or unreadable files yield `None`.
pub fn load(path: impl AsRef<Path>) -> Option<CachedBackend> {
    let path = path.as_ref();
    if !path.exists() {
        return None;
    }
    match read(path) {
        Ok(c) => Some(c),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable backend cache");
            None
        }
    }
}

fn read(path: &Path) -> Result<CachedBackend> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let cached = serde_json::from_reader(file)
        .with_context(|| format!("invalid backend cache: {}", path.display()))?;
    Ok(cached)
}

pub fn store(path: impl AsRef<Path>, url: &BackendUrl) -> Result<()> {
    let path = path.as_ref();
    let entry = CachedBackend {
        base_url: url.clone(),
        resolved_at: now_rfc3339(),
    };
    let file =
        File::create(path).with_context(|| format!("failed to write {}", path.display()))?;
    serde_json::to_writer_pretty(file, &entry)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backend.json");
        let url = BackendUrl::parse("http://192.168.1.55:8000").unwrap();
        store(&path, &url).unwrap();
        let cached = load(&path).unwrap();
        assert_eq!(cached.base_url, url);
        assert!(!cached.resolved_at.is_empty());
    }

    #[test]
    fn missing_or_corrupt_cache_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load(dir.path().join("absent.json")).is_none());
        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, r#"{"base_url": "ftp://nope", "resolved_at": "x"}"#).unwrap();
        assert!(load(&bad).is_none());
    }
}
