// src/store/mod.rs

//! Content-addressable storage with tombstone-tracked secure removal.
//!
//! Content is stored by its digest under a two-level sharded directory
//! (`<first-2-hex>/<rest>`), written atomically via a temp file and rename,
//! and deduplicated by simply skipping the write when the target already
//! exists. Every digest the store has ever obliterated is marked with a
//! zero-byte tombstone file under `tombstones/`, alongside the sharded
//! object tree. The tombstone is what lets `exists`/`retrieve` keep
//! answering "no" forever after a secure removal, and it is checked on
//! disk rather than kept only in memory, so the guarantee holds across
//! separate `ContentStore` handles opened on the same directory, not just
//! within one process's lifetime. An in-memory cache avoids re-reading the
//! filesystem for digests this handle has already resolved.

use crate::error::{Error, Result};
use crate::hash::{self, Digest};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;
use zeroize::Zeroizing;

/// Optional capacity bound on total stored bytes. Off by default; when set,
/// `store` returns `ResourceExhausted` rather than writing past the bound.
#[derive(Debug, Clone, Default)]
pub struct StoreConfig {
    pub max_bytes: Option<u64>,
}

const TOMBSTONES_DIR: &str = "tombstones";

/// Content-addressable object store.
pub struct ContentStore {
    objects_dir: PathBuf,
    tombstones_dir: PathBuf,
    config: StoreConfig,
    // Caches tombstone lookups already confirmed on disk, to avoid a stat
    // per call. Never caches a negative result, since another handle on
    // the same directory could obliterate the digest at any time.
    tombstone_cache: Mutex<HashMap<Digest, ()>>,
    bytes_stored: Mutex<u64>,
}

impl ContentStore {
    pub fn new<P: AsRef<Path>>(objects_dir: P) -> Result<Self> {
        Self::with_config(objects_dir, StoreConfig::default())
    }

    pub fn with_config<P: AsRef<Path>>(objects_dir: P, config: StoreConfig) -> Result<Self> {
        let objects_dir = objects_dir.as_ref().to_path_buf();
        let tombstones_dir = objects_dir.join(TOMBSTONES_DIR);
        if !objects_dir.exists() {
            fs::create_dir_all(&objects_dir)?;
            debug!(dir = %objects_dir.display(), "created content store directory");
        }
        fs::create_dir_all(&tombstones_dir)?;
        Ok(Self {
            objects_dir,
            tombstones_dir,
            config,
            tombstone_cache: Mutex::new(HashMap::new()),
            bytes_stored: Mutex::new(0),
        })
    }

    /// Store content, returning its digest. A no-op if the content is
    /// already present (deduplication). Fails if the digest has been
    /// obliterated: obliteration is irreversible, and re-storing the same
    /// bytes would silently defeat that guarantee.
    pub fn store(&self, content: &[u8]) -> Result<Digest> {
        let digest = hash::hash(content);

        if self.is_obliterated(&digest) {
            return Err(Error::InvalidState(format!(
                "digest {digest} was obliterated and cannot be re-stored"
            )));
        }

        let path = self.path_for(&digest);
        if path.exists() {
            debug!(%digest, "content already stored, skipping write");
            return Ok(digest);
        }

        if let Some(max) = self.config.max_bytes {
            let mut used = self.bytes_stored.lock().expect("lock poisoned");
            if *used + content.len() as u64 > max {
                return Err(Error::ResourceExhausted(format!(
                    "storing {} more bytes would exceed the {max}-byte store bound",
                    content.len()
                )));
            }
            *used += content.len() as u64;
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let temp_path = path.with_extension("tmp");
        {
            let mut file = File::create(&temp_path)?;
            file.write_all(content)?;
            file.sync_all()?;
        }
        fs::rename(&temp_path, &path)?;

        debug!(%digest, bytes = content.len(), "stored content");
        Ok(digest)
    }

    /// Retrieve content by digest, re-verifying the hash on read.
    pub fn retrieve(&self, digest: &Digest) -> Result<Vec<u8>> {
        if self.is_obliterated(digest) {
            return Err(Error::ContentUnavailable(digest.to_string()));
        }

        let path = self.path_for(digest);
        if !path.exists() {
            return Err(Error::NotFound(format!("content {digest} not in store")));
        }

        let mut file = File::open(&path)?;
        let mut content = Vec::new();
        file.read_to_end(&mut content)?;

        let actual = hash::hash(&content);
        if actual != *digest {
            return Err(Error::InvalidState(format!(
                "hash axiom violated: object at {} hashes to {actual}, expected {digest}",
                path.display()
            )));
        }

        Ok(content)
    }

    /// Whether the digest currently resolves to live content. Returns
    /// `false` both for digests never stored and for obliterated ones.
    pub fn exists(&self, digest: &Digest) -> bool {
        if self.is_obliterated(digest) {
            return false;
        }
        self.path_for(digest).exists()
    }

    /// Securely remove content: overwrite the backing bytes `passes` times
    /// (pattern `0x00, 0xFF, random, random, ...`), then delete the file and
    /// set a permanent tombstone. Returns the number of passes actually
    /// performed. A no-op (but not an error) if the digest was never
    /// stored or is already obliterated — callers implementing
    /// batch-obliterate rely on this to skip-and-continue.
    pub fn remove_secure(&self, digest: &Digest, passes: u32) -> Result<u32> {
        if passes < 1 {
            return Err(Error::InvalidState(
                "remove_secure requires at least one overwrite pass".into(),
            ));
        }

        if self.is_obliterated(digest) {
            return Ok(0);
        }

        let path = self.path_for(digest);
        if !path.exists() {
            self.mark_obliterated(digest)?;
            return Ok(0);
        }

        let len = fs::metadata(&path)?.len() as usize;
        self.overwrite_passes(&path, len, passes)?;
        fs::remove_file(&path)?;
        self.mark_obliterated(digest)?;

        debug!(%digest, passes, "securely removed content");
        Ok(passes)
    }

    fn overwrite_passes(&self, path: &Path, len: usize, passes: u32) -> Result<()> {
        let mut file = File::options().write(true).open(path)?;
        for pass in 0..passes {
            let mut buf = Zeroizing::new(vec![0u8; len]);
            match pass {
                0 => buf.fill(0x00),
                1 => buf.fill(0xFF),
                _ => rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut buf),
            }
            use std::io::Seek;
            file.seek(std::io::SeekFrom::Start(0))?;
            file.write_all(&buf)?;
            file.sync_all()?;
        }
        Ok(())
    }

    fn mark_obliterated(&self, digest: &Digest) -> Result<()> {
        let marker = self.tombstone_path(digest);
        File::create(&marker)?.sync_all()?;
        self.tombstone_cache
            .lock()
            .expect("lock poisoned")
            .insert(*digest, ());
        Ok(())
    }

    /// Whether this digest has ever been obliterated, independent of
    /// whether it is currently stored. Checked on disk (with an in-memory
    /// cache for confirmed positives) so the tombstone is visible to any
    /// `ContentStore` handle opened on the same directory, not just the
    /// one that performed the obliteration.
    pub fn is_obliterated(&self, digest: &Digest) -> bool {
        if self
            .tombstone_cache
            .lock()
            .expect("lock poisoned")
            .contains_key(digest)
        {
            return true;
        }
        let marked = self.tombstone_path(digest).exists();
        if marked {
            self.tombstone_cache
                .lock()
                .expect("lock poisoned")
                .insert(*digest, ());
        }
        marked
    }

    fn tombstone_path(&self, digest: &Digest) -> PathBuf {
        self.tombstones_dir.join(digest.to_hex())
    }

    fn path_for(&self, digest: &Digest) -> PathBuf {
        let hex = digest.to_hex();
        let (prefix, suffix) = hex.split_at(2);
        self.objects_dir.join(prefix).join(suffix)
    }

    pub fn objects_dir(&self) -> &Path {
        &self.objects_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, ContentStore) {
        let dir = TempDir::new().unwrap();
        let store = ContentStore::new(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn store_and_retrieve_roundtrip() {
        let (_dir, store) = store();
        let digest = store.store(b"hello world").unwrap();
        assert_eq!(store.retrieve(&digest).unwrap(), b"hello world");
    }

    #[test]
    fn deduplicates_identical_content() {
        let (_dir, store) = store();
        let a = store.store(b"same content").unwrap();
        let b = store.store(b"same content").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn retrieve_nonexistent_is_not_found() {
        let (_dir, store) = store();
        let digest = hash::hash(b"never stored");
        assert!(matches!(store.retrieve(&digest), Err(Error::NotFound(_))));
    }

    #[test]
    fn remove_secure_clears_existence_permanently() {
        let (_dir, store) = store();
        let digest = store.store(b"sensitive").unwrap();
        assert!(store.exists(&digest));

        store.remove_secure(&digest, 3).unwrap();

        assert!(!store.exists(&digest));
        assert!(matches!(
            store.retrieve(&digest),
            Err(Error::ContentUnavailable(_))
        ));
        assert!(store.is_obliterated(&digest));
    }

    #[test]
    fn remove_secure_blocks_restore_via_store() {
        let (_dir, store) = store();
        let digest = store.store(b"sensitive").unwrap();
        store.remove_secure(&digest, 3).unwrap();

        let result = store.store(b"sensitive");
        assert!(matches!(result, Err(Error::InvalidState(_))));
    }

    #[test]
    fn remove_secure_is_idempotent_and_skips_absent() {
        let (_dir, store) = store();
        let digest = hash::hash(b"was never here");
        let passes = store.remove_secure(&digest, 3).unwrap();
        assert_eq!(passes, 0);
        assert!(store.is_obliterated(&digest));

        let passes_again = store.remove_secure(&digest, 3).unwrap();
        assert_eq!(passes_again, 0);
    }

    #[test]
    fn capacity_bound_rejects_overflow() {
        let dir = TempDir::new().unwrap();
        let store =
            ContentStore::with_config(dir.path(), StoreConfig { max_bytes: Some(4) }).unwrap();

        let result = store.store(b"too many bytes");
        assert!(matches!(result, Err(Error::ResourceExhausted(_))));
    }

    #[test]
    fn sharded_path_uses_first_two_hex_chars() {
        let (dir, store) = store();
        let digest = store.store(b"shard me").unwrap();
        let hex = digest.to_hex();
        let expected = dir.path().join(&hex[..2]).join(&hex[2..]);
        assert!(expected.exists());
    }
}
