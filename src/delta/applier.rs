// src/delta/applier.rs

//! Delta applier to reconstruct new version from old version + delta
//!
//! Uses zstd dictionary decompression with the old version as dictionary.

use crate::error::{Error, Result};
use crate::hash::Digest;
use crate::store::ContentStore;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

/// Delta applier to reconstruct new version from old version + delta
pub struct DeltaApplier {
    store: ContentStore,
}

impl DeltaApplier {
    /// Create a new delta applier
    pub fn new(objects_dir: &Path) -> Result<Self> {
        let store = ContentStore::new(objects_dir)?;
        Ok(Self { store })
    }

    /// Apply a delta to reconstruct the new version, verifying it against
    /// `expected_new_digest` before trusting it.
    pub fn apply_delta(
        &self,
        old_digest: &Digest,
        delta_path: &Path,
        expected_new_digest: &Digest,
    ) -> Result<Digest> {
        info!(old = %old_digest, expected_new = %expected_new_digest, "applying delta");

        let old_content = self.store.retrieve(old_digest)?;
        debug!(bytes = old_content.len(), "old version retrieved");

        let mut delta_file = File::open(delta_path)?;
        let mut delta = Vec::new();
        delta_file.read_to_end(&mut delta)?;
        debug!(bytes = delta.len(), "delta loaded");

        let new_content = self.decompress_with_dictionary(&delta, &old_content)?;
        debug!(bytes = new_content.len(), "new version reconstructed");

        let actual_digest = self.store.store(&new_content)?;

        if actual_digest != *expected_new_digest {
            return Err(Error::ChecksumMismatch {
                expected: expected_new_digest.to_hex(),
                actual: actual_digest.to_hex(),
            });
        }

        info!(
            old_bytes = old_content.len(),
            new_bytes = new_content.len(),
            "delta applied successfully"
        );

        Ok(actual_digest)
    }

    fn decompress_with_dictionary(&self, compressed: &[u8], dictionary: &[u8]) -> Result<Vec<u8>> {
        let decoder_dict = zstd::dict::DecoderDictionary::copy(dictionary);

        let mut decoder = zstd::Decoder::with_prepared_dictionary(compressed, &decoder_dict)?;

        let mut decompressed = Vec::new();
        decoder.read_to_end(&mut decompressed)?;

        Ok(decompressed)
    }
}
