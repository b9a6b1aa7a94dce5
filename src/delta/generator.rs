// src/delta/generator.rs

//! Delta generator using zstd dictionary compression
//!
//! Creates compressed deltas using the old version as a dictionary,
//! providing excellent compression for similar files.

use crate::error::Result;
use crate::hash::Digest;
use crate::store::ContentStore;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};

use super::DeltaMetrics;

/// Default zstd compression level (3 = fast, good compression)
const COMPRESSION_LEVEL: i32 = 3;

/// Delta generator using zstd dictionary compression
pub struct DeltaGenerator {
    pub(crate) store: ContentStore,
}

impl DeltaGenerator {
    /// Create a new delta generator
    pub fn new(objects_dir: &Path) -> Result<Self> {
        let store = ContentStore::new(objects_dir)?;
        Ok(Self { store })
    }

    /// Generate a delta from old version to new version.
    ///
    /// Both versions must already be present in the content store.
    pub fn generate_delta(
        &self,
        old_digest: &Digest,
        new_digest: &Digest,
        output_path: &Path,
    ) -> Result<DeltaMetrics> {
        info!(old = %old_digest, new = %new_digest, "generating delta");

        let old_content = self.store.retrieve(old_digest)?;
        let new_content = self.store.retrieve(new_digest)?;

        debug!(
            old_bytes = old_content.len(),
            new_bytes = new_content.len(),
            "retrieved content for delta"
        );

        let delta = self.compress_with_dictionary(&new_content, &old_content)?;

        let mut file = File::create(output_path)?;
        file.write_all(&delta)?;

        let metrics = DeltaMetrics::new(
            old_content.len() as u64,
            new_content.len() as u64,
            delta.len() as u64,
        );

        info!(
            delta_bytes = metrics.delta_size,
            ratio = metrics.compression_ratio,
            saved_pct = metrics.savings_percentage(),
            "delta generated"
        );

        Ok(metrics)
    }

    fn compress_with_dictionary(&self, data: &[u8], dictionary: &[u8]) -> Result<Vec<u8>> {
        let encoder_dict = zstd::dict::EncoderDictionary::copy(dictionary, COMPRESSION_LEVEL);

        let mut encoder = zstd::Encoder::with_prepared_dictionary(Vec::new(), &encoder_dict)?;

        encoder.write_all(data)?;
        Ok(encoder.finish()?)
    }
}
