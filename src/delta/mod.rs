// src/delta/mod.rs

//! Delta compression for efficient content transfer (experimental).
//!
//! Generates and applies deltas between two versions of content already
//! held in the content store, using zstd dictionary compression with the
//! old version as the dictionary. This is bandwidth-layer tooling, not
//! part of the reversible-operation contract: it neither reads nor writes
//! operation history, and an obliterated digest is simply unavailable to
//! it the same way it is to anything else calling into the store.
//!
//! ```text
//! delta = zstd_compress(new_content, dictionary = old_content)
//! ```

mod applier;
mod generator;
mod metrics;

pub use applier::DeltaApplier;
pub use generator::DeltaGenerator;
pub use metrics::{DeltaMetrics, MAX_DELTA_RATIO};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::store::ContentStore;
    use tempfile::TempDir;

    fn create_test_store() -> (TempDir, ContentStore) {
        let temp_dir = TempDir::new().unwrap();
        let store = ContentStore::new(temp_dir.path()).unwrap();
        (temp_dir, store)
    }

    #[test]
    fn generation_and_application_roundtrips() {
        let (temp, store) = create_test_store();
        let delta_path = temp.path().join("test.delta");

        let old_content = b"Hello, World! This is the old version.";
        let new_content = b"Hello, World! This is the NEW version with more text!";

        let old_digest = store.store(old_content).unwrap();
        let new_digest = store.store(new_content).unwrap();

        let generator = DeltaGenerator::new(temp.path()).unwrap();
        let metrics = generator
            .generate_delta(&old_digest, &new_digest, &delta_path)
            .unwrap();

        assert_eq!(metrics.old_size, old_content.len() as u64);
        assert_eq!(metrics.new_size, new_content.len() as u64);
        assert!(metrics.delta_size > 0);
        assert!(metrics.delta_size < new_content.len() as u64);

        let applier = DeltaApplier::new(temp.path()).unwrap();
        let result_digest = applier
            .apply_delta(&old_digest, &delta_path, &new_digest)
            .unwrap();

        assert_eq!(result_digest, new_digest);
        let result_content = store.retrieve(&result_digest).unwrap();
        assert_eq!(result_content, new_content);
    }

    #[test]
    fn application_rejects_hash_mismatch() {
        let (temp, store) = create_test_store();
        let delta_path = temp.path().join("test.delta");

        let old_content = b"Old content";
        let new_content = b"New content";

        let old_digest = store.store(old_content).unwrap();
        let new_digest = store.store(new_content).unwrap();

        let generator = DeltaGenerator::new(temp.path()).unwrap();
        generator
            .generate_delta(&old_digest, &new_digest, &delta_path)
            .unwrap();

        let applier = DeltaApplier::new(temp.path()).unwrap();
        let wrong_digest = crate::hash::hash(b"something else entirely");
        let result = applier.apply_delta(&old_digest, &delta_path, &wrong_digest);

        assert!(matches!(result, Err(Error::ChecksumMismatch { .. })));
    }

    #[test]
    fn large_difference_still_produces_a_delta() {
        let (temp, store) = create_test_store();
        let delta_path = temp.path().join("test.delta");

        let old_content = vec![0u8; 10_000];
        let new_content = vec![255u8; 10_000];

        let old_digest = store.store(&old_content).unwrap();
        let new_digest = store.store(&new_content).unwrap();

        let generator = DeltaGenerator::new(temp.path()).unwrap();
        let metrics = generator
            .generate_delta(&old_digest, &new_digest, &delta_path)
            .unwrap();
        assert!(metrics.delta_size > 0);

        let applier = DeltaApplier::new(temp.path()).unwrap();
        let result_digest = applier
            .apply_delta(&old_digest, &delta_path, &new_digest)
            .unwrap();
        assert_eq!(result_digest, new_digest);
    }

    #[test]
    fn similar_content_compresses_well() {
        let temp = TempDir::new().unwrap();
        let delta_path = temp.path().join("test.delta");

        let old_content = "fn main() { println!(\"version 1.0\"); }".repeat(100);
        let new_content = "fn main() { println!(\"version 1.1\"); }".repeat(100);

        let generator = DeltaGenerator::new(temp.path()).unwrap();
        let old_digest = generator.store.store(old_content.as_bytes()).unwrap();
        let new_digest = generator.store.store(new_content.as_bytes()).unwrap();

        let metrics = generator
            .generate_delta(&old_digest, &new_digest, &delta_path)
            .unwrap();

        assert!(metrics.is_worthwhile());
        assert!(metrics.compression_ratio < 0.5);

        let applier = DeltaApplier::new(temp.path()).unwrap();
        let result_digest = applier
            .apply_delta(&old_digest, &delta_path, &new_digest)
            .unwrap();
        assert_eq!(result_digest, new_digest);
    }
}
