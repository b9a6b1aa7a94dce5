// src/obliteration/mod.rs

//! The obliteration subsystem: secure, irreversible erasure of content,
//! orthogonal to the reversible operation history.
//!
//! An obliteration permanently tombstones a digest in the content store
//! (see [`crate::store::ContentStore::remove_secure`]) and records a proof
//! of the act — not the erased content itself — in an append-only audit
//! log. The proof commits to the erased digest, a random nonce, and a
//! timestamp, so a verifier can check "this digest was obliterated at this
//! time" without the log ever holding recoverable content.

use crate::clock::Clock;
use crate::config::MIN_OVERWRITE_PASSES;
use crate::error::{Error, Result};
use crate::hash::{self, Digest};
use crate::store::ContentStore;
use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::info;
use uuid::Uuid;

/// Deterministic byte encoding used for the commitment hash. Kept distinct
/// from `Serialize` so the wire format obliteration proofs commit to never
/// drifts if the JSON representation's field order or formatting changes.
trait CanonicalBytes {
    fn canonical_bytes(&self) -> Vec<u8>;
}

/// A cryptographic record that a digest was obliterated, without revealing
/// the erased content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObliterationProof {
    pub id: Uuid,
    pub digest: Digest,
    pub reason: String,
    pub legal_basis: Option<String>,
    pub passes: u32,
    pub storage_cleared: bool,
    pub timestamp: DateTime<Utc>,
    nonce: [u8; 16],
    pub commitment: Digest,
}

struct CommitmentInput<'a> {
    digest: &'a Digest,
    nonce: &'a [u8; 16],
    timestamp: &'a DateTime<Utc>,
}

impl CanonicalBytes for CommitmentInput<'_> {
    fn canonical_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(32 + 16 + 8);
        bytes.extend_from_slice(self.digest.as_bytes());
        bytes.extend_from_slice(self.nonce);
        bytes.extend_from_slice(&self.timestamp.timestamp_millis().to_be_bytes());
        bytes
    }
}

impl ObliterationProof {
    fn new(
        digest: Digest,
        reason: String,
        legal_basis: Option<String>,
        passes: u32,
        storage_cleared: bool,
        now: DateTime<Utc>,
    ) -> Self {
        let mut nonce = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut nonce);
        let commitment = hash::hash(
            &CommitmentInput {
                digest: &digest,
                nonce: &nonce,
                timestamp: &now,
            }
            .canonical_bytes(),
        );
        Self {
            id: Uuid::new_v4(),
            digest,
            reason,
            legal_basis,
            passes,
            storage_cleared,
            timestamp: now,
            nonce,
            commitment,
        }
    }

    /// Recompute the commitment from the proof's own fields and check it
    /// matches. A mismatch means the proof record has been tampered with.
    /// This is independent of [`Self::is_valid`]: a proof can commit
    /// honestly to a weak erasure (too few passes) and still pass this
    /// check.
    pub fn verify_commitment(&self) -> bool {
        let expected = hash::hash(
            &CommitmentInput {
                digest: &self.digest,
                nonce: &self.nonce,
                timestamp: &self.timestamp,
            }
            .canonical_bytes(),
        );
        expected == self.commitment
    }

    /// Whether the erasure this proof attests to actually meets the
    /// minimum bar: storage was cleared and at least
    /// [`MIN_OVERWRITE_PASSES`] overwrite passes were performed.
    pub fn is_valid(&self) -> bool {
        self.storage_cleared && self.passes >= MIN_OVERWRITE_PASSES
    }
}

/// Append-only, CRC32-checksummed audit log of obliteration proofs. One
/// line per proof: `{crc32_hex}|{json}\n`, matching the operation-history
/// journal's framing so both logs can be read with the same tooling.
pub struct AuditLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl AuditLog {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    fn append(&self, proof: &ObliterationProof) -> Result<()> {
        let json = serde_json::to_string(proof)?;
        let crc = crc32fast::hash(json.as_bytes());
        let line = format!("{crc:08x}|{json}\n");

        let mut file = self.file.lock().expect("lock poisoned");
        file.write_all(line.as_bytes())?;
        file.sync_data()?;
        Ok(())
    }

    /// Read every proof in the log, skipping (and not erroring on) any
    /// trailing line whose checksum doesn't match — the same
    /// torn-write tolerance the operation journal uses.
    pub fn read_all(&self) -> Result<Vec<ObliterationProof>> {
        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);
        let mut proofs = Vec::new();

        for line in reader.lines() {
            let line = line?;
            let Some((crc_hex, json)) = line.split_once('|') else {
                continue;
            };
            let Ok(expected_crc) = u32::from_str_radix(crc_hex, 16) else {
                continue;
            };
            if crc32fast::hash(json.as_bytes()) != expected_crc {
                continue;
            }
            match serde_json::from_str::<ObliterationProof>(json) {
                Ok(proof) => proofs.push(proof),
                Err(_) => continue,
            }
        }
        Ok(proofs)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Coordinates secure removal from a [`ContentStore`] with proof recording
/// in an [`AuditLog`].
pub struct ObliterationService {
    store: Arc<ContentStore>,
    audit: AuditLog,
    clock: Arc<dyn Clock>,
    min_passes: u32,
}

impl ObliterationService {
    pub fn new(store: Arc<ContentStore>, audit: AuditLog, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            audit,
            clock,
            min_passes: MIN_OVERWRITE_PASSES,
        }
    }

    pub fn with_min_passes(mut self, min_passes: u32) -> Result<Self> {
        if min_passes < MIN_OVERWRITE_PASSES {
            return Err(Error::InvalidState(format!(
                "minimum overwrite passes {min_passes} is below the floor of {MIN_OVERWRITE_PASSES}"
            )));
        }
        self.min_passes = min_passes;
        Ok(self)
    }

    /// Obliterate a single digest: secure-overwrite its bytes, tombstone it
    /// permanently, and append a proof to the audit log. `reason` is a
    /// free-text justification; for subject erasure requests (e.g. under a
    /// right-to-erasure regime), pass the subject identifier as `reason`
    /// and the applicable regulation as `legal_basis`.
    pub fn obliterate(
        &self,
        digest: &Digest,
        reason: impl Into<String>,
        legal_basis: Option<String>,
    ) -> Result<ObliterationProof> {
        if !self.store.exists(digest) {
            return Err(Error::NotFound(format!(
                "content {digest} not in store, nothing to obliterate"
            )));
        }
        let passes = self.store.remove_secure(digest, self.min_passes)?;
        let storage_cleared = !self.store.exists(digest);
        let proof = ObliterationProof::new(
            *digest,
            reason.into(),
            legal_basis,
            passes,
            storage_cleared,
            self.clock.now(),
        );
        self.audit.append(&proof)?;
        info!(digest = %digest, passes, "obliterated digest");
        Ok(proof)
    }

    /// Obliterate a batch of digests best-effort. Hashes already
    /// obliterated or never present are skipped rather than treated as
    /// failures; a failure on one digest (e.g. an `IoFailure` mid-overwrite)
    /// does not roll back obliterations already completed earlier in the
    /// batch, and does not stop the remaining digests from being attempted.
    /// Returns `(successes, all_succeeded)`, where `all_succeeded` is false
    /// only if some *attempted* digest (present and not yet obliterated)
    /// failed.
    pub fn batch_obliterate(
        &self,
        digests: &[Digest],
        reason: impl Into<String>,
        legal_basis: Option<String>,
    ) -> (Vec<ObliterationProof>, bool) {
        let reason = reason.into();
        let mut successes = Vec::new();
        let mut all_succeeded = true;

        for digest in digests {
            if self.store.is_obliterated(digest) || !self.store.exists(digest) {
                continue;
            }
            match self.obliterate(digest, reason.clone(), legal_basis.clone()) {
                Ok(proof) => successes.push(proof),
                Err(_) => all_succeeded = false,
            }
        }

        (successes, all_succeeded)
    }

    /// Process a GDPR Article 17 ("right to erasure") request by delegating
    /// to [`Self::obliterate`], using the subject id as the audit reason.
    pub fn process_erasure_request(&self, request: &ErasureRequest) -> Result<ErasureResponse> {
        let proof = self.obliterate(
            &request.hash,
            request.subject_id.clone(),
            Some(request.legal_basis.clone()),
        )?;
        Ok(ErasureResponse {
            subject_id: request.subject_id.clone(),
            proof,
        })
    }

    /// Whether `request` has been fully satisfied: the content is gone, the
    /// audit log carries a matching record, that record's commitment
    /// verifies, and the erasure it attests to is valid (storage actually
    /// cleared, at or above the minimum overwrite passes). This is the
    /// Article 17 satisfaction predicate, checked independently of whatever
    /// `process_erasure_request` returned, so it can also confirm state
    /// reconstructed from disk.
    pub fn satisfies_erasure(&self, request: &ErasureRequest) -> Result<bool> {
        if self.store.exists(&request.hash) {
            return Ok(false);
        }
        let matching = self
            .audit
            .read_all()?
            .into_iter()
            .find(|r| r.digest == request.hash && r.reason == request.subject_id);
        Ok(matching.is_some_and(|r| r.verify_commitment() && r.is_valid()))
    }

    pub fn audit_log(&self) -> &AuditLog {
        &self.audit
    }
}

/// A subject's request to erase content under a right-to-erasure regime
/// (e.g. GDPR Article 17).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErasureRequest {
    pub subject_id: String,
    pub hash: Digest,
    pub legal_basis: String,
    pub request_time: DateTime<Utc>,
}

/// Response to a satisfied erasure request, carrying the proof the subject
/// (or an auditor) can independently verify.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErasureResponse {
    pub subject_id: String,
    pub proof: ObliterationProof,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use tempfile::TempDir;

    fn service() -> (TempDir, ObliterationService) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(ContentStore::new(dir.path().join("objects")).unwrap());
        let audit = AuditLog::open(dir.path().join("audit.log")).unwrap();
        (
            dir,
            ObliterationService::new(store, audit, Arc::new(SystemClock)),
        )
    }

    #[test]
    fn obliterate_blocks_retrieval_and_records_proof() {
        let (_dir, svc) = service();
        let digest = svc.store.store(b"personal data").unwrap();

        let proof = svc
            .obliterate(&digest, "subject-1234", Some("GDPR Art. 17".into()))
            .unwrap();
        assert!(proof.verify_commitment());
        assert!(proof.is_valid());
        assert!(!svc.store.exists(&digest));

        let logged = svc.audit_log().read_all().unwrap();
        assert_eq!(logged.len(), 1);
        assert_eq!(logged[0].digest, digest);
    }

    #[test]
    fn proof_does_not_contain_erased_content() {
        let (_dir, svc) = service();
        let digest = svc.store.store(b"super secret payload").unwrap();
        let proof = svc.obliterate(&digest, "cleanup", None).unwrap();

        let json = serde_json::to_string(&proof).unwrap();
        assert!(!json.contains("super secret payload"));
    }

    #[test]
    fn tampered_proof_fails_verification() {
        let (_dir, svc) = service();
        let digest = svc.store.store(b"data").unwrap();
        let mut proof = svc.obliterate(&digest, "cleanup", None).unwrap();

        proof.reason = "different reason".into();
        assert!(proof.verify_commitment());

        proof.commitment = hash::null_hash();
        assert!(!proof.verify_commitment());
    }

    #[test]
    fn batch_obliterate_skips_absent_and_already_obliterated() {
        let (_dir, svc) = service();
        let present = svc.store.store(b"one").unwrap();
        let absent = hash::hash(b"never stored");
        let already_gone = svc.store.store(b"two").unwrap();
        svc.obliterate(&already_gone, "earlier cleanup", None)
            .unwrap();

        let (successes, all_succeeded) =
            svc.batch_obliterate(&[present, absent, already_gone], "bulk cleanup", None);

        assert!(all_succeeded);
        assert_eq!(successes.len(), 1);
        assert_eq!(successes[0].digest, present);
        assert!(svc.store.is_obliterated(&present));
        assert!(!svc.store.is_obliterated(&absent));
    }

    #[test]
    fn rejects_min_passes_below_floor() {
        let (_dir, svc) = service();
        assert!(svc.with_min_passes(1).is_err());
    }

    #[test]
    fn erasure_request_satisfies_article_17_predicate() {
        let (_dir, svc) = service();
        let digest = svc.store.store(b"subject's personal data").unwrap();
        let request = ErasureRequest {
            subject_id: "subject-42".into(),
            hash: digest,
            legal_basis: "GDPR Art. 17".into(),
            request_time: SystemClock.now(),
        };

        assert!(!svc.satisfies_erasure(&request).unwrap());

        let response = svc.process_erasure_request(&request).unwrap();
        assert_eq!(response.subject_id, "subject-42");
        assert!(response.proof.verify_commitment());
        assert!(response.proof.is_valid());
        assert!(svc.satisfies_erasure(&request).unwrap());
    }

    #[test]
    fn audit_log_skips_corrupted_trailing_line() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(ContentStore::new(dir.path().join("objects")).unwrap());
        let audit_path = dir.path().join("audit.log");
        let audit = AuditLog::open(&audit_path).unwrap();
        let svc = ObliterationService::new(store.clone(), audit, Arc::new(SystemClock));

        let digest = store.store(b"data").unwrap();
        svc.obliterate(&digest, "cleanup", None).unwrap();

        let mut file = OpenOptions::new().append(true).open(&audit_path).unwrap();
        writeln!(file, "deadbeef|{{not valid json").unwrap();

        let audit = AuditLog::open(&audit_path).unwrap();
        let proofs = audit.read_all().unwrap();
        assert_eq!(proofs.len(), 1);
    }
}
