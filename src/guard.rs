//! Integrity guard: content hashing, collision detection, backups, and
//! atomic writes for every mutating operation.
//!
//! ## Why gate writes through one object?
//!
//! Unattended agents overwrite files nobody told them about. The guard makes
//! that impossible by accident: a destination that already exists needs the
//! overwrite flag, a destination whose content this session does not
//! recognise additionally needs force or an explicit confirmation, and the
//! old content is copied to a `.backup` sibling before it is replaced. The
//! write itself goes to a temporary sibling and is renamed into place, so a
//! failure at any point leaves the previous bytes untouched.
//!
//! Session memory (path, last committed hash) is the only state shared
//! between concurrent tasks and is lock-protected. It exists only for the
//! lifetime of the guard; the `.backup` sidecar is the durable record.

use crate::error::PdfOpsError;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

// ── Hashing ──────────────────────────────────────────────────────────────

/// SHA-256 of a byte slice, lowercase hex.
pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut out = String::with_capacity(64);
    for byte in digest {
        use fmt::Write;
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// SHA-256 of a file's content, lowercase hex.
pub async fn hash_file(path: &Path) -> Result<String, PdfOpsError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| PdfOpsError::Internal(format!("hashing '{}': {e}", path.display())))?;
    Ok(hash_bytes(&bytes))
}

// ── Confirmation ─────────────────────────────────────────────────────────

/// Pluggable consent capability consulted before replacing a file whose
/// content this session has not seen. The core never blocks on terminal
/// input; interactive frontends implement this, unattended ones keep the
/// refusing default.
pub trait ConfirmationProvider: Send + Sync {
    /// Return true to allow replacing `path`.
    fn confirm_overwrite(&self, path: &Path) -> bool;
}

/// Refuses every overwrite. The default for unattended use.
pub struct DenyOverwrites;

impl ConfirmationProvider for DenyOverwrites {
    fn confirm_overwrite(&self, _path: &Path) -> bool {
        false
    }
}

/// Approves every overwrite, for callers that gathered consent up front.
pub struct AllowOverwrites;

impl ConfirmationProvider for AllowOverwrites {
    fn confirm_overwrite(&self, _path: &Path) -> bool {
        true
    }
}

// ── Records ──────────────────────────────────────────────────────────────

/// Snapshot of a destination before a write.
#[derive(Debug, Clone, Serialize)]
pub struct PreCheck {
    pub exists: bool,
    pub current_hash: Option<String>,
    /// True when the file on disk differs from the hash this session last
    /// recorded for the path. Detects concurrent external modification.
    pub collision: bool,
}

/// Proof of a committed write.
#[derive(Debug, Clone, Serialize)]
pub struct IntegrityRecord {
    pub path: PathBuf,
    /// SHA-256 of the committed content.
    pub hash: String,
    /// The `.backup` sibling holding the replaced content, when one exists.
    pub backup: Option<PathBuf>,
}

/// What [`IntegrityGuard::authorize`] decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteAuthorization {
    /// Destination was absent; plain fresh write.
    Fresh,
    /// Destination existed; its content is preserved at `backup`.
    Replace { backup: PathBuf },
}

// ── Guard ────────────────────────────────────────────────────────────────

/// See the module docs. One guard instance is shared across all tasks of a
/// batch; every mutating operation runs `pre_check` → `authorize` → `commit`
/// against it.
pub struct IntegrityGuard {
    session: Mutex<HashMap<PathBuf, String>>,
    confirmer: Arc<dyn ConfirmationProvider>,
}

impl Default for IntegrityGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for IntegrityGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntegrityGuard")
            .field("session_entries", &self.session_memory().len())
            .finish()
    }
}

impl IntegrityGuard {
    /// Guard with the refusing confirmation default.
    pub fn new() -> Self {
        Self::with_confirmer(Arc::new(DenyOverwrites))
    }

    pub fn with_confirmer(confirmer: Arc<dyn ConfirmationProvider>) -> Self {
        Self {
            session: Mutex::new(HashMap::new()),
            confirmer,
        }
    }

    /// Deterministic backup sibling: `report.pdf` → `report.pdf.backup`.
    pub fn backup_path(target: &Path) -> PathBuf {
        sibling_with_suffix(target, "backup")
    }

    /// Deterministic write staging sibling: `report.pdf` → `report.pdf.tmp`.
    pub(crate) fn temp_path(target: &Path) -> PathBuf {
        sibling_with_suffix(target, "tmp")
    }

    /// The hash this session last committed for `path`, if any.
    pub fn recorded_hash(&self, path: &Path) -> Option<String> {
        self.session_memory().get(path).cloned()
    }

    fn session_memory(&self) -> MutexGuard<'_, HashMap<PathBuf, String>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Inspect the destination without touching it.
    pub async fn pre_check(&self, target: &Path) -> Result<PreCheck, PdfOpsError> {
        let exists = match tokio::fs::metadata(target).await {
            Ok(meta) => meta.is_file() || meta.is_dir(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => {
                return Err(PdfOpsError::Internal(format!(
                    "checking '{}': {e}",
                    target.display()
                )))
            }
        };
        if !exists {
            return Ok(PreCheck {
                exists: false,
                current_hash: None,
                collision: false,
            });
        }

        let current = hash_file(target).await?;
        let expected = self.recorded_hash(target);
        let collision = expected.as_deref().is_some_and(|e| e != current);
        Ok(PreCheck {
            exists: true,
            current_hash: Some(current),
            collision,
        })
    }

    /// Decide whether `target` may be written, making the backup when a
    /// replace is allowed.
    ///
    /// - absent destination → [`WriteAuthorization::Fresh`];
    /// - present, `overwrite` unset → [`PdfOpsError::DestinationExists`];
    /// - present with content this session did not commit, `force` unset →
    ///   the confirmation provider decides; refusal is
    ///   [`PdfOpsError::UnconfirmedOverwrite`];
    /// - the current content is copied to the `.backup` sibling first. A
    ///   backup already holding exactly the current content is reused; any
    ///   other pre-existing backup is [`PdfOpsError::BackupCollision`] and
    ///   nothing is written.
    pub async fn authorize(
        &self,
        target: &Path,
        overwrite: bool,
        force: bool,
    ) -> Result<WriteAuthorization, PdfOpsError> {
        let check = self.pre_check(target).await?;
        if !check.exists {
            return Ok(WriteAuthorization::Fresh);
        }
        if !overwrite {
            return Err(PdfOpsError::DestinationExists {
                path: target.to_path_buf(),
            });
        }

        let current = match check.current_hash {
            Some(hash) => hash,
            None => {
                return Err(PdfOpsError::Internal(format!(
                    "no content hash for existing '{}'",
                    target.display()
                )))
            }
        };

        // Content this session committed itself is trusted; anything else
        // (unknown file, or changed since the last commit) needs force or an
        // explicit confirmation.
        let trusted = self.recorded_hash(target).as_deref() == Some(current.as_str());
        if !trusted && !force && !self.confirmer.confirm_overwrite(target) {
            return Err(PdfOpsError::UnconfirmedOverwrite {
                path: target.to_path_buf(),
            });
        }

        let backup = Self::backup_path(target);
        match tokio::fs::metadata(&backup).await {
            Ok(_) => {
                let backup_hash = hash_file(&backup).await?;
                if backup_hash != current {
                    return Err(PdfOpsError::BackupCollision {
                        path: target.to_path_buf(),
                        backup,
                    });
                }
                debug!(backup = %backup.display(), "existing backup already matches target");
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tokio::fs::copy(target, &backup)
                    .await
                    .map_err(|e| PdfOpsError::WriteFailure {
                        path: backup.clone(),
                        source: e,
                    })?;
                info!(
                    target = %target.display(),
                    backup = %backup.display(),
                    "previous content backed up"
                );
            }
            Err(e) => {
                return Err(PdfOpsError::Internal(format!(
                    "checking backup '{}': {e}",
                    backup.display()
                )))
            }
        }

        Ok(WriteAuthorization::Replace { backup })
    }

    /// Atomically place `bytes` at `target`: write to the `.tmp` sibling,
    /// rename over the destination, record the new hash in session memory.
    /// On any failure the previous content of `target` is untouched.
    pub async fn commit(&self, target: &Path, bytes: &[u8]) -> Result<IntegrityRecord, PdfOpsError> {
        let tmp = Self::temp_path(target);
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| PdfOpsError::WriteFailure {
                path: target.to_path_buf(),
                source: e,
            })?;
        if let Err(e) = tokio::fs::rename(&tmp, target).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(PdfOpsError::WriteFailure {
                path: target.to_path_buf(),
                source: e,
            });
        }

        let hash = hash_bytes(bytes);
        self.session_memory()
            .insert(target.to_path_buf(), hash.clone());

        let backup = Self::backup_path(target);
        let backup = match tokio::fs::try_exists(&backup).await {
            Ok(true) => Some(backup),
            _ => None,
        };

        info!(
            path = %target.display(),
            size = bytes.len(),
            hash = %&hash[..12],
            "committed"
        );
        Ok(IntegrityRecord {
            path: target.to_path_buf(),
            hash,
            backup,
        })
    }

    /// The full gate in one call: authorize, then commit.
    pub async fn guarded_write(
        &self,
        target: &Path,
        bytes: &[u8],
        overwrite: bool,
        force: bool,
    ) -> Result<IntegrityRecord, PdfOpsError> {
        self.authorize(target, overwrite, force).await?;
        self.commit(target, bytes).await
    }
}

fn sibling_with_suffix(target: &Path, suffix: &str) -> PathBuf {
    let mut name = target
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".");
    name.push(suffix);
    target.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target_in(dir: &tempfile::TempDir) -> PathBuf {
        dir.path().join("out.pdf")
    }

    #[test]
    fn sibling_names_are_deterministic() {
        let target = Path::new("/work/report.pdf");
        assert_eq!(
            IntegrityGuard::backup_path(target),
            Path::new("/work/report.pdf.backup")
        );
        assert_eq!(
            IntegrityGuard::temp_path(target),
            Path::new("/work/report.pdf.tmp")
        );
    }

    #[test]
    fn hashes_are_lowercase_hex_sha256() {
        let hash = hash_bytes(b"abc");
        assert_eq!(
            hash,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[tokio::test]
    async fn fresh_write_commits_and_records() {
        let dir = tempfile::tempdir().unwrap();
        let target = target_in(&dir);
        let guard = IntegrityGuard::new();

        assert_eq!(
            guard.authorize(&target, false, false).await.unwrap(),
            WriteAuthorization::Fresh
        );
        let record = guard.commit(&target, b"version one").await.unwrap();
        assert_eq!(record.hash, hash_bytes(b"version one"));
        assert_eq!(record.backup, None);
        assert_eq!(guard.recorded_hash(&target), Some(record.hash.clone()));
        assert_eq!(tokio::fs::read(&target).await.unwrap(), b"version one");
    }

    #[tokio::test]
    async fn existing_destination_requires_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let target = target_in(&dir);
        tokio::fs::write(&target, b"already here").await.unwrap();

        let err = IntegrityGuard::new()
            .authorize(&target, false, false)
            .await
            .unwrap_err();
        assert!(matches!(err, PdfOpsError::DestinationExists { .. }));
    }

    #[tokio::test]
    async fn unknown_content_needs_confirmation_or_force() {
        let dir = tempfile::tempdir().unwrap();
        let target = target_in(&dir);
        tokio::fs::write(&target, b"someone else wrote this").await.unwrap();

        // Default provider refuses.
        let guard = IntegrityGuard::new();
        let err = guard.authorize(&target, true, false).await.unwrap_err();
        assert!(matches!(err, PdfOpsError::UnconfirmedOverwrite { .. }));

        // Force bypasses the provider and takes a backup first.
        let auth = guard.authorize(&target, true, true).await.unwrap();
        let backup = IntegrityGuard::backup_path(&target);
        assert_eq!(auth, WriteAuthorization::Replace { backup: backup.clone() });
        assert_eq!(
            tokio::fs::read(&backup).await.unwrap(),
            b"someone else wrote this"
        );
    }

    #[tokio::test]
    async fn confirmation_provider_can_approve() {
        let dir = tempfile::tempdir().unwrap();
        let target = target_in(&dir);
        tokio::fs::write(&target, b"preexisting").await.unwrap();

        let guard = IntegrityGuard::with_confirmer(Arc::new(AllowOverwrites));
        let auth = guard.authorize(&target, true, false).await.unwrap();
        assert!(matches!(auth, WriteAuthorization::Replace { .. }));
    }

    #[tokio::test]
    async fn session_committed_content_is_trusted() {
        let dir = tempfile::tempdir().unwrap();
        let target = target_in(&dir);
        let guard = IntegrityGuard::new();
        guard.commit(&target, b"first version").await.unwrap();

        // Same content as the session wrote: no confirmation needed even
        // with the refusing provider.
        let auth = guard.authorize(&target, true, false).await.unwrap();
        assert!(matches!(auth, WriteAuthorization::Replace { .. }));
    }

    #[tokio::test]
    async fn external_modification_is_a_collision() {
        let dir = tempfile::tempdir().unwrap();
        let target = target_in(&dir);
        let guard = IntegrityGuard::new();
        guard.commit(&target, b"first version").await.unwrap();

        tokio::fs::write(&target, b"tampered externally").await.unwrap();
        let check = guard.pre_check(&target).await.unwrap();
        assert!(check.exists);
        assert!(check.collision);

        let err = guard.authorize(&target, true, false).await.unwrap_err();
        assert!(matches!(err, PdfOpsError::UnconfirmedOverwrite { .. }));
    }

    #[tokio::test]
    async fn divergent_backup_blocks_the_write() {
        let dir = tempfile::tempdir().unwrap();
        let target = target_in(&dir);
        tokio::fs::write(&target, b"current").await.unwrap();
        let backup = IntegrityGuard::backup_path(&target);
        tokio::fs::write(&backup, b"precious older backup").await.unwrap();

        let err = IntegrityGuard::new()
            .authorize(&target, true, true)
            .await
            .unwrap_err();
        assert!(matches!(err, PdfOpsError::BackupCollision { .. }));
        // Neither file was touched.
        assert_eq!(tokio::fs::read(&target).await.unwrap(), b"current");
        assert_eq!(
            tokio::fs::read(&backup).await.unwrap(),
            b"precious older backup"
        );
    }

    #[tokio::test]
    async fn matching_backup_is_reused() {
        let dir = tempfile::tempdir().unwrap();
        let target = target_in(&dir);
        tokio::fs::write(&target, b"same bytes").await.unwrap();
        let backup = IntegrityGuard::backup_path(&target);
        tokio::fs::write(&backup, b"same bytes").await.unwrap();

        let auth = IntegrityGuard::new()
            .authorize(&target, true, true)
            .await
            .unwrap();
        assert_eq!(auth, WriteAuthorization::Replace { backup });
    }

    #[tokio::test]
    async fn failed_commit_leaves_target_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let target = target_in(&dir);
        let guard = IntegrityGuard::new();
        guard.commit(&target, b"original bytes").await.unwrap();

        // A directory squatting on the staging path makes the write fail.
        tokio::fs::create_dir(IntegrityGuard::temp_path(&target))
            .await
            .unwrap();
        let err = guard.commit(&target, b"replacement").await.unwrap_err();
        assert!(matches!(err, PdfOpsError::WriteFailure { .. }));
        assert_eq!(tokio::fs::read(&target).await.unwrap(), b"original bytes");
        assert_eq!(
            guard.recorded_hash(&target),
            Some(hash_bytes(b"original bytes"))
        );
    }

    #[tokio::test]
    async fn guarded_write_replaces_with_backup() {
        let dir = tempfile::tempdir().unwrap();
        let target = target_in(&dir);
        let guard = IntegrityGuard::new();
        guard.guarded_write(&target, b"v1", false, false).await.unwrap();
        let record = guard.guarded_write(&target, b"v2", true, false).await.unwrap();

        assert_eq!(tokio::fs::read(&target).await.unwrap(), b"v2");
        let backup = record.backup.expect("replace keeps a backup");
        assert_eq!(tokio::fs::read(&backup).await.unwrap(), b"v1");
    }
}
