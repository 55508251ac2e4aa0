//! Durable storage for scan outcomes.
//!
//! Workers write here and send only the returned path over the progress
//! channel, so a large report never sits in a bounded queue. The first
//! terminal outcome recorded for a job is final: workers write reports with
//! `save_if_absent`, and only the controller replaces an entry.

use std::io::Write;
use std::path::PathBuf;

use tempfile::NamedTempFile;

use super::error::ResultStoreError;
use super::types::{JobId, ScanOutcome};

pub trait ResultStore: Send + Sync {
    /// Persist `outcome` and return where it lives.
    fn save(&self, outcome: &ScanOutcome) -> Result<PathBuf, ResultStoreError>;

    /// Persist `outcome` unless the job already has one stored.
    fn save_if_absent(&self, outcome: &ScanOutcome) -> Result<PathBuf, ResultStoreError>;

    fn load(&self, job_id: JobId) -> Result<ScanOutcome, ResultStoreError>;

    /// Drop a stored outcome. Missing entries are not an error.
    fn remove(&self, job_id: JobId) -> Result<(), ResultStoreError>;
}

/// One JSON file per job under a directory, written via temp file + rename
/// so readers never observe a partial file.
pub struct FsResultStore {
    dir: PathBuf,
}

impl FsResultStore {
    /// Create the directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, ResultStoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn path_for(&self, job_id: JobId) -> PathBuf {
        self.dir.join(format!("{job_id}.json"))
    }

    fn write_temp(&self, outcome: &ScanOutcome) -> Result<NamedTempFile, ResultStoreError> {
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        serde_json::to_writer_pretty(&mut tmp, outcome)?;
        tmp.flush()?;
        tmp.as_file().sync_all()?;
        Ok(tmp)
    }
}

impl ResultStore for FsResultStore {
    fn save(&self, outcome: &ScanOutcome) -> Result<PathBuf, ResultStoreError> {
        let path = self.path_for(outcome.job_id());
        self.write_temp(outcome)?
            .persist(&path)
            .map_err(|e| ResultStoreError::Io(e.error))?;
        tracing::debug!(job_id = %outcome.job_id(), path = %path.display(), "Scan outcome stored");
        Ok(path)
    }

    fn save_if_absent(&self, outcome: &ScanOutcome) -> Result<PathBuf, ResultStoreError> {
        let job_id = outcome.job_id();
        let path = self.path_for(job_id);
        match self.write_temp(outcome)?.persist_noclobber(&path) {
            Ok(_) => {
                tracing::debug!(job_id = %job_id, path = %path.display(), "Scan outcome stored");
                Ok(path)
            }
            Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(ResultStoreError::AlreadyExists(job_id))
            }
            Err(e) => Err(ResultStoreError::Io(e.error)),
        }
    }

    fn load(&self, job_id: JobId) -> Result<ScanOutcome, ResultStoreError> {
        let path = self.path_for(job_id);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ResultStoreError::NotFound(job_id));
            }
            Err(e) => return Err(e.into()),
        };
        let outcome: ScanOutcome = serde_json::from_str(&raw)?;
        if outcome.job_id() != job_id {
            return Err(ResultStoreError::Mismatch {
                expected: job_id,
                found: outcome.job_id(),
            });
        }
        Ok(outcome)
    }

    fn remove(&self, job_id: JobId) -> Result<(), ResultStoreError> {
        match std::fs::remove_file(self.path_for(job_id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::types::{FailureKind, PartialProgress, ScanFailure};
    use chrono::Utc;
    use uuid::Uuid;

    fn failure(job_id: JobId) -> ScanOutcome {
        ScanOutcome::Failure(ScanFailure {
            job_id,
            kind: FailureKind::JobCancelled,
            phase: None,
            message: "cancelled".into(),
            partial: PartialProgress::default(),
            failed_at: Utc::now(),
        })
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsResultStore::new(dir.path().join("results")).unwrap();
        let id = Uuid::new_v4();
        let outcome = failure(id);

        let path = store.save(&outcome).unwrap();
        assert_eq!(path, store.path_for(id));
        assert!(path.exists());
        assert_eq!(store.load(id).unwrap(), outcome);
    }

    #[test]
    fn no_temp_files_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsResultStore::new(dir.path()).unwrap();
        store.save(&failure(Uuid::new_v4())).unwrap();
        store.save(&failure(Uuid::new_v4())).unwrap();
        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 2);
        assert!(names.iter().all(|n| n.ends_with(".json")));
    }

    #[test]
    fn overwrite_replaces_previous_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsResultStore::new(dir.path()).unwrap();
        let id = Uuid::new_v4();
        store.save(&failure(id)).unwrap();
        let second = ScanOutcome::Failure(ScanFailure {
            job_id: id,
            kind: FailureKind::JobTimeout,
            phase: None,
            message: "timed out".into(),
            partial: PartialProgress::default(),
            failed_at: Utc::now(),
        });
        store.save(&second).unwrap();
        assert_eq!(store.load(id).unwrap(), second);
    }

    #[test]
    fn save_if_absent_keeps_the_first_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsResultStore::new(dir.path()).unwrap();
        let id = Uuid::new_v4();
        let first = failure(id);
        store.save_if_absent(&first).unwrap();

        let mut second = first.clone();
        if let ScanOutcome::Failure(f) = &mut second {
            f.message = "later".into();
        }
        assert!(matches!(
            store.save_if_absent(&second),
            Err(ResultStoreError::AlreadyExists(found)) if found == id
        ));
        assert_eq!(store.load(id).unwrap(), first);
        // Only the stored entry remains; the rejected temp file is gone.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn missing_result_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsResultStore::new(dir.path()).unwrap();
        let id = Uuid::new_v4();
        assert!(matches!(store.load(id), Err(ResultStoreError::NotFound(found)) if found == id));
        store.remove(id).unwrap();
    }
}
