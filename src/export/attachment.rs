//! Save attachments to disk.
//!
//! Files are written under their original name. Two attachments with the
//! same name overwrite each other and the one written last is kept; nothing
//! is renamed or deduplicated.

use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{GrabError, Result};
use crate::model::attachment::{AttachmentDescriptor, SavedAttachment, SkippedAttachment};
use crate::parser::encoding::decode_transfer;
use crate::store::MailApi;

/// Outcome of saving a batch of attachments.
#[derive(Debug, Default, serde::Serialize)]
pub struct PersistReport {
    pub saved: Vec<SavedAttachment>,
    pub skipped: Vec<SkippedAttachment>,
}

impl PersistReport {
    pub fn extend(&mut self, other: PersistReport) {
        self.saved.extend(other.saved);
        self.skipped.extend(other.skipped);
    }
}

/// Fetches attachment payloads and writes them into one directory.
pub struct AttachmentPersister<'a, A: MailApi> {
    api: &'a A,
    target_dir: PathBuf,
}

impl<'a, A: MailApi> AttachmentPersister<'a, A> {
    pub fn new(api: &'a A, target_dir: impl Into<PathBuf>) -> Self {
        Self {
            api,
            target_dir: target_dir.into(),
        }
    }

    pub fn target_dir(&self) -> &Path {
        &self.target_dir
    }

    /// Create the target directory if needed. Safe to call repeatedly.
    pub fn ensure_target_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.target_dir).map_err(|e| GrabError::io(&self.target_dir, e))
    }

    /// Fetch, decode and write a single attachment.
    pub fn persist(&self, descriptor: &AttachmentDescriptor) -> Result<SavedAttachment> {
        let name = safe_file_name(&descriptor.filename)
            .ok_or_else(|| GrabError::InvalidFilename(descriptor.filename.clone()))?;

        let encoded = self
            .api
            .fetch_attachment(&descriptor.message_id, &descriptor.attachment_id)?;
        let data = decode_transfer(&encoded).map_err(|e| match e {
            GrabError::Decode { reason, .. } => {
                GrabError::decode(format!("attachment '{}'", descriptor.filename), reason)
            }
            other => other,
        })?;

        self.ensure_target_dir()?;
        let path = self.target_dir.join(name);
        write_atomic(&self.target_dir, &path, &data)?;
        debug!(path = %path.display(), bytes = data.len(), "Attachment written");

        Ok(SavedAttachment {
            message_id: descriptor.message_id.clone(),
            filename: descriptor.filename.clone(),
            path,
            bytes: data.len() as u64,
        })
    }

    /// Save every descriptor in order, recording failures instead of stopping.
    ///
    /// Only an authentication failure aborts the batch, since every later
    /// call would fail the same way.
    pub fn persist_all(
        &self,
        descriptors: &[AttachmentDescriptor],
        progress: &dyn Fn(usize, usize),
    ) -> Result<PersistReport> {
        let mut report = PersistReport::default();
        let total = descriptors.len();

        for (i, descriptor) in descriptors.iter().enumerate() {
            progress(i, total);
            match self.persist(descriptor) {
                Ok(saved) => {
                    info!(
                        message_id = %saved.message_id,
                        filename = %saved.filename,
                        bytes = saved.bytes,
                        "Saved attachment"
                    );
                    report.saved.push(saved);
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(
                        message_id = %descriptor.message_id,
                        filename = %descriptor.filename,
                        error = %e,
                        "Failed to save attachment"
                    );
                    report.skipped.push(SkippedAttachment {
                        message_id: descriptor.message_id.clone(),
                        filename: descriptor.filename.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        progress(total, total);

        Ok(report)
    }
}

/// Last path component of `filename`, so a name cannot leave the target directory.
fn safe_file_name(filename: &str) -> Option<&str> {
    let normalized = filename.rsplit(['/', '\\']).next()?;
    match normalized {
        "" | "." | ".." => None,
        name => Some(name),
    }
}

/// Write `data` to a temporary file in `dir`, then rename it over `path`.
fn write_atomic(dir: &Path, path: &Path, data: &[u8]) -> Result<()> {
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| GrabError::io(dir, e))?;
    tmp.write_all(data).map_err(|e| GrabError::io(tmp.path(), e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| GrabError::io(tmp.path(), e))?;
    tmp.persist(path).map_err(|e| GrabError::io(path, e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_file_name() {
        assert_eq!(safe_file_name("report.pdf"), Some("report.pdf"));
        assert_eq!(safe_file_name("../../etc/passwd"), Some("passwd"));
        assert_eq!(safe_file_name("C:\\temp\\log.txt"), Some("log.txt"));
        assert_eq!(safe_file_name(".."), None);
        assert_eq!(safe_file_name("dir/"), None);
        assert_eq!(safe_file_name(""), None);
    }

    #[test]
    fn test_write_atomic_replaces_existing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("a.txt");
        write_atomic(tmp.path(), &path, b"first").unwrap();
        write_atomic(tmp.path(), &path, b"second").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"second");
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 1);
    }
}
