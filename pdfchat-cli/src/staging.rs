//! Upload staging: copies of the user's files live in a timestamped batch
//! directory for the duration of one ingestion.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::{debug, warn};

/// A batch directory holding copies of uploaded files.
///
/// The directory and its contents are removed when the value is dropped.
#[derive(Debug)]
pub struct StagedUploads {
    dir: PathBuf,
}

impl StagedUploads {
    /// Copy `files` into a new `<root>/<YYYYmmdd_HHMMSS>` directory.
    pub fn stage(root: &Path, files: &[PathBuf]) -> Result<Self> {
        if files.is_empty() {
            bail!("no files to upload");
        }

        let mut names = HashSet::new();
        for file in files {
            if !file.is_file() {
                bail!("{} is not a readable file", file.display());
            }
            let name = file.file_name().context("upload path has no file name")?;
            if !names.insert(name.to_os_string()) {
                bail!("two uploads are named {}", name.to_string_lossy());
            }
        }

        let dir = batch_dir(root)?;
        let staged = Self { dir };
        for file in files {
            // Checked above.
            let Some(name) = file.file_name() else { continue };
            let target = staged.dir.join(name);
            fs::copy(file, &target).with_context(|| {
                format!("failed to copy {} to {}", file.display(), target.display())
            })?;
        }
        debug!(directory = %staged.dir.display(), file_count = files.len(), "staged uploads");
        Ok(staged)
    }

    /// The batch directory.
    pub fn path(&self) -> &Path {
        &self.dir
    }
}

impl Drop for StagedUploads {
    fn drop(&mut self) {
        match fs::remove_dir_all(&self.dir) {
            Ok(()) => debug!(directory = %self.dir.display(), "removed staged uploads"),
            Err(e) => warn!(
                directory = %self.dir.display(),
                error = %e,
                "failed to remove staged uploads"
            ),
        }
    }
}

/// Create a fresh batch directory named after the current local time,
/// adding a numeric suffix when a batch from the same second exists.
fn batch_dir(root: &Path) -> Result<PathBuf> {
    fs::create_dir_all(root)
        .with_context(|| format!("failed to create uploads directory {}", root.display()))?;
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();

    for attempt in 0u32.. {
        let name = if attempt == 0 { stamp.clone() } else { format!("{stamp}_{attempt}") };
        let dir = root.join(name);
        match fs::create_dir(&dir) {
            Ok(()) => return Ok(dir),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(e) => {
                return Err(e).with_context(|| format!("failed to create {}", dir.display()));
            }
        }
    }
    bail!("could not create a batch directory under {}", root.display())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_copies_and_removes_them_on_drop() {
        let temp = tempfile::tempdir().unwrap();
        let source = temp.path().join("report.pdf");
        fs::write(&source, b"%PDF-1.5").unwrap();
        let root = temp.path().join("uploads");

        let staged = StagedUploads::stage(&root, &[source.clone()]).unwrap();
        let dir = staged.path().to_path_buf();
        assert!(dir.starts_with(&root));
        assert!(dir.join("report.pdf").is_file());

        drop(staged);
        assert!(!dir.exists());
        assert!(source.is_file());
    }

    #[test]
    fn batches_in_the_same_second_get_distinct_directories() {
        let temp = tempfile::tempdir().unwrap();
        let first = batch_dir(temp.path()).unwrap();
        let second = batch_dir(temp.path()).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn rejects_missing_and_duplicate_files() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path().join("uploads");
        assert!(StagedUploads::stage(&root, &[temp.path().join("absent.pdf")]).is_err());

        fs::create_dir_all(temp.path().join("a")).unwrap();
        fs::create_dir_all(temp.path().join("b")).unwrap();
        fs::write(temp.path().join("a/x.pdf"), b"").unwrap();
        fs::write(temp.path().join("b/x.pdf"), b"").unwrap();
        let duplicates = [temp.path().join("a/x.pdf"), temp.path().join("b/x.pdf")];
        let result = StagedUploads::stage(&root, &duplicates);
        assert!(result.is_err());
    }
}
