//! JPEG frame source for telemetry upload.
//!
//! Camera integration is an external collaborator; this client cycles
//! through a directory of pre-captured frames at the upload cadence.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use interviewer_core::observation::FrameSource;

pub struct DirFrameSource {
    files: Vec<PathBuf>,
    cursor: AtomicUsize,
}

impl DirFrameSource {
    pub fn new(dir: &Path) -> io::Result<Self> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                matches!(
                    path.extension().and_then(|ext| ext.to_str()),
                    Some("jpg") | Some("jpeg")
                )
            })
            .collect();
        files.sort();
        if files.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no jpeg frames in {}", dir.display()),
            ));
        }
        Ok(Self {
            files,
            cursor: AtomicUsize::new(0),
        })
    }
}

impl FrameSource for DirFrameSource {
    fn next_frame(&self) -> Option<Vec<u8>> {
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % self.files.len();
        match std::fs::read(&self.files[index]) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                tracing::debug!("failed to read frame {}: {}", self.files[index].display(), e);
                None
            }
        }
    }
}
