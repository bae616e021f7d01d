use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use log::{debug, warn};

/// Registry of the secret material staged into the includes tree. Every
/// file written during a run is tracked here and removed when the flow
/// ends, success or not.
#[derive(Clone, Default)]
pub struct Staging {
    files: Arc<Mutex<Vec<PathBuf>>>,
}

impl Staging {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&self, path: impl Into<PathBuf>) {
        self.files
            .lock()
            .expect("staging registry poisoned")
            .push(path.into());
    }

    /// Copy `src` into `dir` under `file_name` and track the copy.
    pub fn copy_into(&self, src: &Path, dir: &Path, file_name: &str) -> Result<PathBuf> {
        let dest = dir.join(file_name);
        fs::copy(src, &dest).with_context(|| {
            format!("couldn't copy {} to {}", src.display(), dest.display())
        })?;
        self.track(&dest);
        Ok(dest)
    }

    /// Best-effort removal of everything tracked so far.
    pub fn remove_all(&self) {
        let mut files = self.files.lock().expect("staging registry poisoned");
        for path in files.drain(..) {
            match fs::remove_file(&path) {
                Ok(()) => debug!("removed {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("couldn't remove {}: {}", path.display(), e),
            }
        }
    }

    /// Remove the staged files when the run is interrupted or terminated.
    pub fn arm_interrupt_cleanup(&self) {
        let staging = self.clone();
        tokio::spawn(async move {
            wait_for_shutdown().await;
            staging.remove_all();
            std::process::exit(1);
        });
    }

    pub fn guard(&self) -> CleanupGuard {
        CleanupGuard(self.clone())
    }
}

async fn wait_for_shutdown() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut term =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to listen for SIGTERM");
        tokio::select! {
            _ = ctrl_c => {}
            _ = term.recv() => {}
        }
    }
    #[cfg(not(unix))]
    ctrl_c.await.expect("failed to listen for Ctrl+C");
}

/// Removes all staged files when dropped; hold one for the whole flow.
pub struct CleanupGuard(Staging);

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        self.0.remove_all();
    }
}
