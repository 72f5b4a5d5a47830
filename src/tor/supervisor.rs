//! Tor daemon supervision
//!
//! Extracts the bundled daemon next to the binary, runs it as a child
//! process and removes the extracted files when the run ends. There is no
//! readiness channel back from the daemon: callers wait a fixed warm-up or
//! poll for the hostname file.

use crate::config::DaemonConfig;
use crate::error::{Error, Result};
use crate::tor::bundle::{Artifact, ArtifactBundle};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

const EXECUTABLE_MODE: u32 = 0o755;
const CONFIG_MODE: u32 = 0o644;

/// Owns the daemon artifacts and the child process spawned from them
pub struct DaemonSupervisor {
    bundle: ArtifactBundle,
    workdir: PathBuf,
    executable_path: PathBuf,
    config_path: PathBuf,
}

impl DaemonSupervisor {
    /// Create a supervisor extracting into `workdir`
    pub fn new(
        bundle: ArtifactBundle,
        workdir: impl Into<PathBuf>,
        executable_name: &str,
        config_name: &str,
    ) -> Self {
        let workdir = workdir.into();
        Self {
            executable_path: workdir.join(executable_name),
            config_path: workdir.join(config_name),
            bundle,
            workdir,
        }
    }

    pub fn from_config(bundle: ArtifactBundle, config: &DaemonConfig, workdir: &Path) -> Self {
        Self::new(
            bundle,
            workdir,
            &config.executable_name,
            &config.config_name,
        )
    }

    pub fn executable_path(&self) -> &Path {
        &self.executable_path
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Write the executable and its config into the working directory
    pub fn extract(&self) -> Result<()> {
        write_artifact(&self.bundle.executable, &self.executable_path, EXECUTABLE_MODE)?;
        write_artifact(&self.bundle.config, &self.config_path, CONFIG_MODE)?;
        debug!(
            "Extracted {} and {}",
            self.executable_path.display(),
            self.config_path.display()
        );
        Ok(())
    }

    /// Create the hidden service directory the daemon publishes into
    ///
    /// Tor refuses group/world readable service directories, hence 0700.
    pub fn ensure_hidden_service_dir(&self, dir: &str) -> Result<PathBuf> {
        let path = self.workdir.join(dir);
        std::fs::create_dir_all(&path).map_err(|source| Error::Extraction {
            artifact: path.display().to_string(),
            source,
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o700)).map_err(
                |source| Error::Extraction {
                    artifact: path.display().to_string(),
                    source,
                },
            )?;
        }

        Ok(path)
    }

    /// Spawn the daemon with its config
    ///
    /// A launch failure usually means an earlier instance still holds the
    /// SOCKS port, which is good enough for us, so it is only logged.
    pub fn start(&self) -> Option<Child> {
        match self.spawn() {
            Ok(child) => {
                info!(
                    "Started {} (pid {})",
                    self.executable_path.display(),
                    child.id().unwrap_or_default()
                );
                Some(child)
            },
            Err(e) => {
                warn!("{}", e);
                None
            },
        }
    }

    fn spawn(&self) -> Result<Child> {
        let program = absolute(&self.executable_path);
        let config = absolute(&self.config_path);

        Command::new(&program)
            .arg("-f")
            .arg(&config)
            .current_dir(&self.workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(Error::DaemonLaunch)
    }

    /// Block until the child exits. Any exit is logged, none is fatal.
    pub async fn wait(mut child: Child) {
        match child.wait().await {
            Ok(status) if status.success() => info!("Tor daemon exited"),
            Ok(status) => warn!("Tor daemon exited with {}", status),
            Err(e) => error!("Failed to wait for Tor daemon: {}", e),
        }
    }

    /// Remove the extracted artifacts. Missing files are not an error.
    pub fn cleanup(&self) {
        for path in [&self.executable_path, &self.config_path] {
            match std::fs::remove_file(path) {
                Ok(()) => debug!("Removed {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {},
                Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
            }
        }
    }

    /// Extract, start and supervise the daemon in the background
    ///
    /// Extraction errors are logged and the launch is still attempted. The
    /// returned guard must be held for the whole run: dropping it stops the
    /// daemon and removes the artifacts.
    pub fn launch(self) -> DaemonGuard {
        if let Err(e) = self.extract() {
            error!("{}", e);
        }

        let task = self.start().map(|child| tokio::spawn(Self::wait(child)));

        DaemonGuard {
            supervisor: self,
            task,
        }
    }
}

/// Scoped ownership of a launched daemon
pub struct DaemonGuard {
    supervisor: DaemonSupervisor,
    task: Option<JoinHandle<()>>,
}

impl DaemonGuard {
    /// Whether the supervised child is still running
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    pub fn supervisor(&self) -> &DaemonSupervisor {
        &self.supervisor
    }
}

impl Drop for DaemonGuard {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            // Dropping the child inside the task kills the daemon
            task.abort();
        }
        self.supervisor.cleanup();
    }
}

/// Write one artifact; `mode` only applies on Unix
fn write_artifact(artifact: &Artifact, path: &Path, mode: u32) -> Result<()> {
    let extraction_error = |source| Error::Extraction {
        artifact: path.display().to_string(),
        source,
    };

    let bytes = artifact.read().map_err(extraction_error)?;
    std::fs::write(path, &bytes).map_err(extraction_error)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
            .map_err(extraction_error)?;
    }
    #[cfg(not(unix))]
    let _ = mode;

    Ok(())
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
