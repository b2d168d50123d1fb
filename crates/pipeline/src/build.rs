//! Build invoker: runs the external static-site generator.
//!
//! The generator is a black box: a source directory goes in, a directory
//! with at least an `index.html` comes out. Both temp trees are cleaned up
//! on failure; the source tree is also removed on success.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use schoolsite_core::error::CoreError;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

use crate::error::PipelineResult;

/// Maximum stdout or stderr size captured per stream (1 MiB).
const MAX_OUTPUT_BYTES: usize = 1024 * 1024;

/// How long to keep draining output pipes once the generator is gone.
/// Grandchildren that inherited the pipes can keep them open indefinitely.
const OUTPUT_DRAIN_GRACE: Duration = Duration::from_secs(2);

/// File a successful build must produce at the output root.
pub const INDEX_FILE: &str = "index.html";

/// Default wall-clock limit for one generator run.
pub const DEFAULT_BUILD_TIMEOUT: Duration = Duration::from_secs(300);

/// How to invoke the generator.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Binary name or path (default `hugo`).
    pub program: String,
    /// Appended after `--source <src> --destination <out>`.
    pub extra_args: Vec<String>,
    pub timeout: Duration,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            program: "hugo".to_string(),
            extra_args: Vec::new(),
            timeout: DEFAULT_BUILD_TIMEOUT,
        }
    }
}

/// A finished build.
#[derive(Debug, Clone)]
pub struct BuildOutput {
    pub output_dir: PathBuf,
    /// Captured generator stdout/stderr.
    pub log: String,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Default)]
pub struct BuildInvoker {
    config: GeneratorConfig,
}

impl BuildInvoker {
    pub fn new(config: GeneratorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Render `source_dir` into `output_dir`.
    ///
    /// Returns `CoreError::Build` (with the captured output) when the
    /// generator cannot be started, exits non-zero, exceeds the timeout or
    /// produces no `index.html`. The source tree is removed in every case;
    /// the output directory only on failure.
    pub async fn build(&self, source_dir: &Path, output_dir: &Path) -> PipelineResult<BuildOutput> {
        tracing::info!(
            program = %self.config.program,
            source = %source_dir.display(),
            output = %output_dir.display(),
            "Starting site build",
        );

        let result = self.run(source_dir, output_dir).await;
        remove_dir_logged(source_dir).await;

        match result {
            Ok(output) => {
                tracing::info!(
                    output = %output.output_dir.display(),
                    duration_ms = output.duration_ms,
                    "Site build finished",
                );
                Ok(output)
            }
            Err(e) => {
                remove_dir_logged(output_dir).await;
                tracing::warn!(error = %e, "Site build failed");
                Err(e.into())
            }
        }
    }

    async fn run(&self, source_dir: &Path, output_dir: &Path) -> Result<BuildOutput, CoreError> {
        let mut cmd = Command::new(&self.config.program);
        cmd.arg("--source")
            .arg(source_dir)
            .arg("--destination")
            .arg(output_dir)
            .args(&self.config.extra_args)
            .current_dir(source_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let start = Instant::now();
        let mut child = cmd.spawn().map_err(|e| CoreError::Build {
            message: format!("Failed to start generator '{}': {e}", self.config.program),
            output: String::new(),
        })?;

        let capture = OutputCapture::start(&mut child);

        let waited = tokio::time::timeout(self.config.timeout, child.wait()).await;
        let status = match waited {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                kill_generator(&mut child).await;
                return Err(CoreError::Build {
                    message: format!("Failed to wait for generator: {e}"),
                    output: capture.finish().await,
                });
            }
            Err(_elapsed) => {
                kill_generator(&mut child).await;
                return Err(CoreError::Build {
                    message: format!(
                        "Generator timed out after {}s",
                        self.config.timeout.as_secs_f64()
                    ),
                    output: capture.finish().await,
                });
            }
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        let log = capture.finish().await;

        if !status.success() {
            let code = status
                .code()
                .map_or_else(|| "signal".to_string(), |c| c.to_string());
            return Err(CoreError::Build {
                message: format!("Generator exited with status {code}"),
                output: log,
            });
        }

        if !tokio::fs::try_exists(output_dir.join(INDEX_FILE))
            .await
            .unwrap_or(false)
        {
            return Err(CoreError::Build {
                message: format!("Generator produced no {INDEX_FILE}"),
                output: log,
            });
        }

        Ok(BuildOutput {
            output_dir: output_dir.to_path_buf(),
            log,
            duration_ms,
        })
    }
}

async fn kill_generator(child: &mut Child) {
    if let Err(e) = child.kill().await {
        tracing::warn!(error = %e, "Failed to kill generator");
    }
}

type Captured = Arc<Mutex<Vec<u8>>>;

/// Stdout and stderr of a running generator, read in background tasks so
/// `child.wait()` can borrow the child.
struct OutputCapture {
    stdout: Captured,
    stderr: Captured,
    readers: Vec<JoinHandle<()>>,
}

impl OutputCapture {
    fn start(child: &mut Child) -> Self {
        let stdout = Captured::default();
        let stderr = Captured::default();
        let readers = vec![
            tokio::spawn(read_stream(child.stdout.take(), Arc::clone(&stdout))),
            tokio::spawn(read_stream(child.stderr.take(), Arc::clone(&stderr))),
        ];
        Self {
            stdout,
            stderr,
            readers,
        }
    }

    /// Wait for the pipes to close (bounded by [`OUTPUT_DRAIN_GRACE`]) and
    /// return whatever was captured.
    async fn finish(self) -> String {
        let aborts: Vec<_> = self.readers.iter().map(JoinHandle::abort_handle).collect();
        let readers = self.readers;
        let drained = tokio::time::timeout(OUTPUT_DRAIN_GRACE, async move {
            for reader in readers {
                let _ = reader.await;
            }
        })
        .await;
        if drained.is_err() {
            for abort in aborts {
                abort.abort();
            }
        }

        let stdout = self.stdout.lock().unwrap_or_else(PoisonError::into_inner);
        let stderr = self.stderr.lock().unwrap_or_else(PoisonError::into_inner);
        combine_output(&stdout, &stderr)
    }
}

/// Copy a stream into `sink`, keeping at most [`MAX_OUTPUT_BYTES`]. The rest
/// is read and discarded so the generator never blocks on a full pipe.
async fn read_stream<R: AsyncRead + Unpin>(handle: Option<R>, sink: Captured) {
    let Some(mut handle) = handle else {
        return;
    };
    let mut chunk = [0u8; 8192];
    loop {
        match handle.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                let mut buf = sink.lock().unwrap_or_else(PoisonError::into_inner);
                let room = MAX_OUTPUT_BYTES.saturating_sub(buf.len());
                buf.extend_from_slice(&chunk[..n.min(room)]);
            }
        }
    }
}

fn combine_output(stdout: &[u8], stderr: &[u8]) -> String {
    let stdout = String::from_utf8_lossy(stdout);
    let stderr = String::from_utf8_lossy(stderr);
    match (stdout.trim().is_empty(), stderr.trim().is_empty()) {
        (true, true) => String::new(),
        (false, true) => stdout.into_owned(),
        (true, false) => stderr.into_owned(),
        (false, false) => format!("{stdout}\n{stderr}"),
    }
}

/// Remove a directory tree, logging anything other than "already gone".
pub(crate) async fn remove_dir_logged(path: &Path) {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove directory");
        }
    }
}
