use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::build::GeneratorConfig;

/// Pipeline configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Directory holding one sub-directory per theme.
    pub themes_dir: PathBuf,
    /// Root of rendered sites: `<sites_dir>/<website_id>/v<number>/`.
    pub sites_dir: PathBuf,
    /// Scratch space for temporary source trees.
    pub work_dir: PathBuf,
    pub generator: GeneratorConfig,
    /// Bind address of the preview server.
    pub preview_addr: SocketAddr,
}

impl PipelineConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var              | Default              |
    /// |----------------------|----------------------|
    /// | `THEMES_DIR`         | `./themes`           |
    /// | `SITES_DIR`          | `./data/sites`       |
    /// | `WORK_DIR`           | system temp dir      |
    /// | `GENERATOR_BIN`      | `hugo`               |
    /// | `GENERATOR_ARGS`     | (none)               |
    /// | `BUILD_TIMEOUT_SECS` | `300`                |
    /// | `PREVIEW_ADDR`       | `127.0.0.1:1313`     |
    pub fn from_env() -> Self {
        let themes_dir = std::env::var("THEMES_DIR").unwrap_or_else(|_| "./themes".into());
        let sites_dir = std::env::var("SITES_DIR").unwrap_or_else(|_| "./data/sites".into());
        let work_dir = std::env::var("WORK_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| std::env::temp_dir());

        let program = std::env::var("GENERATOR_BIN").unwrap_or_else(|_| "hugo".into());
        let extra_args: Vec<String> = std::env::var("GENERATOR_ARGS")
            .unwrap_or_default()
            .split_whitespace()
            .map(str::to_string)
            .collect();

        let build_timeout_secs: u64 = std::env::var("BUILD_TIMEOUT_SECS")
            .unwrap_or_else(|_| "300".into())
            .parse()
            .expect("BUILD_TIMEOUT_SECS must be a valid u64");

        let preview_addr: SocketAddr = std::env::var("PREVIEW_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:1313".into())
            .parse()
            .expect("PREVIEW_ADDR must be a valid socket address");

        Self {
            themes_dir: themes_dir.into(),
            sites_dir: sites_dir.into(),
            work_dir,
            generator: GeneratorConfig {
                program,
                extra_args,
                timeout: Duration::from_secs(build_timeout_secs),
            },
            preview_addr,
        }
    }
}
