// src/infra/paths.rs — Path management
//
// All paths respect the RENGLO_HOME environment variable for isolation.
// When RENGLO_HOME is set, config and data live under that directory.
// When unset, config uses ~/.renglo/ and data uses the platform data dir.

use directories::ProjectDirs;
use std::path::PathBuf;
use std::sync::OnceLock;

static PROJECT_DIRS: OnceLock<ProjectDirs> = OnceLock::new();

fn project_dirs() -> &'static ProjectDirs {
    PROJECT_DIRS.get_or_init(|| {
        ProjectDirs::from("", "", "renglo").expect("Could not determine home directory")
    })
}

/// Returns the RENGLO_HOME override, if set.
fn renglo_home() -> Option<PathBuf> {
    std::env::var_os("RENGLO_HOME").map(PathBuf::from)
}

/// Configuration directory: $RENGLO_HOME/ or ~/.renglo/
pub fn config_dir() -> PathBuf {
    if let Some(home) = renglo_home() {
        return home;
    }
    directories::BaseDirs::new()
        .expect("Could not determine home directory")
        .home_dir()
        .join(".renglo")
}

/// Data directory: $RENGLO_HOME/data/ or the platform-local data dir
pub fn data_dir() -> PathBuf {
    if let Some(home) = renglo_home() {
        return home.join("data");
    }
    project_dirs().data_local_dir().to_path_buf()
}

/// Database path
pub fn db_path() -> PathBuf {
    data_dir().join("renglo.db")
}

/// Root of the document blob store
pub fn docs_dir() -> PathBuf {
    data_dir().join("docs")
}

/// Config file path
pub fn config_file_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Ensure all required directories exist
pub async fn ensure_dirs() -> anyhow::Result<()> {
    let dirs = [config_dir(), data_dir(), docs_dir()];

    for dir in &dirs {
        tokio::fs::create_dir_all(dir).await?;
    }

    Ok(())
}
