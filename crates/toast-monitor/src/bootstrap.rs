use std::path::{Path, PathBuf};

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

/// Environment files read at startup. Collected before tracing is up so the caller can
/// log them afterwards.
#[derive(Debug, Default)]
pub struct DotenvLoad {
    pub loaded: Vec<PathBuf>,
    pub errors: Vec<String>,
}

/// Loads `.env` next to the running executable, then from the working directory.
/// Variables that are already set are never overridden.
pub fn load_dotenv() -> DotenvLoad {
    let mut load = DotenvLoad::default();
    if let Some(path) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(".env")))
    {
        load_dotenv_file(&path, &mut load);
    }
    if let Ok(cwd) = std::env::current_dir() {
        let path = cwd.join(".env");
        if !load.loaded.contains(&path) {
            load_dotenv_file(&path, &mut load);
        }
    }
    load
}

fn load_dotenv_file(path: &Path, load: &mut DotenvLoad) {
    match dotenvy::from_path(path) {
        Ok(()) => load.loaded.push(path.to_path_buf()),
        Err(error) if error.not_found() => {}
        Err(error) => load.errors.push(format!("{}: {error}", path.display())),
    }
}
