//! Finds the mod's folder and the files inside it.

use cached::proc_macro::cached;
use std::path::{Path, PathBuf};

/// Overrides the mod folder when set.
pub const DIR_VAR: &str = "CSV_NAME_BANK_DIR";

#[cached]
pub fn find_mod_dir_path() -> PathBuf {
    if let Some(dir) = std::env::var_os(DIR_VAR) {
        return PathBuf::from(dir);
    }

    // The mod lives in `Mods/CSVNameBank` beside the game's executable.
    let game_dir = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."));

    game_dir.join("Mods").join("CSVNameBank")
}

/// Logs where the mod folder is. This runs after logging starts, since the folder is needed to
/// find the log file.
pub fn report_mod_dir() {
    let path = find_mod_dir_path();

    if path.exists() {
        log::info!("Mod folder: {:?}", path);
    } else {
        log::warn!("Mod folder {:?} does not exist.", path);
    }
}

/// Returns the path of a file in the mod folder. Absolute paths are returned unchanged.
pub fn get_mod_path(resource: impl AsRef<Path>) -> PathBuf {
    let resource = resource.as_ref();

    if resource.is_absolute() {
        return resource.to_path_buf();
    }

    find_mod_dir_path().join(resource)
}
