//! User-editable settings, loaded from `settings.json` in the mod folder.

use std::{
    fs::File,
    io::Read,
    path::{Path, PathBuf},
};

use eyre::Result;
use serde::{Deserialize, Serialize};

use crate::names::Gender;

/// The function that gets replaced.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Target {
    /// The library that exports the function. `None` means the game's executable.
    pub library: Option<String>,

    /// The exported name of the function.
    pub symbol: String,
}

impl Default for Target {
    fn default() -> Self {
        Target {
            library: None,
            symbol: "GeneratePawnName".to_string(),
        }
    }
}

/// How much gets written to the log file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl Default for LogLevel {
    fn default() -> Self {
        if cfg!(feature = "debug") {
            LogLevel::Debug
        } else {
            LogLevel::Info
        }
    }
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// The CSV name database. Relative paths are inside the mod folder.
    pub names_file: PathBuf,

    /// The gender used for rows whose gender is missing or unrecognised.
    pub fallback_gender: Gender,

    pub target: Target,

    /// The log file. Relative paths are inside the mod folder.
    pub log_file: PathBuf,

    pub log_level: LogLevel,

    /// Fixes the order names are drawn in. Without a seed, the order changes every launch.
    pub seed: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            names_file: PathBuf::from("NameDatabase.csv"),
            fallback_gender: Gender::Male,
            target: Target::default(),
            log_file: PathBuf::from("csv_name_bank.log"),
            log_level: LogLevel::default(),
            seed: None,
        }
    }
}

impl Settings {
    /// Attempts to parse the contents of `reader` to get a `Settings` value.
    pub fn parse_json(reader: impl Read) -> Result<Settings> {
        Ok(serde_json::from_reader(reader)?)
    }

    /// Returns the path of the settings file.
    pub fn path() -> PathBuf {
        crate::resources::get_mod_path("settings.json")
    }

    /// Looks for a settings file and loads it.
    fn load_from_file(path: &Path) -> Result<Option<Settings>> {
        if !path.exists() {
            // This isn't an error, but we didn't find any settings.
            return Ok(None);
        }

        Ok(Some(Settings::parse_json(File::open(path)?)?))
    }

    /// Loads the settings at `path`, or uses the defaults. Nothing is logged here because this
    /// runs before the logger exists. Pass the returned source to [`SettingsSource::report`] once
    /// it does.
    pub fn load_from(path: &Path) -> (Settings, SettingsSource) {
        match Settings::load_from_file(path) {
            Ok(Some(settings)) => (settings, SettingsSource::File(path.to_path_buf())),
            Ok(None) => (Settings::default(), SettingsSource::Missing),
            Err(err) => (Settings::default(), SettingsSource::Invalid(err)),
        }
    }

    /// Either loads the settings from the mod folder or uses the defaults.
    pub fn load() -> (Settings, SettingsSource) {
        Settings::load_from(&Settings::path())
    }

    pub fn names_path(&self) -> PathBuf {
        crate::resources::get_mod_path(&self.names_file)
    }

    pub fn log_path(&self) -> PathBuf {
        crate::resources::get_mod_path(&self.log_file)
    }
}

/// Where the settings came from.
#[derive(Debug)]
pub enum SettingsSource {
    File(PathBuf),
    Missing,
    Invalid(eyre::Report),
}

impl SettingsSource {
    pub fn report(&self) {
        match self {
            SettingsSource::File(path) => log::info!("Settings loaded from {:?}", path),

            SettingsSource::Missing => log::info!("No settings file found. Defaults will be used."),

            SettingsSource::Invalid(err) => {
                log::error!("Error loading settings file: {err:?}. Defaults will be used.")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::capture;
    use log::Level;

    #[test]
    fn partial_json_uses_defaults() {
        let settings = Settings::parse_json(
            r#"{ "fallback_gender": "female", "seed": 12, "target": { "symbol": "MakeName" } }"#
                .as_bytes(),
        )
        .unwrap();

        assert_eq!(settings.fallback_gender, Gender::Female);
        assert_eq!(settings.seed, Some(12));
        assert_eq!(settings.target.symbol, "MakeName");
        assert_eq!(settings.target.library, None);
        assert_eq!(settings.names_file, PathBuf::from("NameDatabase.csv"));
        assert_eq!(settings.log_level, LogLevel::default());
    }

    #[test]
    fn empty_object_is_default() {
        assert_eq!(
            Settings::parse_json("{}".as_bytes()).unwrap(),
            Settings::default()
        );
    }

    #[test]
    fn invalid_values_are_errors() {
        assert!(Settings::parse_json(r#"{ "fallback_gender": "Robot" }"#.as_bytes()).is_err());
        assert!(Settings::parse_json(r#"{ "log_level": "loud" }"#.as_bytes()).is_err());
    }

    #[test]
    fn round_trips_through_json() {
        let settings = Settings {
            seed: Some(99),
            log_level: LogLevel::Trace,
            ..Settings::default()
        };

        let json = serde_json::to_string_pretty(&settings).unwrap();
        assert_eq!(Settings::parse_json(json.as_bytes()).unwrap(), settings);
    }

    #[test]
    fn invalid_file_is_reported_once_logging_runs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();

        let ((settings, source), during_load) = capture::records(|| Settings::load_from(&path));

        assert_eq!(settings, Settings::default());
        assert!(matches!(source, SettingsSource::Invalid(_)));
        assert!(during_load.is_empty());

        let ((), reported) = capture::records(|| source.report());

        assert_eq!(reported.len(), 1);
        assert_eq!(reported[0].0, Level::Error);
        assert!(reported[0].1.starts_with("Error loading settings file"));
        assert!(reported[0].1.ends_with("Defaults will be used."));
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let (settings, source) = Settings::load_from(&dir.path().join("settings.json"));

        assert_eq!(settings, Settings::default());
        assert!(matches!(source, SettingsSource::Missing));

        let ((), reported) = capture::records(|| source.report());
        assert_eq!(
            reported,
            vec![(Level::Info, "No settings file found. Defaults will be used.".to_string())]
        );
    }

    #[test]
    fn file_settings_are_used() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{ "seed": 5 }"#).unwrap();

        let (settings, source) = Settings::load_from(&path);

        assert_eq!(settings.seed, Some(5));
        assert!(matches!(source, SettingsSource::File(found) if found == path));
    }
}
