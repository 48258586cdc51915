//! Persistent configuration for the cheat engine

use std::path::{Path, PathBuf};

use crate::cheat::CheatError;

/// The directories used by the emulator, if the platform has them
fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "uglyoldbob", "snes_emulator")
}

/// The default location of the configuration file
pub fn default_config_path() -> PathBuf {
    match project_dirs() {
        Some(dirs) => dirs.config_dir().join("cheats.toml"),
        None => PathBuf::from("./cheats.toml"),
    }
}

/// The default directory for cheat files
fn default_cheat_path() -> PathBuf {
    match project_dirs() {
        Some(dirs) => dirs.data_dir().join("cheats"),
        None => PathBuf::from("./cheats"),
    }
}

/// Persistent configuration for cheats
#[non_exhaustive]
#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct CheatConfiguration {
    /// Are cheats allowed to touch memory when a game starts?
    pub cheats_enabled: bool,
    /// The directory holding a cheat file for each rom
    pub cheat_path: PathBuf,
    /// The cheat database to import from
    pub database: Option<PathBuf>,
    /// Import cheats from the database when a rom has no cheats of its own
    pub auto_import: bool,
    #[serde(skip)]
    /// The path for saving and loading
    path: PathBuf,
}

impl Default for CheatConfiguration {
    fn default() -> Self {
        Self {
            cheats_enabled: true,
            cheat_path: default_cheat_path(),
            database: None,
            auto_import: false,
            path: PathBuf::new(),
        }
    }
}

impl CheatConfiguration {
    ///Load a configuration file. A missing file is created with the defaults, a broken one is left alone.
    pub fn load(name: PathBuf) -> Self {
        let mut result = CheatConfiguration {
            path: name.clone(),
            ..Default::default()
        };
        if let Ok(a) = std::fs::read(&name) {
            match std::str::from_utf8(&a) {
                Ok(buf) => match toml::from_str::<CheatConfiguration>(buf) {
                    Ok(p) => {
                        result = p;
                        result.path = name;
                    }
                    Err(e) => {
                        log::warn!("Failed to load config file: {}", e);
                    }
                },
                Err(e) => {
                    log::warn!("Config file is not text: {}", e);
                }
            }
        } else if let Err(e) = result.save() {
            log::warn!("Failed to create config file: {}", e);
        }
        result
    }

    /// Save results to disk
    pub fn save(&self) -> Result<(), CheatError> {
        let data = toml::to_string(self).map_err(|e| CheatError::Config(e.to_string()))?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| CheatError::Config(e.kind().to_string()))?;
            }
        }
        std::fs::write(&self.path, data).map_err(|e| CheatError::Config(e.kind().to_string()))
    }

    /// The file the configuration is saved to
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Change where the configuration is saved to
    pub fn set_path(&mut self, path: PathBuf) {
        self.path = path;
    }

    /// The cheat file for a rom. The rom may be given as a plain name or as a path.
    pub fn cheat_file(&self, rom_name: &str) -> PathBuf {
        let mut name = Path::new(rom_name)
            .file_stem()
            .map(|s| s.to_os_string())
            .unwrap_or_else(|| rom_name.into());
        name.push(".cht");
        self.cheat_path.join(name)
    }
}
