use directories::UserDirs;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::mpsc::{self, Receiver},
};

use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::error::{Error, Result};
use crate::input;

pub const DEFAULT_SENSITIVITY: u8 = 50;
pub const MAX_SENSITIVITY: u8 = 100;

const SETTINGS_FILE: &str = "settings.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Settings {
    /// How little finger travel a full reveal needs, `0..=100`.
    pub sensitivity: u8,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sensitivity: DEFAULT_SENSITIVITY,
        }
    }
}

// Wide integer so out-of-range values get a proper error instead of a
// generic parse failure.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSettings {
    sensitivity: Option<i64>,
}

impl Settings {
    pub fn with_sensitivity(value: i64) -> Result<Self> {
        let sensitivity = u8::try_from(value)
            .ok()
            .filter(|v| *v <= MAX_SENSITIVITY)
            .ok_or(Error::InvalidSensitivity(value))?;
        Ok(Self { sensitivity })
    }

    /// Multiplier applied to gesture distance: `1/3` at 0, `1` at 100.
    pub fn sensitivity_factor(&self) -> f64 {
        (f64::from(self.sensitivity) + 50.) / 150.
    }

    pub fn parse(text: &str, path: &Path) -> Result<Self> {
        let raw: RawSettings = toml::from_str(text).map_err(|e| Error::settings(path, e))?;
        match raw.sensitivity {
            Some(value) => Self::with_sensitivity(value),
            None => Ok(Self::default()),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| Error::settings(path, e))?;
        Self::parse(&text, path)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let text = toml::to_string(self).map_err(|e| Error::settings(path, e))?;
        fs::write(path, text)?;
        Ok(())
    }
}

fn default_settings_text() -> &'static str {
    include_str!("../settings/default.toml")
}

pub fn config_dir() -> Result<PathBuf> {
    let dirs = UserDirs::new().ok_or(Error::NoHome)?;
    Ok(dirs.home_dir().join(".config").join("smoothswipe"))
}

#[derive(Debug, Clone)]
pub struct SettingsState {
    pub settings: Settings,
    pub config_dir: PathBuf,
    pub settings_path: PathBuf,
}

impl SettingsState {
    pub fn load_or_install_default() -> Result<Self> {
        Self::load_or_install_in(config_dir()?)
    }

    pub fn load_or_install_in(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir)?;

        let settings_path = dir.join(SETTINGS_FILE);
        if !settings_path.exists() {
            fs::write(&settings_path, default_settings_text())?;
            info!("installed default settings at {}", settings_path.display());
        }

        let settings = Settings::load(&settings_path)?;
        Ok(Self {
            settings,
            config_dir: dir,
            settings_path,
        })
    }

    /// Re-reads the file. On failure the previous settings stay in effect.
    pub fn reload(&mut self) -> Result<bool> {
        let settings = Settings::load(&self.settings_path)?;
        let changed = settings != self.settings;
        self.settings = settings;
        Ok(changed)
    }

    pub fn set_sensitivity(&mut self, value: i64) -> Result<()> {
        let settings = Settings::with_sensitivity(value)?;
        settings.save(&self.settings_path)?;
        self.settings = settings;
        Ok(())
    }

    pub fn doctor_report(&self) -> serde_json::Value {
        let devices: Vec<String> = input::discover_touchpads()
            .into_iter()
            .map(|d| format!("{} ({})", d.name, d.path))
            .collect();
        serde_json::json!({
            "input_group_member": check_in_input_group(),
            "settings_path": self.settings_path,
            "settings": self.settings,
            "sensitivity_factor": self.settings.sensitivity_factor(),
            "devices": devices,
            "hints": {
                "add_user_to_input_group": "sudo usermod -aG input $USER && newgrp input"
            }
        })
    }
}

fn check_in_input_group() -> bool {
    let Ok(groups) = fs::read_to_string("/etc/group") else {
        return false;
    };
    let user = whoami::username();
    groups
        .lines()
        .filter(|line| line.starts_with("input:"))
        .filter_map(|line| line.split(':').nth(3))
        .any(|members| members.split(',').any(|u| u == user))
}

/// Change notifications for the settings file.
pub struct SettingsWatcher {
    path: PathBuf,
    _watcher: RecommendedWatcher,
    rx: Receiver<notify::Result<notify::Event>>,
}

impl SettingsWatcher {
    /// Watches the file's directory, so editors that replace the file by
    /// renaming are still noticed.
    pub fn watch(path: &Path) -> Result<Self> {
        let (tx, rx) = mpsc::channel();
        let mut watcher = notify::recommended_watcher(tx)?;
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        watcher.watch(dir, RecursiveMode::NonRecursive)?;
        debug!("watching {} for settings changes", dir.display());

        Ok(Self {
            path: path.to_path_buf(),
            _watcher: watcher,
            rx,
        })
    }

    /// Drains pending notifications without blocking. Returns `true` if any
    /// of them touched the settings file.
    pub fn try_changed(&self) -> bool {
        let mut changed = false;
        while let Ok(event) = self.rx.try_recv() {
            match event {
                Ok(event) => changed |= touches(&event, &self.path),
                Err(e) => warn!("settings watcher: {e}"),
            }
        }
        changed
    }
}

fn touches(event: &notify::Event, path: &Path) -> bool {
    if matches!(event.kind, EventKind::Access(_)) {
        return false;
    }
    event
        .paths
        .iter()
        .any(|p| p.file_name().is_some() && p.file_name() == path.file_name())
}
