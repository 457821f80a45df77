//! Monitor settings from `taskmon.ini` or `taskmon.xml`.
//!
//! The INI file wins when both exist. Settings are loaded once at startup;
//! missing or unparseable keys fall back to defaults one at a time.

use std::path::Path;
use std::time::Duration;

use color_eyre::Result;
use config::{Config, File, FileFormat};
use log::*;
use serde::Deserialize;

use crate::monitor::SortKey;

pub const INI_FILE: &str = "taskmon.ini";
pub const XML_FILE: &str = "taskmon.xml";

const DEFAULT_INTERVAL_SECS: f64 = 2.0;
const DEFAULT_TITLE: &str = "taskmon";

/// Settings fixed for the lifetime of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    pub refresh_interval: Duration,
    pub show_system_processes: bool,
    pub sort_by: SortKey,
    pub window_title: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs_f64(DEFAULT_INTERVAL_SECS),
            show_system_processes: true,
            sort_by: SortKey::Cpu,
            window_title: DEFAULT_TITLE.to_string(),
        }
    }
}

/// Raw key/value view shared by both file formats. Everything is optional
/// and arrives as text; coercion happens per key in the `From` impl.
#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    refresh_interval: Option<String>,
    show_system_processes: Option<String>,
    sort_by: Option<String>,
    window_title: Option<String>,
}

impl MonitorConfig {
    /// Load from the first config file found in `dir`, or defaults when
    /// there is none. A file that fails to parse logs a warning and counts
    /// as absent.
    pub fn load(dir: &Path) -> Self {
        let ini = dir.join(INI_FILE);
        let xml = dir.join(XML_FILE);
        if ini.exists() {
            match load_ini(&ini) {
                Ok(raw) => return raw.into(),
                Err(err) => warn!(target: "config", "Ignoring {}: {err}", ini.display()),
            }
        } else if xml.exists() {
            match load_xml(&xml) {
                Ok(raw) => return raw.into(),
                Err(err) => warn!(target: "config", "Ignoring {}: {err}", xml.display()),
            }
        }
        Self::default()
    }
}

impl From<RawConfig> for MonitorConfig {
    fn from(raw: RawConfig) -> Self {
        let defaults = Self::default();
        Self {
            refresh_interval: raw
                .refresh_interval
                .and_then(|v| v.trim().parse::<f64>().ok())
                .filter(|secs| *secs > 0.0)
                .map(Duration::from_secs_f64)
                .unwrap_or(defaults.refresh_interval),
            show_system_processes: raw
                .show_system_processes
                .and_then(|v| parse_bool(&v))
                .unwrap_or(defaults.show_system_processes),
            sort_by: raw
                .sort_by
                .map(|v| SortKey::parse(&v))
                .unwrap_or(defaults.sort_by),
            window_title: raw
                .window_title
                .filter(|title| !title.trim().is_empty())
                .unwrap_or(defaults.window_title),
        }
    }
}

/// Accepts 1/0 as well as the usual spellings; INI files in the wild use both.
fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn load_ini(path: &Path) -> Result<RawConfig> {
    let raw = Config::builder()
        .add_source(File::from(path.to_path_buf()).format(FileFormat::Ini))
        .build()?;
    Ok(raw.get::<RawConfig>("app")?)
}

/// One element per key under the document root, e.g.
/// `<config><refresh_interval>5</refresh_interval></config>`.
fn load_xml(path: &Path) -> Result<RawConfig> {
    let text = std::fs::read_to_string(path)?;
    Ok(quick_xml::de::from_str(&text)?)
}
