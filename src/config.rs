//! Configuration surface (spec §6) plus CLI parsing and TOML loading, as
//! ambient stack.

use std::path::PathBuf;

use clap::Parser;
use serde::Deserialize;

use crate::error::{CoreError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HstoreMode {
    None,
    Norm,
    All,
}

impl Default for HstoreMode {
    fn default() -> Self {
        HstoreMode::None
    }
}

/// Optional tablespace assignment (spec §6, `tablespaces`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Tablespaces {
    pub main_data: Option<String>,
    pub main_idx: Option<String>,
    pub slim_data: Option<String>,
    pub slim_idx: Option<String>,
}

/// The configuration surface the core consumes (spec §6).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub projection_srs: i32,
    /// `0` disables expiry tracking.
    pub expire_min_zoom: u32,
    pub expire_max_zoom: u32,
    pub expire_max_bbox_m: f64,
    pub expire_buffer_tiles: f64,
    pub append: bool,
    pub style_file_path: String,
    pub hstore_mode: HstoreMode,
    pub hstore_match_only: bool,
    pub hstore_extra_columns: Vec<String>,
    pub multipolygon_split: bool,
    pub keep_coastlines: bool,
    pub flat_nodes_path: Option<String>,
    pub slim: bool,
    pub num_procs: u32,
    pub tablespaces: Tablespaces,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            projection_srs: crate::reproject::PROJ_SPHERE_MERC,
            expire_min_zoom: 0,
            expire_max_zoom: 18,
            expire_max_bbox_m: 20_000.0,
            expire_buffer_tiles: 0.1,
            append: false,
            style_file_path: "default.style".to_string(),
            hstore_mode: HstoreMode::None,
            hstore_match_only: false,
            hstore_extra_columns: Vec::new(),
            multipolygon_split: false,
            keep_coastlines: false,
            flat_nodes_path: None,
            slim: false,
            num_procs: 1,
            tablespaces: Tablespaces::default(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.expire_max_zoom > 0 && self.expire_min_zoom > self.expire_max_zoom {
            return Err(CoreError::InvalidInput(format!(
                "expire_min_zoom ({}) must be <= expire_max_zoom ({})",
                self.expire_min_zoom, self.expire_max_zoom
            )));
        }
        if self.num_procs == 0 {
            return Err(CoreError::InvalidInput("num_procs must be >= 1".to_string()));
        }
        Ok(())
    }

    /// Load and merge a TOML config file, then overlay CLI overrides
    /// (spec §6 ambient stack: CLI + file configuration).
    pub fn load(path: Option<&std::path::Path>, cli: &Cli) -> Result<Config> {
        let mut config = match path {
            Some(p) => {
                let text = std::fs::read_to_string(p)
                    .map_err(|e| CoreError::InvalidInput(format!("reading config file {}: {e}", p.display())))?;
                toml::from_str(&text)
                    .map_err(|e| CoreError::InvalidInput(format!("parsing config file {}: {e}", p.display())))?
            }
            None => Config::default(),
        };

        cli.apply(&mut config);
        config.validate()?;
        Ok(config)
    }
}

/// Command-line surface (spec §1, CLI parsing is an ambient concern carried
/// outside the distilled feature set; the flags here mirror the
/// configuration surface of §6).
#[derive(Debug, Parser)]
#[command(name = "osm-tiles", about = "Transform OSM data into relational geometry tables")]
pub struct Cli {
    /// Path to a TOML configuration file.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Path to the style file (spec §4.7).
    #[arg(long)]
    pub style: Option<String>,

    /// Apply as a diff against existing tables instead of a fresh import.
    #[arg(long)]
    pub append: bool,

    /// Target spatial reference system for stored geometry.
    #[arg(long)]
    pub projection: Option<i32>,

    /// Path to a flat-node file; omit to use the row-sink-backed nodes table.
    #[arg(long)]
    pub flat_nodes: Option<String>,

    /// Number of stage-2 worker threads.
    #[arg(long)]
    pub num_procs: Option<u32>,

    /// Input OSM file (handed to the out-of-scope `Source` implementation).
    pub input: Option<PathBuf>,
}

impl Cli {
    fn apply(&self, config: &mut Config) {
        if let Some(style) = &self.style {
            config.style_file_path = style.clone();
        }
        if self.append {
            config.append = true;
        }
        if let Some(srs) = self.projection {
            config.projection_srs = srs;
        }
        if let Some(path) = &self.flat_nodes {
            config.flat_nodes_path = Some(path.clone());
        }
        if let Some(n) = self.num_procs {
            config.num_procs = n;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn min_zoom_above_max_zoom_is_rejected() {
        let mut config = Config::default();
        config.expire_min_zoom = 10;
        config.expire_max_zoom = 5;
        assert!(matches!(config.validate(), Err(CoreError::InvalidInput(_))));
    }

    #[test]
    fn zero_num_procs_is_rejected() {
        let mut config = Config::default();
        config.num_procs = 0;
        assert!(matches!(config.validate(), Err(CoreError::InvalidInput(_))));
    }

    #[test]
    fn toml_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "projection_srs = 4326\nnum_procs = 4\n").unwrap();

        let cli = Cli {
            config: Some(path.clone()),
            style: None,
            append: false,
            projection: None,
            flat_nodes: None,
            num_procs: None,
            input: None,
        };
        let config = Config::load(Some(&path), &cli).unwrap();
        assert_eq!(config.projection_srs, 4326);
        assert_eq!(config.num_procs, 4);
    }

    #[test]
    fn cli_overrides_take_precedence_over_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "num_procs = 4\n").unwrap();

        let cli = Cli {
            config: Some(path.clone()),
            style: None,
            append: false,
            projection: None,
            flat_nodes: None,
            num_procs: Some(8),
            input: None,
        };
        let config = Config::load(Some(&path), &cli).unwrap();
        assert_eq!(config.num_procs, 8);
    }
}
