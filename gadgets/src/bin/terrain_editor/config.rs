use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use ron::de::from_reader;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

use terrain::editor::TerrainEditorSettings;

pub const CONFIG_FILE_PATH: &str = "terrain_editor.ron";

/// Voxel scale to request at a given tick, as if a user moved a slider.
#[derive(Copy, Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct ScaleChange {
  pub tick: u32,
  pub voxel_scale: f32,
}

#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
  pub editor: TerrainEditorSettings,
  pub ticks: u32,
  pub scale_changes: Vec<ScaleChange>,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      editor: TerrainEditorSettings::default(),
      ticks: 4,
      scale_changes: vec![ScaleChange { tick: 1, voxel_scale: 0.5 }],
    }
  }
}

#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("Failed to open config file '{path}'")]
  Open { path: String, #[source] source: std::io::Error },
  #[error("Failed to deserialize config file '{path}'")]
  Deserialize { path: String, #[source] source: ron::Error },
}

impl Config {
  pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
    let file = File::open(path)
      .map_err(|source| ConfigError::Open { path: path.display().to_string(), source })?;
    from_reader(BufReader::new(file))
      .map_err(|source| ConfigError::Deserialize { path: path.display().to_string(), source })
  }

  /// Loads the config at `path`, falling back to the default config when it is missing or invalid.
  pub fn load_or_default(path: &Path) -> Self {
    if !path.exists() { return Self::default(); }
    match Self::from_file(path) {
      Ok(config) => config,
      Err(e) => {
        error!("Cannot load terrain editor config, returning default config: {:?}", e);
        Self::default()
      }
    }
  }
}


#[cfg(test)]
mod tests {
  use std::path::Path;

  use terrain::density::GridSize;

  use crate::config::{Config, ScaleChange};

  #[test]
  fn empty_config_is_default() {
    let config: Config = ron::from_str("()").unwrap();
    assert_eq!(config, Config::default());
  }

  #[test]
  fn partial_config_keeps_other_defaults() {
    let config: Config = ron::from_str(r#"(
      editor: (
        grid_size: (x: 16, y: 8, z: 16),
        voxel_scale: 0.5,
        marching_cubes: (iso_level: 0.25),
      ),
      ticks: 10,
      scale_changes: [(tick: 3, voxel_scale: 1.5)],
    )"#).unwrap();
    assert_eq!(config.editor.grid_size, GridSize::new(16, 8, 16));
    assert_eq!(config.editor.voxel_scale, 0.5);
    assert_eq!(config.editor.marching_cubes.iso_level, 0.25);
    assert_eq!(config.editor.marching_cubes.uv_scale, 1.0);
    assert_eq!(config.ticks, 10);
    assert_eq!(config.scale_changes, vec![ScaleChange { tick: 3, voxel_scale: 1.5 }]);
  }

  #[test]
  fn missing_file_falls_back_to_default() {
    let config = Config::load_or_default(Path::new("this/config/does/not/exist.ron"));
    assert_eq!(config, Config::default());
    assert!(Config::from_file(Path::new("this/config/does/not/exist.ron")).is_err());
  }
}
