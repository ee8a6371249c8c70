use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;

use crate::simulator::sim::mode::{OperandWidth, RunTarget, SimConfig, StepMode};

const DEFAULT_CONFIG: &str = include_str!("default.toml");

/// Single-PE section
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PeSection {
  #[serde(default = "default_width")]
  pub width: String,
  #[serde(default = "default_channel_capacity")]
  pub channel_capacity: usize,
  #[serde(default)]
  pub left: Vec<i64>,
  #[serde(default)]
  pub up: Vec<i64>,
}

fn default_width() -> String {
  "i32".to_string()
}

fn default_channel_capacity() -> usize {
  2
}

impl Default for PeSection {
  fn default() -> Self {
    Self {
      width: default_width(),
      channel_capacity: default_channel_capacity(),
      left: Vec::new(),
      up: Vec::new(),
    }
  }
}

/// Simulation control section
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct SimulationSection {
  #[serde(default)]
  pub quiet: bool,
  #[serde(default)]
  pub step_mode: bool,
  /// 0 = unbounded
  #[serde(default)]
  pub max_steps: u64,
  #[serde(default)]
  pub trace_file: String,
}

/// Full-array workload: C = A x B on a rows x cols mesh
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MeshSection {
  pub dimensions: [usize; 2],
  pub a: Vec<Vec<i64>>,
  pub b: Vec<Vec<i64>>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct AppConfig {
  #[serde(default)]
  pub pe: PeSection,
  #[serde(default)]
  pub simulation: SimulationSection,
  #[serde(default)]
  pub mesh: Option<MeshSection>,
}

/// Command line values that take precedence over every config file
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
  pub quiet: bool,
  pub step: bool,
  pub trace_file: Option<String>,
  pub width: Option<String>,
  pub channel_capacity: Option<usize>,
  pub max_steps: Option<u64>,
  pub left: Option<Vec<i64>>,
  pub up: Option<Vec<i64>>,
}

fn invalid_data(msg: impl Into<String>) -> io::Error {
  io::Error::new(io::ErrorKind::InvalidData, msg.into())
}

fn parse_table(content: &str, origin: &str) -> io::Result<toml::Table> {
  content
    .parse::<toml::Table>()
    .map_err(|e| invalid_data(format!("failed to parse TOML config {}: {}", origin, e)))
}

/// Load the built-in defaults
pub fn load_default_config() -> io::Result<AppConfig> {
  parse_config_str(DEFAULT_CONFIG)
}

pub fn parse_config_str(content: &str) -> io::Result<AppConfig> {
  toml::from_str::<AppConfig>(content).map_err(|e| invalid_data(format!("failed to parse TOML config: {}", e)))
}

/// Load the file at `path` merged over the defaults
pub fn load_config_file(path: &Path) -> io::Result<AppConfig> {
  let content = fs::read_to_string(path)
    .map_err(|e| io::Error::new(io::ErrorKind::NotFound, format!("cannot read config file {:?}: {}", path, e)))?;
  merge_config_str(&content, &path.display().to_string())
}

/// Merge two TOML tables key by key; values in `overlay` win
fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
  for (key, value) in overlay {
    if let toml::Value::Table(overlay_sub) = value {
      if let Some(toml::Value::Table(base_sub)) = base.get_mut(&key) {
        merge_tables(base_sub, overlay_sub);
        continue;
      }
      base.insert(key, toml::Value::Table(overlay_sub));
    } else {
      base.insert(key, value);
    }
  }
}

/// Merge a user config text on top of the defaults.
///
/// Only keys present in `overlay` replace defaults, so a user file may set a
/// single field without restating the rest.
pub fn merge_config_str(overlay: &str, origin: &str) -> io::Result<AppConfig> {
  let mut base = parse_table(DEFAULT_CONFIG, "<default>")?;
  merge_tables(&mut base, parse_table(overlay, origin)?);
  toml::Value::Table(base)
    .try_into::<AppConfig>()
    .map_err(|e| invalid_data(format!("invalid config {}: {}", origin, e)))
}

/// Apply CLI parameter overrides
pub fn apply_cli_overrides(config: &mut AppConfig, cli: &CliOverrides) {
  if cli.quiet {
    config.simulation.quiet = true;
  }
  if cli.step {
    config.simulation.step_mode = true;
  }
  if let Some(file) = &cli.trace_file {
    config.simulation.trace_file = file.clone();
  }
  if let Some(width) = &cli.width {
    config.pe.width = width.clone();
  }
  if let Some(capacity) = cli.channel_capacity {
    config.pe.channel_capacity = capacity;
  }
  if let Some(max_steps) = cli.max_steps {
    config.simulation.max_steps = max_steps;
  }
  if let Some(left) = &cli.left {
    config.pe.left = left.clone();
  }
  if let Some(up) = &cli.up {
    config.pe.up = up.clone();
  }
}

/// Validate configuration
pub fn validate_config(config: &AppConfig) -> io::Result<()> {
  config.pe.width.parse::<OperandWidth>().map_err(invalid_data)?;

  if config.pe.channel_capacity == 0 {
    return Err(invalid_data("channel_capacity must be at least 1"));
  }

  if let Some(mesh) = &config.mesh {
    let [rows, cols] = mesh.dimensions;
    if rows == 0 || cols == 0 {
      return Err(invalid_data(format!("mesh dimensions must be non-zero, got {}x{}", rows, cols)));
    }
    if mesh.a.len() != rows {
      return Err(invalid_data(format!("mesh.a has {} rows, expected {}", mesh.a.len(), rows)));
    }
    let k = mesh.b.len();
    if let Some(row) = mesh.a.iter().position(|r| r.len() != k) {
      return Err(invalid_data(format!(
        "mesh.a row {} has {} columns, expected {} (rows of mesh.b)",
        row,
        mesh.a[row].len(),
        k
      )));
    }
    if let Some(row) = mesh.b.iter().position(|r| r.len() != cols) {
      return Err(invalid_data(format!(
        "mesh.b row {} has {} columns, expected {}",
        row,
        mesh.b[row].len(),
        cols
      )));
    }
  }

  Ok(())
}

/// Load and merge configs
///
/// Flow:
/// 1. Load the built-in defaults
/// 2. If a custom config file is given, merge it on top
/// 3. Apply CLI overrides
/// 4. Validate
pub fn load_and_merge_configs(custom_config_path: Option<&Path>, cli: &CliOverrides) -> io::Result<AppConfig> {
  let mut config = match custom_config_path {
    Some(path) => load_config_file(path)?,
    None => load_default_config()?,
  };

  apply_cli_overrides(&mut config, cli);
  validate_config(&config)?;

  Ok(config)
}

/// Flatten a validated AppConfig into runtime settings
pub fn to_sim_config(config: &AppConfig, use_mesh: bool) -> io::Result<SimConfig> {
  let width = config.pe.width.parse::<OperandWidth>().map_err(invalid_data)?;
  if use_mesh && config.mesh.is_none() {
    return Err(invalid_data("--mesh requires a [mesh] section in the config file"));
  }

  let trace_file = if config.simulation.trace_file.is_empty() {
    None
  } else {
    Some(config.simulation.trace_file.clone())
  };

  Ok(SimConfig {
    quiet: config.simulation.quiet,
    step_mode: if config.simulation.step_mode {
      StepMode::Step
    } else {
      StepMode::Continuous
    },
    target: if use_mesh { RunTarget::Mesh } else { RunTarget::Single },
    width,
    channel_capacity: config.pe.channel_capacity,
    max_steps: config.simulation.max_steps,
    trace_file,
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_default_config() {
    let config = load_default_config().unwrap();
    assert_eq!(config.pe.width, "i32");
    assert_eq!(config.pe.channel_capacity, 2);
    assert_eq!(config.pe.left, vec![1, 2, 3]);
    assert_eq!(config.pe.up, vec![4, 5, 6]);
    assert!(config.mesh.is_none());
    validate_config(&config).unwrap();
  }

  #[test]
  fn test_merge_keeps_unset_defaults() {
    let config = merge_config_str("[pe]\nwidth = \"i8\"\n", "test").unwrap();
    assert_eq!(config.pe.width, "i8");
    assert_eq!(config.pe.channel_capacity, 2);
    assert_eq!(config.pe.left, vec![1, 2, 3]);
    assert!(!config.simulation.quiet);
  }

  #[test]
  fn test_cli_overrides_win() {
    let mut config = merge_config_str("[simulation]\nmax_steps = 10\n", "test").unwrap();
    let cli = CliOverrides {
      quiet: true,
      max_steps: Some(99),
      left: Some(vec![7]),
      up: Some(vec![8]),
      ..Default::default()
    };
    apply_cli_overrides(&mut config, &cli);
    assert!(config.simulation.quiet);
    assert_eq!(config.simulation.max_steps, 99);
    assert_eq!(config.pe.left, vec![7]);
    assert_eq!(config.pe.up, vec![8]);
  }

  #[test]
  fn test_validate_rejects_bad_values() {
    let mut config = load_default_config().unwrap();
    config.pe.width = "f32".to_string();
    assert!(validate_config(&config).is_err());

    let mut config = load_default_config().unwrap();
    config.pe.channel_capacity = 0;
    assert!(validate_config(&config).is_err());
  }

  #[test]
  fn test_mesh_section_shapes() {
    let text = r#"
[mesh]
dimensions = [2, 2]
a = [[1, 2], [3, 4]]
b = [[5, 6], [7, 8]]
"#;
    let config = merge_config_str(text, "test").unwrap();
    validate_config(&config).unwrap();
    let sim = to_sim_config(&config, true).unwrap();
    assert_eq!(sim.target, RunTarget::Mesh);

    let bad = r#"
[mesh]
dimensions = [2, 2]
a = [[1, 2, 3], [3, 4, 5]]
b = [[5, 6], [7, 8]]
"#;
    let config = merge_config_str(bad, "test").unwrap();
    assert!(validate_config(&config).is_err());
  }

  #[test]
  fn test_mesh_flag_needs_section() {
    let config = load_default_config().unwrap();
    assert!(to_sim_config(&config, true).is_err());
    assert_eq!(to_sim_config(&config, false).unwrap().trace_file, None);
  }
}
