use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepMode {
  Continuous,
  Step,
}

/// What the simulator instantiates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunTarget {
  /// One PE fed by host-side border streams
  Single,
  /// A full rows x cols array
  Mesh,
}

/// Operand width selectable from the command line and config file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperandWidth {
  I8,
  I16,
  I32,
  I64,
}

impl FromStr for OperandWidth {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_lowercase().as_str() {
      "i8" => Ok(OperandWidth::I8),
      "i16" => Ok(OperandWidth::I16),
      "i32" => Ok(OperandWidth::I32),
      "i64" => Ok(OperandWidth::I64),
      other => Err(format!("unsupported operand width: {}", other)),
    }
  }
}

impl fmt::Display for OperandWidth {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      OperandWidth::I8 => "i8",
      OperandWidth::I16 => "i16",
      OperandWidth::I32 => "i32",
      OperandWidth::I64 => "i64",
    };
    write!(f, "{}", name)
  }
}

#[derive(Debug, Clone)]
pub struct SimConfig {
  pub quiet: bool,
  pub step_mode: StepMode,
  pub target: RunTarget,
  pub width: OperandWidth,
  pub channel_capacity: usize,
  /// 0 means poll until drained
  pub max_steps: u64,
  pub trace_file: Option<String>,
}
