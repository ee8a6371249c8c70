pub mod mode;
pub mod records;
pub mod shell;

pub use mode::{OperandWidth, RunTarget, SimConfig, StepMode};
pub use records::PeRecord;
