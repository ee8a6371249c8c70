use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Result, Write};

/// One entry in a PE's activity log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeRecord {
  /// Poll iteration the record was taken in
  pub step: u64,
  pub action: String,
  pub subject: String,
}

/// Macro to push a PeRecord stamped with the current step
///
/// Usage:
/// ```ignore
/// pe_record!(self, "action_name", "subject string");
/// pe_record!(self, "action_name", format!("formatted {}", value));
/// ```
#[macro_export]
macro_rules! pe_record {
  ($self:expr, $action:expr, $subject:expr) => {
    $self.records.push($crate::simulator::sim::records::PeRecord {
      step: $self.steps,
      action: $action.to_string(),
      subject: $subject.to_string(),
    });
  };
}

/// Append the records of one PE to a JSON-lines trace
pub fn write_trace<W: Write>(writer: &mut W, pe: &str, records: &[PeRecord]) -> Result<()> {
  for record in records {
    let trace_entry = serde_json::json!({
      "pe": pe,
      "step": record.step,
      "action": record.action,
      "subject": record.subject,
    });
    writeln!(writer, "{}", trace_entry)?;
  }
  writer.flush()
}

pub fn open_trace(path: &str) -> Result<BufWriter<File>> {
  Ok(BufWriter::new(File::create(path)?))
}

pub fn print_records(pe: &str, records: &[PeRecord]) {
  if records.is_empty() {
    return;
  }
  println!("\n[{}]", pe);
  for record in records {
    println!("  Step {}: {} ({})", record.step, record.action, record.subject);
  }
}
