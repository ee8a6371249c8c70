use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::io::{self, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
  Step(u32), // Step N times
  Quit,
  Continue,
}

pub fn new_editor() -> Result<DefaultEditor> {
  DefaultEditor::new().map_err(|e| io::Error::new(io::ErrorKind::Other, e))
}

/// Parse one line of shell input. `Err` carries the message to show the user.
pub fn parse_command(line: &str) -> std::result::Result<Command, String> {
  let trimmed = line.trim();

  // Empty input: step once
  if trimmed.is_empty() {
    return Ok(Command::Step(1));
  }

  // si command: step N times
  if let Some(rest) = trimmed.strip_prefix("si") {
    let num_str = rest.trim();
    if num_str.is_empty() {
      return Err("'si' requires a number, e.g., 'si 100'".to_string());
    }
    return match num_str.parse::<u32>() {
      Ok(n) if n > 0 => Ok(Command::Step(n)),
      Ok(_) => Err("step count must be greater than 0".to_string()),
      Err(e) => Err(format!("invalid number '{}': {}", num_str, e)),
    };
  }

  match trimmed {
    "q" => Ok(Command::Quit),
    "c" => Ok(Command::Continue),
    other => Err(format!(
      "Unknown command: '{}'. Use Enter to step, 'q' to quit, 'c' to continue, or 'si 100' to step N times",
      other
    )),
  }
}

pub fn read_command(editor: &mut DefaultEditor) -> Result<Command> {
  loop {
    match editor.readline("(pe) ") {
      Ok(line) => {
        let trimmed = line.trim();
        if !trimmed.is_empty() {
          let _ = editor.add_history_entry(trimmed);
        }
        match parse_command(trimmed) {
          Ok(command) => return Ok(command),
          Err(msg) => eprintln!("Error: {}", msg),
        }
      },
      // Ctrl-C / Ctrl-D: quit
      Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => return Ok(Command::Quit),
      Err(err) => return Err(io::Error::new(io::ErrorKind::Other, err)),
    }
  }
}
