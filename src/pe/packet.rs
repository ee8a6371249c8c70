use serde::{Deserialize, Serialize};
use std::fmt;

/// One element of an operand stream.
///
/// A well-formed stream is any number of `Data` packets followed by exactly
/// one `End`, with nothing after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Packet<T> {
  Data(T),
  End,
}

impl<T> Packet<T> {
  pub fn is_end(&self) -> bool {
    matches!(self, Packet::End)
  }

  /// The carried operand, or `None` for the terminal sentinel
  pub fn data(self) -> Option<T> {
    match self {
      Packet::Data(value) => Some(value),
      Packet::End => None,
    }
  }
}

impl<T: fmt::Display> fmt::Display for Packet<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Packet::Data(value) => write!(f, "{}", value),
      Packet::End => write!(f, "End"),
    }
  }
}

/// The single packet a PE emits once both input streams are drained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultPacket<T> {
  pub value: T,
  pub terminal: bool,
}

impl<T> ResultPacket<T> {
  pub fn terminal(value: T) -> Self {
    Self { value, terminal: true }
  }
}

/// Build a well-formed stream: every value as `Data`, then one `End`
pub fn stream<T>(values: impl IntoIterator<Item = T>) -> Vec<Packet<T>> {
  values
    .into_iter()
    .map(Packet::Data)
    .chain(std::iter::once(Packet::End))
    .collect()
}

/// Strip a stream back to its operands, checking the `End` framing.
///
/// Returns `None` if the stream has no `End`, more than one, or data after it.
pub fn unframe<T: Copy>(packets: &[Packet<T>]) -> Option<Vec<T>> {
  let (last, body) = packets.split_last()?;
  if !last.is_end() {
    return None;
  }
  body.iter().map(|p| p.data()).collect()
}
