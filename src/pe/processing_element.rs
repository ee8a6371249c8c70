// Processing Element (PE) of a streaming systolic array
//
// Each PE pairs one operand from its left neighbour with one from the
// neighbour above, accumulates their product, and forwards both operands
// right and down unchanged. Termination rides in-band: every stream ends with
// a single `End` packet, which is staged and paired exactly like data.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::thread;
use thiserror::Error;

use super::channel::{ChannelError, ChannelRx, ChannelTx, PacketSink, PacketSource};
use super::operand::Operand;
use super::packet::{Packet, ResultPacket};
use crate::pe_record;
use crate::simulator::sim::records::PeRecord;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PeError {
  #[error("{pe}: write to {port} failed: {source}")]
  Write {
    pe: String,
    port: &'static str,
    #[source]
    source: ChannelError,
  },
}

/// Control state of the poll loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PeState {
  /// Waiting for at least one slot to be filled
  Filling,
  /// A pair was just consumed and forwarded
  Paired,
  /// Both `End` packets matched; the result has been written
  Drained,
}

/// One-packet staging buffer for an input direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Slot<T> {
  Empty,
  Data(T),
  End,
}

impl<T> Slot<T> {
  fn into_packet(self) -> Option<Packet<T>> {
    match self {
      Slot::Empty => None,
      Slot::Data(value) => Some(Packet::Data(value)),
      Slot::End => Some(Packet::End),
    }
  }
}

/// Per-direction input state
#[derive(Debug, Clone, Copy)]
struct Lane<T> {
  slot: Slot<T>,
  /// Sticky: set when `End` is read, no further reads afterwards
  seen_end: bool,
  /// Set once this direction's `End` has been paired and forwarded
  drained: bool,
}

impl<T: Copy> Lane<T> {
  fn new() -> Self {
    Self {
      slot: Slot::Empty,
      seen_end: false,
      drained: false,
    }
  }

  /// Try to fill an empty slot. Returns true if a packet was taken.
  fn poll<S: PacketSource<Packet<T>>>(&mut self, source: &mut S) -> bool {
    if !matches!(self.slot, Slot::Empty) || self.seen_end {
      return false;
    }
    match source.nb_read() {
      Some(Packet::Data(value)) => {
        self.slot = Slot::Data(value);
        true
      },
      Some(Packet::End) => {
        self.slot = Slot::End;
        self.seen_end = true;
        true
      },
      None => false,
    }
  }

  fn is_staged(&self) -> bool {
    !matches!(self.slot, Slot::Empty)
  }

  fn take(&mut self) -> Slot<T> {
    std::mem::replace(&mut self.slot, Slot::Empty)
  }
}

fn write_port<P, S: PacketSink<P>>(pe: &str, port: &'static str, sink: &mut S, packet: P) -> Result<(), PeError> {
  sink.write(packet).map_err(|source| PeError::Write {
    pe: pe.to_string(),
    port,
    source,
  })
}

/// The five ports of a PE, wired by whoever builds the array
#[derive(Debug)]
pub struct Ports<I, O, R> {
  pub left_in: I,
  pub up_in: I,
  pub right_out: O,
  pub down_out: O,
  pub result_out: R,
}

/// Processing Element - streams a multiply-accumulate over two inputs
#[derive(Debug)]
pub struct ProcessingElement<T, I, O, R> {
  name: String,
  ports: Ports<I, O, R>,
  acc: T,
  left: Lane<T>,
  up: Lane<T>,
  state: PeState,
  /// Poll iterations executed
  steps: u64,
  /// Packets taken from either input
  reads: u64,
  /// Pairings consumed, including those involving `End`
  pairs: u64,
  records: Vec<PeRecord>,
}

/// A PE wired to real bounded channels
pub type ChannelPe<T> = ProcessingElement<T, ChannelRx<Packet<T>>, ChannelTx<Packet<T>>, ChannelTx<ResultPacket<T>>>;

impl<T, I, O, R> ProcessingElement<T, I, O, R>
where
  T: Operand,
  I: PacketSource<Packet<T>>,
  O: PacketSink<Packet<T>>,
  R: PacketSink<ResultPacket<T>>,
{
  pub fn new(name: impl Into<String>, ports: Ports<I, O, R>) -> Self {
    Self {
      name: name.into(),
      ports,
      acc: T::zero(),
      left: Lane::new(),
      up: Lane::new(),
      state: PeState::Filling,
      steps: 0,
      reads: 0,
      pairs: 0,
      records: Vec::new(),
    }
  }

  /// Run one iteration of the poll loop.
  ///
  /// Both directions are polled (left first, with no other priority), then a
  /// pair is consumed if both slots are staged. Once drained, further calls
  /// are no-ops that keep returning `Drained`.
  pub fn step(&mut self) -> Result<PeState, PeError> {
    if self.state == PeState::Drained {
      return Ok(PeState::Drained);
    }
    self.steps += 1;

    if self.left.poll(&mut self.ports.left_in) {
      self.reads += 1;
      if self.left.slot == Slot::End {
        pe_record!(self, "left_end", "staged End from left_in");
      }
    }
    if self.up.poll(&mut self.ports.up_in) {
      self.reads += 1;
      if self.up.slot == Slot::End {
        pe_record!(self, "up_end", "staged End from up_in");
      }
    }

    if !(self.left.is_staged() && self.up.is_staged()) {
      self.state = PeState::Filling;
      return Ok(self.state);
    }

    self.consume_pair()?;
    Ok(self.state)
  }

  fn consume_pair(&mut self) -> Result<(), PeError> {
    let left = self.left.take();
    let up = self.up.take();

    match (left, up) {
      (Slot::Data(l), Slot::Data(u)) => {
        self.acc = T::mac(self.acc, l, u);
        debug!("{}: mac {} * {} -> acc={}", self.name, l, u, self.acc);
      },
      (Slot::Data(_), Slot::End) => {
        warn!("{}: left data paired with up End; streams differ in length, PE will stall", self.name);
      },
      (Slot::End, Slot::Data(_)) => {
        warn!("{}: up data paired with left End; streams differ in length, PE will stall", self.name);
      },
      _ => {},
    }

    // Both slots were staged, so neither conversion can yield None
    if let Some(packet) = left.into_packet() {
      write_port(&self.name, "right_out", &mut self.ports.right_out, packet)?;
    }
    if let Some(packet) = up.into_packet() {
      write_port(&self.name, "down_out", &mut self.ports.down_out, packet)?;
    }

    if left == Slot::End {
      self.left.drained = true;
    }
    if up == Slot::End {
      self.up.drained = true;
    }
    self.pairs += 1;

    let left_str = left.into_packet().map(|p| p.to_string()).unwrap_or_default();
    let up_str = up.into_packet().map(|p| p.to_string()).unwrap_or_default();
    pe_record!(self, "pair", format!("left={} up={} acc={}", left_str, up_str, self.acc));

    if self.left.drained && self.up.drained {
      self.emit_result()?;
      self.state = PeState::Drained;
    } else {
      self.state = PeState::Paired;
    }
    Ok(())
  }

  fn emit_result(&mut self) -> Result<(), PeError> {
    let result = ResultPacket::terminal(self.acc);
    write_port(&self.name, "result_out", &mut self.ports.result_out, result)?;
    info!("{}: drained after {} pairs, result={}", self.name, self.pairs, self.acc);
    pe_record!(self, "result", format!("value={} terminal=true", self.acc));
    Ok(())
  }

  /// One iteration, yielding the thread if nothing arrived and nothing paired
  fn step_cooperative(&mut self) -> Result<PeState, PeError> {
    let reads_before = self.reads;
    let state = self.step()?;
    if state == PeState::Filling && self.reads == reads_before {
      thread::yield_now();
    }
    Ok(state)
  }

  /// Poll until both streams are drained and return the accumulated value.
  ///
  /// Does not return if either stream never delivers `End`, or if the two
  /// streams have different lengths.
  pub fn run(&mut self) -> Result<T, PeError> {
    while self.step_cooperative()? != PeState::Drained {}
    Ok(self.acc)
  }

  /// Poll at most `max_steps` iterations. Returns the state reached.
  pub fn run_for(&mut self, max_steps: u64) -> Result<PeState, PeError> {
    for _ in 0..max_steps {
      if self.step_cooperative()? == PeState::Drained {
        break;
      }
    }
    Ok(self.state)
  }
}

impl<T: Copy, I, O, R> ProcessingElement<T, I, O, R> {
  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn accumulator(&self) -> T {
    self.acc
  }

  pub fn state(&self) -> PeState {
    self.state
  }

  pub fn is_drained(&self) -> bool {
    self.state == PeState::Drained
  }

  /// Current `(left, up)` staging slots
  pub fn slots(&self) -> (Slot<T>, Slot<T>) {
    (self.left.slot, self.up.slot)
  }

  pub fn steps(&self) -> u64 {
    self.steps
  }

  pub fn pairs(&self) -> u64 {
    self.pairs
  }

  pub fn records(&self) -> &[PeRecord] {
    &self.records
  }

  pub fn ports(&self) -> &Ports<I, O, R> {
    &self.ports
  }

  pub fn ports_mut(&mut self) -> &mut Ports<I, O, R> {
    &mut self.ports
  }

  pub fn into_ports(self) -> Ports<I, O, R> {
    self.ports
  }

  pub fn into_parts(self) -> (Ports<I, O, R>, Vec<PeRecord>) {
    (self.ports, self.records)
  }
}
