use log::warn;
use std::io::{self, Result};
use std::thread;

use super::config::config::{to_sim_config, AppConfig};
use super::sim::mode::{OperandWidth, RunTarget, SimConfig, StepMode};
use super::sim::records::{open_trace, print_records, write_trace, PeRecord};
use super::sim::shell::{self, Command};
use crate::log_info;
use crate::mesh::{collect, feed, reference_matmul, Mesh, MeshOutput};
use crate::pe::{channel, ChannelPe, Operand, Packet, PacketSource, PeState, Ports, ProcessingElement, ResultPacket};

/// What a single-PE run left behind
#[derive(Debug, Clone)]
pub struct SingleOutcome<T> {
  /// `None` if the PE never drained within the step budget
  pub result: Option<ResultPacket<T>>,
  pub state: PeState,
  pub steps: u64,
  pub right: Vec<Packet<T>>,
  pub down: Vec<Packet<T>>,
  pub records: Vec<PeRecord>,
}

pub struct Simulator {
  config: SimConfig,
  app: AppConfig,
}

fn other_err(e: impl std::error::Error + Send + Sync + 'static) -> io::Error {
  io::Error::new(io::ErrorKind::Other, e)
}

impl Simulator {
  pub fn new(config: SimConfig, app: AppConfig) -> Self {
    Self { config, app }
  }

  pub fn from_app_config(app: &AppConfig, use_mesh: bool) -> Result<Self> {
    let config = to_sim_config(app, use_mesh)?;
    Ok(Self::new(config, app.clone()))
  }

  pub fn config(&self) -> &SimConfig {
    &self.config
  }

  pub fn run(&mut self) -> Result<()> {
    match self.config.width {
      OperandWidth::I8 => self.run_as::<i8>(),
      OperandWidth::I16 => self.run_as::<i16>(),
      OperandWidth::I32 => self.run_as::<i32>(),
      OperandWidth::I64 => self.run_as::<i64>(),
    }
  }

  fn run_as<T: Operand>(&mut self) -> Result<()> {
    match self.config.target {
      RunTarget::Single => {
        let outcome = self.run_single::<T>()?;
        match outcome.result {
          Some(packet) => log_info!("PE_0_0 result = {} (terminal={})", packet.value, packet.terminal),
          None => warn!("PE_0_0 produced no result after {} steps (state {:?})", outcome.steps, outcome.state),
        }
        log_info!("right_out: {}", format_stream(&outcome.right));
        log_info!("down_out:  {}", format_stream(&outcome.down));
        if !self.config.quiet {
          print_records("PE_0_0", &outcome.records);
        }
        self.dump_trace(std::iter::once(("PE_0_0", outcome.records.as_slice())))
      },
      RunTarget::Mesh => {
        let output = self.run_mesh::<T>()?;
        for (i, row) in output.result.iter().enumerate() {
          log_info!("C[{}] = {:?}", i, row);
        }
        self.dump_trace(output.records.iter().map(|(name, records)| (name.as_str(), records.as_slice())))
      },
    }
  }

  fn dump_trace<'a>(&self, traces: impl Iterator<Item = (&'a str, &'a [PeRecord])>) -> Result<()> {
    let Some(path) = &self.config.trace_file else {
      return Ok(());
    };
    let mut writer = open_trace(path)?;
    for (name, records) in traces {
      write_trace(&mut writer, name, records)?;
    }
    log_info!("trace written to {}", path);
    Ok(())
  }

  /// Run one PE on the `[pe]` streams with real channels and feeder threads
  pub fn run_single<T: Operand>(&self) -> Result<SingleOutcome<T>> {
    let left: Vec<T> = self.app.pe.left.iter().map(|&v| T::from_i64_wrapping(v)).collect();
    let up: Vec<T> = self.app.pe.up.iter().map(|&v| T::from_i64_wrapping(v)).collect();
    if left.len() != up.len() {
      warn!(
        "left has {} operands and up has {}; the PE will never emit a result",
        left.len(),
        up.len()
      );
    }

    let capacity = self.config.channel_capacity;
    let (left_tx, left_rx) = channel(capacity);
    let (up_tx, up_rx) = channel(capacity);
    let (right_tx, right_rx) = channel(capacity);
    let (down_tx, down_rx) = channel(capacity);
    let (result_tx, mut result_rx) = channel(1);

    thread::scope(|s| -> Result<SingleOutcome<T>> {
      s.spawn(move || feed(left_tx, left.into_iter()));
      s.spawn(move || feed(up_tx, up.into_iter()));
      let right_handle = s.spawn(move || collect(right_rx));
      let down_handle = s.spawn(move || collect(down_rx));

      let mut pe: ChannelPe<T> = ProcessingElement::new(
        "PE_0_0",
        Ports {
          left_in: left_rx,
          up_in: up_rx,
          right_out: right_tx,
          down_out: down_tx,
          result_out: result_tx,
        },
      );

      let state = match self.config.step_mode {
        StepMode::Step => self.step_interactive(&mut pe)?,
        StepMode::Continuous => self.run_budgeted(&mut pe)?,
      };
      let steps = pe.steps();

      // Dropping the ports releases feeders and collectors that are still waiting
      let (ports, records) = pe.into_parts();
      drop(ports);

      let right = right_handle
        .join()
        .map_err(|_| io::Error::new(io::ErrorKind::Other, "right_out collector panicked"))?;
      let down = down_handle
        .join()
        .map_err(|_| io::Error::new(io::ErrorKind::Other, "down_out collector panicked"))?;

      Ok(SingleOutcome {
        result: result_rx.nb_read(),
        state,
        steps,
        right,
        down,
        records,
      })
    })
  }

  fn run_budgeted<T: Operand>(&self, pe: &mut ChannelPe<T>) -> Result<PeState> {
    if self.config.max_steps == 0 {
      pe.run().map_err(other_err)?;
      Ok(PeState::Drained)
    } else {
      pe.run_for(self.config.max_steps).map_err(other_err)
    }
  }

  fn step_interactive<T: Operand>(&self, pe: &mut ChannelPe<T>) -> Result<PeState> {
    println!("Step mode - Enter to step, 'si N' to step N times, 'c' to continue, 'q' to quit");
    let mut editor = shell::new_editor()?;
    loop {
      match shell::read_command(&mut editor)? {
        Command::Step(n) => {
          for _ in 0..n {
            if pe.step().map_err(other_err)? == PeState::Drained {
              break;
            }
          }
          print_pe_status(pe);
          if pe.is_drained() {
            return Ok(PeState::Drained);
          }
        },
        Command::Continue => {
          let state = self.run_budgeted(pe)?;
          print_pe_status(pe);
          return Ok(state);
        },
        Command::Quit => return Ok(pe.state()),
      }
    }
  }

  /// Run the `[mesh]` workload on a full array
  pub fn run_mesh<T: Operand>(&self) -> Result<MeshOutput<T>> {
    let section = self
      .app
      .mesh
      .as_ref()
      .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "no [mesh] section configured"))?;
    let [rows, cols] = section.dimensions;
    let convert = |m: &Vec<Vec<i64>>| -> Vec<Vec<T>> {
      m.iter()
        .map(|row| row.iter().map(|&v| T::from_i64_wrapping(v)).collect())
        .collect()
    };
    let a = convert(&section.a);
    let b = convert(&section.b);

    let mesh = Mesh::new(rows, cols, self.config.channel_capacity).map_err(other_err)?;
    let output = mesh.run(&a, &b).map_err(other_err)?;

    if output.result != reference_matmul(&a, &b) {
      warn!("mesh output differs from the reference product");
    }
    Ok(output)
  }
}

fn print_pe_status<T: Operand>(pe: &ChannelPe<T>) {
  let (left, up) = pe.slots();
  println!(
    "step {:>4} | state {:?} | left {:?} | up {:?} | pairs {} | acc {}",
    pe.steps(),
    pe.state(),
    left,
    up,
    pe.pairs(),
    pe.accumulator()
  );
}

fn format_stream<T: Operand>(packets: &[Packet<T>]) -> String {
  let items: Vec<String> = packets.iter().map(|p| p.to_string()).collect();
  format!("[{}]", items.join(", "))
}
