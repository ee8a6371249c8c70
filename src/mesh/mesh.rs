// Host-side harness: wires a rows x cols grid of PEs, feeds the border
// streams and assembles the per-PE results into the output matrix.
//
// Layout (PE_i_j sits at row i, column j):
//
//            up[0]     up[1]
//              |         |
//   left[0] -> PE_0_0 -> PE_0_1 -> right[0]
//              |         |
//   left[1] -> PE_1_0 -> PE_1_1 -> right[1]
//              |         |
//            down[0]   down[1]

use log::{debug, info};
use std::thread;
use thiserror::Error;

use crate::pe::{
  channel, ChannelPe, ChannelRx, ChannelTx, Operand, Packet, PacketSink, PeError, Ports, ProcessingElement, ResultPacket,
};
use crate::simulator::sim::records::PeRecord;

#[derive(Debug, Error)]
pub enum MeshError {
  #[error("mesh dimensions must be non-zero, got {rows}x{cols}")]
  EmptyMesh { rows: usize, cols: usize },
  #[error("operand shape mismatch: {0}")]
  Shape(String),
  #[error(transparent)]
  Pe(#[from] PeError),
  #[error("failed to spawn {name}: {source}")]
  Spawn {
    name: String,
    #[source]
    source: std::io::Error,
  },
  #[error("worker thread {0} panicked")]
  WorkerPanic(String),
  #[error("{0} finished without delivering a result")]
  MissingResult(String),
}

/// Everything observable at the array boundary after a run
#[derive(Debug, Clone)]
pub struct MeshOutput<T> {
  /// `result[i][j]` is the value emitted by PE_i_j
  pub result: Vec<Vec<T>>,
  /// Stream leaving the right edge of each row
  pub right_edge: Vec<Vec<Packet<T>>>,
  /// Stream leaving the bottom edge of each column
  pub down_edge: Vec<Vec<Packet<T>>>,
  /// Activity log of each PE, in row-major order
  pub records: Vec<(String, Vec<PeRecord>)>,
}

pub fn pe_name(row: usize, col: usize) -> String {
  format!("PE_{}_{}", row, col)
}

/// Flat result port index of PE_i_j
pub fn result_index(row: usize, col: usize, cols: usize) -> usize {
  row * cols + col
}

/// Plain wrapping matrix product, used to check mesh output
pub fn reference_matmul<T: Operand>(a: &[Vec<T>], b: &[Vec<T>]) -> Vec<Vec<T>> {
  let cols = b.first().map_or(0, |row| row.len());
  a.iter()
    .map(|a_row| {
      (0..cols)
        .map(|j| a_row.iter().zip(b).fold(T::zero(), |acc, (&x, b_row)| T::mac(acc, x, b_row[j])))
        .collect()
    })
    .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mesh {
  rows: usize,
  cols: usize,
  capacity: usize,
}

impl Mesh {
  pub fn new(rows: usize, cols: usize, capacity: usize) -> Result<Self, MeshError> {
    if rows == 0 || cols == 0 {
      return Err(MeshError::EmptyMesh { rows, cols });
    }
    Ok(Self {
      rows,
      cols,
      capacity: capacity.max(1),
    })
  }

  pub fn rows(&self) -> usize {
    self.rows
  }

  pub fn cols(&self) -> usize {
    self.cols
  }

  fn check_shapes<T>(&self, a: &[Vec<T>], b: &[Vec<T>]) -> Result<usize, MeshError> {
    if a.len() != self.rows {
      return Err(MeshError::Shape(format!("A has {} rows, mesh has {}", a.len(), self.rows)));
    }
    let k = b.len();
    if let Some(row) = a.iter().position(|r| r.len() != k) {
      return Err(MeshError::Shape(format!(
        "A row {} has {} columns but B has {} rows",
        row,
        a[row].len(),
        k
      )));
    }
    if let Some(row) = b.iter().position(|r| r.len() != self.cols) {
      return Err(MeshError::Shape(format!(
        "B row {} has {} columns, mesh has {}",
        row,
        b[row].len(),
        self.cols
      )));
    }
    Ok(k)
  }

  /// Stream A (rows x K) in from the left and B (K x cols) in from the top.
  ///
  /// Every PE, border feeder and edge collector runs on its own thread; the
  /// call returns once all of them have finished.
  pub fn run<T: Operand>(&self, a: &[Vec<T>], b: &[Vec<T>]) -> Result<MeshOutput<T>, MeshError> {
    let k = self.check_shapes(a, b)?;
    let (rows, cols) = (self.rows, self.cols);
    info!("mesh {}x{}: streaming K={} (channel capacity {})", rows, cols, k, self.capacity);

    // horizontal[i][j] feeds PE_i_j from the left; horizontal[i][cols] is the right edge
    let mut horizontal_tx: Vec<Vec<Option<ChannelTx<Packet<T>>>>> = Vec::with_capacity(rows);
    let mut horizontal_rx: Vec<Vec<Option<ChannelRx<Packet<T>>>>> = Vec::with_capacity(rows);
    for _ in 0..rows {
      let (txs, rxs): (Vec<_>, Vec<_>) = (0..=cols)
        .map(|_| {
          let (tx, rx) = channel(self.capacity);
          (Some(tx), Some(rx))
        })
        .unzip();
      horizontal_tx.push(txs);
      horizontal_rx.push(rxs);
    }

    // vertical[i][j] feeds PE_i_j from above; vertical[rows][j] is the bottom edge
    let mut vertical_tx: Vec<Vec<Option<ChannelTx<Packet<T>>>>> = Vec::with_capacity(rows + 1);
    let mut vertical_rx: Vec<Vec<Option<ChannelRx<Packet<T>>>>> = Vec::with_capacity(rows + 1);
    for _ in 0..=rows {
      let (txs, rxs): (Vec<_>, Vec<_>) = (0..cols)
        .map(|_| {
          let (tx, rx) = channel(self.capacity);
          (Some(tx), Some(rx))
        })
        .unzip();
      vertical_tx.push(txs);
      vertical_rx.push(rxs);
    }

    let mut result_rx: Vec<ChannelRx<ResultPacket<T>>> = Vec::with_capacity(rows * cols);

    thread::scope(|s| -> Result<MeshOutput<T>, MeshError> {
      let mut pe_handles = Vec::with_capacity(rows * cols);

      for i in 0..rows {
        for j in 0..cols {
          let name = pe_name(i, j);
          let (result_tx, rx) = channel(1);
          result_rx.push(rx);

          let ports = Ports {
            left_in: take(&mut horizontal_rx[i][j]),
            up_in: take(&mut vertical_rx[i][j]),
            right_out: take(&mut horizontal_tx[i][j + 1]),
            down_out: take(&mut vertical_tx[i + 1][j]),
            result_out: result_tx,
          };
          debug!("wired {}", name);

          let thread_name = name.clone();
          let handle = thread::Builder::new()
            .name(name.clone())
            .spawn_scoped(s, move || {
              let mut pe: ChannelPe<T> = ProcessingElement::new(thread_name, ports);
              pe.run().map(|_| pe.into_parts().1)
            })
            .map_err(|source| MeshError::Spawn {
              name: name.clone(),
              source,
            })?;
          pe_handles.push((name, handle));
        }
      }

      // Border feeders
      for (i, a_row) in a.iter().enumerate() {
        let tx = take(&mut horizontal_tx[i][0]);
        s.spawn(move || feed(tx, a_row.iter().copied()));
      }
      for j in 0..cols {
        let tx = take(&mut vertical_tx[0][j]);
        s.spawn(move || feed(tx, b.iter().map(|row| row[j])));
      }

      // Edge collectors
      let right_handles: Vec<_> = (0..rows)
        .map(|i| {
          let rx = take(&mut horizontal_rx[i][cols]);
          s.spawn(move || collect(rx))
        })
        .collect();
      let down_handles: Vec<_> = (0..cols)
        .map(|j| {
          let rx = take(&mut vertical_rx[rows][j]);
          s.spawn(move || collect(rx))
        })
        .collect();

      let mut records = Vec::with_capacity(rows * cols);
      for (name, handle) in pe_handles {
        let outcome = handle.join().map_err(|_| MeshError::WorkerPanic(name.clone()))?;
        records.push((name, outcome?));
      }

      let right_edge = join_all(right_handles, "right edge collector")?;
      let down_edge = join_all(down_handles, "down edge collector")?;

      let mut result = vec![Vec::with_capacity(cols); rows];
      for i in 0..rows {
        for j in 0..cols {
          let packet = result_rx[result_index(i, j, cols)]
            .recv()
            .ok_or_else(|| MeshError::MissingResult(pe_name(i, j)))?;
          result[i].push(packet.value);
        }
      }

      info!("mesh {}x{}: all PEs drained", rows, cols);
      Ok(MeshOutput {
        result,
        right_edge,
        down_edge,
        records,
      })
    })
  }
}

fn take<C>(slot: &mut Option<C>) -> C {
  // Each channel end is handed out exactly once by construction
  slot.take().expect("channel end already taken")
}

/// Push a whole border stream; stops quietly if the consumer went away
pub fn feed<T: Operand>(mut tx: ChannelTx<Packet<T>>, values: impl Iterator<Item = T>) {
  for value in values {
    if tx.write(Packet::Data(value)).is_err() {
      return;
    }
  }
  let _ = tx.write(Packet::End);
}

/// Drain an edge stream up to and including its `End`
pub fn collect<T: Operand>(rx: ChannelRx<Packet<T>>) -> Vec<Packet<T>> {
  let mut packets = Vec::new();
  while let Some(packet) = rx.recv() {
    let done = packet.is_end();
    packets.push(packet);
    if done {
      break;
    }
  }
  packets
}

fn join_all<R>(handles: Vec<thread::ScopedJoinHandle<'_, R>>, what: &str) -> Result<Vec<R>, MeshError> {
  handles
    .into_iter()
    .enumerate()
    .map(|(idx, h)| h.join().map_err(|_| MeshError::WorkerPanic(format!("{} {}", what, idx))))
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_reference_matmul() {
    let a = vec![vec![1, 2], vec![3, 4]];
    let b = vec![vec![5, 6], vec![7, 8]];
    assert_eq!(reference_matmul(&a, &b), vec![vec![19, 22], vec![43, 50]]);
  }

  #[test]
  fn test_result_index() {
    assert_eq!(result_index(0, 0, 3), 0);
    assert_eq!(result_index(1, 2, 3), 5);
    assert_eq!(pe_name(1, 2), "PE_1_2");
  }

  #[test]
  fn test_mesh_rejects_bad_shapes() {
    assert!(matches!(Mesh::new(0, 2, 1), Err(MeshError::EmptyMesh { rows: 0, cols: 2 })));

    let mesh = Mesh::new(2, 2, 1).unwrap();
    let a = vec![vec![1, 2], vec![3]];
    let b = vec![vec![1, 2], vec![3, 4]];
    assert!(matches!(mesh.run(&a, &b), Err(MeshError::Shape(_))));
  }

  #[test]
  fn test_mesh_2x2() {
    let mesh = Mesh::new(2, 2, 2).unwrap();
    let a = vec![vec![1, 2], vec![3, 4]];
    let b = vec![vec![5, 6], vec![7, 8]];
    let out = mesh.run(&a, &b).unwrap();
    assert_eq!(out.result, vec![vec![19, 22], vec![43, 50]]);
    assert_eq!(out.right_edge[1], crate::pe::stream([3, 4]));
    assert_eq!(out.down_edge[0], crate::pe::stream([5, 7]));
    assert_eq!(out.records.len(), 4);
    assert_eq!(out.records[3].0, "PE_1_1");
  }
}
