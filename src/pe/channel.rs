// Point-to-point packet channels between neighbouring PEs

use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, SyncSender, TryRecvError};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ChannelError {
  #[error("channel disconnected: consumer was dropped")]
  Disconnected,
}

/// Consumer side of a port. Never blocks.
pub trait PacketSource<P> {
  /// Return the next packet if one is available, `None` otherwise
  fn nb_read(&mut self) -> Option<P>;
}

/// Producer side of a port. May block until the consumer has room.
pub trait PacketSink<P> {
  fn write(&mut self, packet: P) -> Result<(), ChannelError>;
}

/// Sending half of a bounded channel
#[derive(Debug)]
pub struct ChannelTx<P> {
  inner: SyncSender<P>,
}

/// Receiving half of a bounded channel
#[derive(Debug)]
pub struct ChannelRx<P> {
  inner: Receiver<P>,
}

/// Create a bounded SPSC channel holding at most `capacity` packets in flight.
///
/// A capacity of zero is raised to one so that a single write can always
/// complete without a waiting reader.
pub fn channel<P>(capacity: usize) -> (ChannelTx<P>, ChannelRx<P>) {
  let (tx, rx) = mpsc::sync_channel(capacity.max(1));
  (ChannelTx { inner: tx }, ChannelRx { inner: rx })
}

impl<P> PacketSink<P> for ChannelTx<P> {
  fn write(&mut self, packet: P) -> Result<(), ChannelError> {
    self.inner.send(packet).map_err(|_| ChannelError::Disconnected)
  }
}

impl<P> PacketSource<P> for ChannelRx<P> {
  fn nb_read(&mut self) -> Option<P> {
    match self.inner.try_recv() {
      Ok(packet) => Some(packet),
      // A vanished producer looks exactly like a silent one
      Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
    }
  }
}

impl<P> ChannelRx<P> {
  /// Blocking receive for host-side collectors. `None` once the producer is gone.
  pub fn recv(&self) -> Option<P> {
    self.inner.recv().ok()
  }

  /// Take everything currently queued without waiting
  pub fn drain(&self) -> Vec<P> {
    self.inner.try_iter().collect()
  }
}

// In-memory ports for single-threaded, deterministic stepping

impl<P> PacketSource<P> for VecDeque<P> {
  fn nb_read(&mut self) -> Option<P> {
    self.pop_front()
  }
}

impl<P> PacketSink<P> for Vec<P> {
  fn write(&mut self, packet: P) -> Result<(), ChannelError> {
    self.push(packet);
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_channel_order_and_nb_read() {
    let (mut tx, mut rx) = channel::<u32>(4);
    assert_eq!(rx.nb_read(), None);

    tx.write(1).unwrap();
    tx.write(2).unwrap();
    tx.write(3).unwrap();
    assert_eq!(rx.nb_read(), Some(1));
    assert_eq!(rx.drain(), vec![2, 3]);
    assert_eq!(rx.nb_read(), None);
  }

  #[test]
  fn test_disconnected_ends() {
    let (mut tx, rx) = channel::<u32>(1);
    drop(rx);
    assert_eq!(tx.write(5), Err(ChannelError::Disconnected));

    let (tx, mut rx) = channel::<u32>(1);
    drop(tx);
    assert_eq!(rx.nb_read(), None);
    assert_eq!(rx.recv(), None);
  }

  #[test]
  fn test_zero_capacity_is_raised() {
    let (mut tx, mut rx) = channel::<u8>(0);
    tx.write(9).unwrap();
    assert_eq!(rx.nb_read(), Some(9));
  }

  #[test]
  fn test_in_memory_ports() {
    let mut src: VecDeque<i32> = VecDeque::from(vec![4, 5]);
    assert_eq!(src.nb_read(), Some(4));
    assert_eq!(src.nb_read(), Some(5));
    assert_eq!(src.nb_read(), None);

    let mut sink: Vec<i32> = Vec::new();
    sink.write(6).unwrap();
    assert_eq!(sink, vec![6]);
  }
}
