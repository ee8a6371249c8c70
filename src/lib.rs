pub mod mesh;
pub mod pe;
pub mod simulator;

pub use pe::{Operand, Packet, PeState, ProcessingElement, ResultPacket};
pub use simulator::sim::mode::{OperandWidth, SimConfig};
pub use simulator::utils::log;
