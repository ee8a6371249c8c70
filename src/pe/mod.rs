pub mod channel;
pub mod operand;
pub mod packet;
pub mod processing_element;

pub use channel::{channel, ChannelError, ChannelRx, ChannelTx, PacketSink, PacketSource};
pub use operand::Operand;
pub use packet::{stream, unframe, Packet, ResultPacket};
pub use processing_element::{ChannelPe, PeError, PeState, Ports, ProcessingElement, Slot};
