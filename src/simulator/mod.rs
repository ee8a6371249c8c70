pub mod config;
pub mod sim;
pub mod simulator;
pub mod utils;

pub use simulator::{SingleOutcome, Simulator};
pub use utils::log;
