use clap::Parser;
use std::path::PathBuf;
use syspe::simulator::config::config::{load_and_merge_configs, CliOverrides};
use syspe::simulator::utils::log::init_log;
use syspe::simulator::Simulator;

/// pe-sim - streaming systolic processing element simulator
#[derive(Parser, Debug)]
#[command(name = "pe-sim")]
#[command(version = "0.1.0")]
#[command(about = "Run one systolic PE, or a full array, on streamed operands", long_about = None)]
struct Args {
  /// Custom config file (TOML), merged over the built-in defaults
  #[arg(short, long, value_name = "FILE")]
  config: Option<PathBuf>,

  /// Left input stream, comma separated
  #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
  left: Option<Vec<i64>>,

  /// Up input stream, comma separated
  #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
  up: Option<Vec<i64>>,

  /// Operand width: i8, i16, i32 or i64
  #[arg(short, long, value_name = "WIDTH")]
  width: Option<String>,

  /// In-flight capacity of every channel
  #[arg(long, value_name = "N")]
  capacity: Option<usize>,

  /// Stop polling after N iterations (0 = until drained)
  #[arg(long, value_name = "N")]
  max_steps: Option<u64>,

  /// Enable step mode (interactive stepping)
  #[arg(short, long)]
  step: bool,

  /// Quiet mode (suppress log messages)
  #[arg(short, long)]
  quiet: bool,

  /// Output trace file path
  #[arg(long, value_name = "FILE")]
  trace_file: Option<String>,

  /// Run the [mesh] workload from the config as a full array
  #[arg(long)]
  mesh: bool,
}

fn main() -> std::io::Result<()> {
  let args = Args::parse();

  let cli = CliOverrides {
    quiet: args.quiet,
    step: args.step,
    trace_file: args.trace_file,
    width: args.width,
    channel_capacity: args.capacity,
    max_steps: args.max_steps,
    left: args.left,
    up: args.up,
  };

  let app_config = load_and_merge_configs(args.config.as_deref(), &cli)?;
  init_log(app_config.simulation.quiet);

  let mut simulator = Simulator::from_app_config(&app_config, args.mesh)?;
  simulator.run()
}
