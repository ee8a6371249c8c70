use std::fs;
use std::path::PathBuf;
use syspe::pe::{stream, PeState, ResultPacket};
use syspe::simulator::config::config::{load_and_merge_configs, merge_config_str, CliOverrides};
use syspe::simulator::utils::log::init_log;
use syspe::simulator::Simulator;

fn temp_path(name: &str) -> PathBuf {
  std::env::temp_dir().join(format!("syspe-{}-{}", std::process::id(), name))
}

#[test]
fn single_pe_default_workload() {
  init_log(true);
  let config = load_and_merge_configs(None, &CliOverrides::default()).unwrap();
  let simulator = Simulator::from_app_config(&config, false).unwrap();

  let outcome = simulator.run_single::<i32>().unwrap();
  assert_eq!(outcome.result, Some(ResultPacket::terminal(32)));
  assert_eq!(outcome.state, PeState::Drained);
  assert_eq!(outcome.right, stream([1, 2, 3]));
  assert_eq!(outcome.down, stream([4, 5, 6]));
}

#[test]
fn single_pe_i8_override_wraps() {
  init_log(true);
  let cli = CliOverrides {
    width: Some("i8".to_string()),
    left: Some(vec![100]),
    up: Some(vec![100]),
    ..Default::default()
  };
  let config = load_and_merge_configs(None, &cli).unwrap();
  let simulator = Simulator::from_app_config(&config, false).unwrap();
  let outcome = simulator.run_single::<i8>().unwrap();
  assert_eq!(outcome.result, Some(ResultPacket::terminal(16)));
}

#[test]
fn single_pe_step_budget_reports_stall() {
  init_log(true);
  let cli = CliOverrides {
    left: Some(vec![2, 3]),
    up: Some(vec![5]),
    max_steps: Some(5_000),
    ..Default::default()
  };
  let config = load_and_merge_configs(None, &cli).unwrap();
  let simulator = Simulator::from_app_config(&config, false).unwrap();
  let outcome = simulator.run_single::<i32>().unwrap();

  assert_eq!(outcome.result, None);
  assert_ne!(outcome.state, PeState::Drained);
  assert_eq!(outcome.steps, 5_000);
  // Whatever was paired before the budget ran out went down in order
  assert!(stream([5]).starts_with(&outcome.down));
}

#[test]
fn mesh_from_config_file_with_trace() {
  init_log(true);
  let config_path = temp_path("mesh.toml");
  let trace_path = temp_path("mesh-trace.jsonl");
  fs::write(
    &config_path,
    format!(
      r#"
[pe]
channel_capacity = 1

[simulation]
trace_file = "{}"

[mesh]
dimensions = [2, 3]
a = [[1, 2], [3, 4]]
b = [[5, 6, 7], [8, 9, 10]]
"#,
      trace_path.display()
    ),
  )
  .unwrap();

  let config = load_and_merge_configs(Some(&config_path), &CliOverrides::default()).unwrap();
  let mut simulator = Simulator::from_app_config(&config, true).unwrap();
  let output = simulator.run_mesh::<i64>().unwrap();
  assert_eq!(output.result, vec![vec![21, 24, 27], vec![47, 54, 61]]);

  simulator.run().unwrap();
  let trace = fs::read_to_string(&trace_path).unwrap();
  let results = trace
    .lines()
    .map(|l| serde_json::from_str::<serde_json::Value>(l).unwrap())
    .filter(|v| v["action"] == "result")
    .count();
  assert_eq!(results, 6);

  let _ = fs::remove_file(&config_path);
  let _ = fs::remove_file(&trace_path);
}

#[test]
fn config_rejects_unknown_width() {
  let cli = CliOverrides {
    width: Some("f16".to_string()),
    ..Default::default()
  };
  assert!(load_and_merge_configs(None, &cli).is_err());
  assert!(merge_config_str("[pe]\nchannel_capacity = \"two\"\n", "test").is_err());
}
