use syspe::mesh::{reference_matmul, Mesh, MeshError};
use syspe::pe::{stream, unframe};

fn matrix(rows: usize, cols: usize, seed: i64) -> Vec<Vec<i64>> {
  (0..rows)
    .map(|i| (0..cols).map(|j| ((i as i64 * 7 + j as i64 * 3 + seed) % 11) - 5).collect())
    .collect()
}

#[test]
fn mesh_3x4_matches_reference() {
  let a = matrix(3, 5, 1);
  let b = matrix(5, 4, 2);
  let mesh = Mesh::new(3, 4, 1).unwrap();
  let out = mesh.run(&a, &b).unwrap();

  assert_eq!(out.result, reference_matmul(&a, &b));
  assert_eq!(out.result.len(), 3);
  assert!(out.result.iter().all(|row| row.len() == 4));
}

#[test]
fn mesh_edges_reproduce_border_streams() {
  let a = matrix(2, 3, 4);
  let b = matrix(3, 3, 5);
  let mesh = Mesh::new(2, 3, 2).unwrap();
  let out = mesh.run(&a, &b).unwrap();

  for (i, row) in a.iter().enumerate() {
    assert_eq!(out.right_edge[i], stream(row.iter().copied()));
  }
  for j in 0..3 {
    let column: Vec<i64> = b.iter().map(|row| row[j]).collect();
    assert_eq!(unframe(&out.down_edge[j]), Some(column));
  }
}

#[test]
fn mesh_wraps_like_reference_for_i8() {
  let a: Vec<Vec<i8>> = vec![vec![100, 90], vec![-128, 127]];
  let b: Vec<Vec<i8>> = vec![vec![100, -3], vec![77, 127]];
  let mesh = Mesh::new(2, 2, 1).unwrap();
  let out = mesh.run(&a, &b).unwrap();
  assert_eq!(out.result, reference_matmul(&a, &b));
  // 100*100 + 90*77 = 16930 -> 16930 mod 256 = 34
  assert_eq!(out.result[0][0], 34);
}

#[test]
fn mesh_zero_inner_dimension() {
  let a: Vec<Vec<i32>> = vec![vec![], vec![]];
  let b: Vec<Vec<i32>> = vec![];
  let mesh = Mesh::new(2, 1, 1).unwrap();
  // Every border stream is a bare End, so each PE drains with an empty sum
  let out = mesh.run(&a, &b).unwrap();
  assert_eq!(out.result, vec![vec![0], vec![0]]);
  assert!(out.right_edge.iter().all(|s| s == &stream(Vec::<i32>::new())));
}

#[test]
fn mesh_single_pe() {
  let mesh = Mesh::new(1, 1, 1).unwrap();
  let out = mesh.run(&[vec![1, 2, 3]], &[vec![4], vec![5], vec![6]]).unwrap();
  assert_eq!(out.result, vec![vec![32]]);
  assert_eq!(out.records.len(), 1);
  assert_eq!(out.records[0].0, "PE_0_0");
  assert_eq!(out.records[0].1.last().map(|r| r.action.as_str()), Some("result"));
}

#[test]
fn mesh_shape_errors() {
  let mesh = Mesh::new(2, 2, 1).unwrap();
  let a = vec![vec![1, 2]];
  let b = vec![vec![1, 2], vec![3, 4]];
  assert!(matches!(mesh.run(&a, &b), Err(MeshError::Shape(_))));

  let a = vec![vec![1, 2], vec![3, 4]];
  let b = vec![vec![1, 2, 3], vec![3, 4, 5]];
  assert!(matches!(mesh.run(&a, &b), Err(MeshError::Shape(_))));
}
