pub mod mesh;

pub use mesh::{collect, feed, pe_name, reference_matmul, result_index, Mesh, MeshError, MeshOutput};
