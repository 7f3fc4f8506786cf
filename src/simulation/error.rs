use thiserror::Error;

#[derive(Error, Debug)]
pub enum GooError {
    #[error("failed to read or write file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to export snapshot: {0}")]
    Export(String),
    #[error("failed to parse configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("configuration has no attribute `{0}` to overwrite")]
    UnknownAttribute(String),
    #[error("invalid simulation parameters: {0}")]
    InvalidParams(String),
    #[error("collider {0} does not exist")]
    UnknownCollider(usize),
    #[error("collider transform is not invertible")]
    SingularTransform,
    #[error("collider mesh has no triangles")]
    EmptyCollider,
    #[error("triangle {triangle} references vertex {vertex} but the mesh only has {num_vertices} vertices")]
    VertexOutOfRange {
        triangle: usize,
        vertex: u32,
        num_vertices: usize,
    },
}

pub type Result<T> = std::result::Result<T, GooError>;
