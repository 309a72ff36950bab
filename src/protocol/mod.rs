pub mod node;
pub mod path;

pub use node::{Node, Payload, Scalar};
pub use path::{assert_path, child_value, resolve_path, NodePath, Resolved};
