pub mod error;
pub mod types;
pub mod value;

pub use error::{Result, TopologyError, WireError};
pub use types::*;
pub use value::Value;
