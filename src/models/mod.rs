pub mod error;
pub mod op;
pub mod peer;
pub mod stroke;

pub use error::*;
pub use op::*;
pub use peer::*;
pub use stroke::*;
