pub mod discovery;
pub mod ip;
pub mod transport;

pub use discovery::*;
pub use ip::*;
pub use transport::*;
