//! Socket transport to the instrument.

mod tcp;

pub use tcp::{TcpTransport, DEFAULT_PORT};
