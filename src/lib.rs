//! # scopewire
//!
//! Remote control of bench oscilloscopes over a TCP socket: SCPI text
//! commands, TMC definite-length binary blocks, and chunked retrieval of
//! bulk waveform data.
//!
//! ## Architecture
//!
//! - **Transport** (`transport`): owns the socket; one background task
//!   pumps inbound bytes into a shared buffer, writes happen inline.
//! - **Protocol** (`protocol`): the shared [`StreamBuffer`] and the two
//!   frame decoders, newline-terminated text lines and `#`-prefixed
//!   definite-length blocks.
//! - **Channel** (`CommandChannel`): strictly half-duplex command/
//!   response engine; one command in flight, enforced at compile time.
//! - **Transfer** (`transfer`): bounded-window bulk retrieval with
//!   configurable pacing.
//! - **Instrument** (`instrument`): the SCPI-aware driver facade.
//! - **Capture** (`capture`): content-addressed storage records for
//!   retrieved payloads.
//!
//! ## Example
//!
//! ```ignore
//! use scopewire::{ImageFormat, Oscilloscope};
//!
//! #[tokio::main]
//! async fn main() -> scopewire::Result<()> {
//!     let mut scope = Oscilloscope::connect("scope.lan").await?;
//!     let identity = scope.identify().await?;
//!     println!("connected to {} {}", identity.vendor, identity.device);
//!
//!     let screenshot = scope.display_data(ImageFormat::Png).await?;
//!     std::fs::write("screen.png", &screenshot).unwrap();
//!     scope.close().await;
//!     Ok(())
//! }
//! ```

pub mod capture;
pub mod config;
pub mod error;
pub mod instrument;
pub mod protocol;
pub mod transfer;
pub mod transport;

mod channel;

pub use channel::{CommandChannel, ResponseMode};
pub use config::{ChannelConfig, TransferOptions};
pub use error::{Result, ScopeError};
pub use instrument::{Identity, ImageFormat, Oscilloscope};
pub use protocol::StreamBuffer;
pub use transport::TcpTransport;
