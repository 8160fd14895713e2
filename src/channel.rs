//! Synchronous command/response engine.
//!
//! [`CommandChannel`] owns the transport and drives the instrument's
//! strictly half-duplex protocol: one command on the wire, then (for
//! queries) exactly one response frame off the wire before the next
//! command may be issued.
//!
//! Every operation takes `&mut self`, so at most one command can be
//! outstanding at a time: the invariant is enforced by the borrow
//! checker rather than a runtime flag. Issuing a second command while a
//! response is pending does not compile:
//!
//! ```compile_fail
//! use std::time::Duration;
//! use scopewire::{CommandChannel, ResponseMode};
//!
//! async fn overlap(channel: &mut CommandChannel) {
//!     let first = channel.execute("*IDN?", Duration::from_secs(1), ResponseMode::Auto);
//!     let second = channel.execute("*OPC?", Duration::from_secs(1), ResponseMode::Auto);
//!     let _ = tokio::join!(first, second);
//! }
//! ```
//!
//! Callers sharing one channel across tasks must add their own mutex
//! around the whole command/response exchange; the instrument protocol
//! has no multiplexing for the channel to exploit.

use std::time::Duration;

use bytes::Bytes;
use tokio::time::sleep;

use crate::config::ChannelConfig;
use crate::error::Result;
use crate::protocol::{read_block, read_text_line};
use crate::transport::TcpTransport;

/// Whether a command expects a one-line response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseMode {
    /// Expect a response iff the command text ends with `?`.
    ///
    /// This is the instrument catalogue's convention, not a protocol
    /// rule. A command ending in `?` that produces no response (or the
    /// reverse) will mis-frame every subsequent read; such commands must
    /// pass [`ResponseMode::Expected`] or [`ResponseMode::None`]
    /// explicitly.
    Auto,
    /// A one-line response will be read regardless of the command text.
    Expected,
    /// No response data is consumed; the pacing delay applies instead.
    None,
}

impl ResponseMode {
    fn expects_response(self, command: &str) -> bool {
        match self {
            Self::Auto => command.ends_with('?'),
            Self::Expected => true,
            Self::None => false,
        }
    }
}

/// Request/response engine over one instrument connection.
pub struct CommandChannel {
    transport: TcpTransport,
    config: ChannelConfig,
}

impl CommandChannel {
    /// Connect to the instrument and wrap the transport in a channel.
    pub async fn connect(addr: &str, config: ChannelConfig) -> Result<Self> {
        let transport = TcpTransport::connect(addr).await?;
        Ok(Self::from_transport(transport, config))
    }

    /// Wrap an already-connected transport.
    pub fn from_transport(transport: TcpTransport, config: ChannelConfig) -> Self {
        Self { transport, config }
    }

    /// The channel's configuration.
    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Send `command` and, per `mode`, read its one-line response.
    ///
    /// The command is written with a single `\n` appended. When no
    /// response is expected the configured pacing delay is awaited and
    /// `None` is returned without touching the receive buffer.
    pub async fn execute(
        &mut self,
        command: &str,
        timeout: Duration,
        mode: ResponseMode,
    ) -> Result<Option<String>> {
        self.write_command(command).await?;
        if mode.expects_response(command) {
            let response = read_text_line(self.transport.buffer(), timeout).await?;
            tracing::debug!(command, response = %response, "query complete");
            Ok(Some(response))
        } else {
            sleep(self.config.command_pacing).await;
            Ok(None)
        }
    }

    /// Send a query and return its response, using the default timeout.
    pub async fn query(&mut self, command: &str) -> Result<String> {
        self.write_command(command).await?;
        let response = read_text_line(self.transport.buffer(), self.config.command_timeout).await?;
        tracing::debug!(command, response = %response, "query complete");
        Ok(response)
    }

    /// Send a fire-and-forget command and await the pacing delay.
    pub async fn send(&mut self, command: &str) -> Result<()> {
        self.write_command(command).await?;
        sleep(self.config.command_pacing).await;
        Ok(())
    }

    /// Send a command whose reply is a definite-length binary block.
    pub async fn execute_block(&mut self, command: &str, timeout: Duration) -> Result<Bytes> {
        self.write_command(command).await?;
        sleep(self.config.command_pacing).await;
        read_block(self.transport.buffer(), timeout).await
    }

    /// Close the underlying transport. Idempotent.
    pub async fn close(&mut self) {
        self.transport.close().await;
    }

    async fn write_command(&mut self, command: &str) -> Result<()> {
        tracing::debug!(command, "sending");
        let mut wire = Vec::with_capacity(command.len() + 1);
        wire.extend_from_slice(command.as_bytes());
        wire.push(b'\n');
        self.transport.write(&wire).await
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    use super::*;
    use crate::error::ScopeError;

    const SHORT: Duration = Duration::from_millis(500);

    fn fast_config() -> ChannelConfig {
        ChannelConfig {
            command_timeout: SHORT,
            block_timeout: SHORT,
            command_pacing: Duration::from_millis(1),
        }
    }

    async fn connected_pair() -> (CommandChannel, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let channel = CommandChannel::connect(&addr, fast_config()).await.unwrap();
        let (peer, _) = listener.accept().await.unwrap();
        (channel, peer)
    }

    async fn expect_received(peer: &mut TcpStream, wanted: &[u8]) {
        let mut received = vec![0u8; wanted.len()];
        peer.read_exact(&mut received).await.unwrap();
        assert_eq!(received, wanted);
    }

    #[tokio::test]
    async fn test_query_round_trip() {
        let (mut channel, mut peer) = connected_pair().await;

        let instrument = tokio::spawn(async move {
            expect_received(&mut peer, b"*IDN?\n").await;
            peer.write_all(b"VENDOR,MODEL,SN123,1.00\n").await.unwrap();
            peer
        });

        let response = channel.query("*IDN?").await.unwrap();
        assert_eq!(response, "VENDOR,MODEL,SN123,1.00");
        instrument.await.unwrap();
    }

    #[tokio::test]
    async fn test_auto_mode_skips_response_for_plain_command() {
        let (mut channel, mut peer) = connected_pair().await;

        let result = channel.execute(":RUN", SHORT, ResponseMode::Auto).await;
        assert!(matches!(result, Ok(None)));

        expect_received(&mut peer, b":RUN\n").await;
    }

    #[tokio::test]
    async fn test_auto_mode_reads_response_for_question_mark() {
        let (mut channel, mut peer) = connected_pair().await;

        let instrument = tokio::spawn(async move {
            expect_received(&mut peer, b":TRIG:STAT?\n").await;
            peer.write_all(b"STOP\n").await.unwrap();
        });

        let result = channel
            .execute(":TRIG:STAT?", SHORT, ResponseMode::Auto)
            .await
            .unwrap();
        assert_eq!(result.as_deref(), Some("STOP"));
        instrument.await.unwrap();
    }

    #[tokio::test]
    async fn test_explicit_none_overrides_question_mark() {
        let (mut channel, mut peer) = connected_pair().await;

        // The block query must not consume its reply as a text line.
        let result = channel
            .execute(":DISPLAY:DATA? ON,OFF,PNG", SHORT, ResponseMode::None)
            .await;
        assert!(matches!(result, Ok(None)));

        expect_received(&mut peer, b":DISPLAY:DATA? ON,OFF,PNG\n").await;
    }

    #[tokio::test]
    async fn test_explicit_expected_reads_without_question_mark() {
        let (mut channel, mut peer) = connected_pair().await;

        let instrument = tokio::spawn(async move {
            expect_received(&mut peer, b"SYST:ERR\n").await;
            peer.write_all(b"0,\"No error\"\n").await.unwrap();
        });

        let result = channel
            .execute("SYST:ERR", SHORT, ResponseMode::Expected)
            .await
            .unwrap();
        assert_eq!(result.as_deref(), Some("0,\"No error\""));
        instrument.await.unwrap();
    }

    #[tokio::test]
    async fn test_execute_block_returns_payload() {
        let (mut channel, mut peer) = connected_pair().await;

        let instrument = tokio::spawn(async move {
            expect_received(&mut peer, b":DISPLAY:DATA? ON,OFF,PNG\n").await;
            peer.write_all(b"#14Wxyz").await.unwrap();
        });

        let payload = channel
            .execute_block(":DISPLAY:DATA? ON,OFF,PNG", SHORT)
            .await
            .unwrap();
        assert_eq!(&payload[..], b"Wxyz");
        instrument.await.unwrap();
    }

    #[tokio::test]
    async fn test_query_times_out_on_silent_instrument() {
        let (mut channel, _peer) = connected_pair().await;

        let err = channel.query("*IDN?").await.unwrap_err();
        assert!(matches!(err, ScopeError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_send_does_not_consume_pending_bytes() {
        let (mut channel, mut peer) = connected_pair().await;

        // Response to a previous exchange still in flight.
        peer.write_all(b"LEFTOVER\n").await.unwrap();
        channel.send(":STOP").await.unwrap();

        // The fire-and-forget command left the buffered line alone.
        let line = channel.query("*IDN?").await.unwrap();
        assert_eq!(line, "LEFTOVER");
    }
}
