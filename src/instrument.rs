//! Semantic driver facade for the oscilloscope.
//!
//! The only module that knows SCPI command spellings. The channel,
//! framing and transport layers below it move opaque command text and
//! frames; everything above it works with typed results.

use bytes::Bytes;

use crate::channel::CommandChannel;
use crate::config::{ChannelConfig, TransferOptions};
use crate::error::{Result, ScopeError};
use crate::transfer::{fetch_chunked, WindowCommands};

/// Instrument identity from the `*IDN?` query.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Identity {
    pub vendor: String,
    pub device: String,
    pub serial: String,
    pub fw_version: String,
}

impl Identity {
    /// Parse the 4-field comma-separated `*IDN?` response.
    pub fn parse(response: &str) -> Result<Self> {
        let fields: Vec<&str> = response.split(',').collect();
        match fields.as_slice() {
            [vendor, device, serial, fw_version] => Ok(Self {
                vendor: (*vendor).to_owned(),
                device: (*device).to_owned(),
                serial: (*serial).to_owned(),
                fw_version: (*fw_version).to_owned(),
            }),
            _ => Err(ScopeError::UnexpectedResponse(format!(
                "*IDN? returned {} fields, expected 4: {response:?}",
                fields.len()
            ))),
        }
    }
}

/// Hardcopy image format for `:DISPLAY:DATA?`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Bmp24,
    Bmp8,
    Png,
    Jpeg,
    Tiff,
}

impl ImageFormat {
    /// The spelling the instrument expects in the command.
    pub fn as_scpi(self) -> &'static str {
        match self {
            Self::Bmp24 => "BMP24",
            Self::Bmp8 => "BMP8",
            Self::Png => "PNG",
            Self::Jpeg => "JPEG",
            Self::Tiff => "TIFF",
        }
    }

    /// Conventional file extension for saved hardcopies.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Bmp24 | Self::Bmp8 => "bmp",
            Self::Png => "png",
            Self::Jpeg => "jpeg",
            Self::Tiff => "tiff",
        }
    }
}

/// Scaling metadata from the `:WAV:PRE?` query.
///
/// Sample values are mapped to volts/seconds with the increment, origin
/// and reference fields; the storage layer records this next to the raw
/// samples so captures remain interpretable offline.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct WaveformPreamble {
    /// 0 = BYTE, 1 = WORD, 2 = ASCii.
    pub format: u8,
    /// 0 = NORMal, 1 = MAXimum, 2 = RAW.
    pub mode: u8,
    /// Points in the selected record.
    pub points: u64,
    /// Averaging count.
    pub averages: u32,
    pub x_increment: f64,
    pub x_origin: f64,
    pub x_reference: f64,
    pub y_increment: f64,
    pub y_origin: f64,
    pub y_reference: f64,
}

impl WaveformPreamble {
    /// Parse the 10-field comma-separated `:WAV:PRE?` response.
    pub fn parse(response: &str) -> Result<Self> {
        let fields: Vec<&str> = response.split(',').collect();
        if fields.len() != 10 {
            return Err(ScopeError::UnexpectedResponse(format!(
                ":WAV:PRE? returned {} fields, expected 10: {response:?}",
                fields.len()
            )));
        }
        let bad = |field: &str| {
            ScopeError::UnexpectedResponse(format!(":WAV:PRE? field not numeric: {field:?}"))
        };
        Ok(Self {
            format: fields[0].parse().map_err(|_| bad(fields[0]))?,
            mode: fields[1].parse().map_err(|_| bad(fields[1]))?,
            points: fields[2].parse().map_err(|_| bad(fields[2]))?,
            averages: fields[3].parse().map_err(|_| bad(fields[3]))?,
            x_increment: fields[4].parse().map_err(|_| bad(fields[4]))?,
            x_origin: fields[5].parse().map_err(|_| bad(fields[5]))?,
            x_reference: fields[6].parse().map_err(|_| bad(fields[6]))?,
            y_increment: fields[7].parse().map_err(|_| bad(fields[7]))?,
            y_origin: fields[8].parse().map_err(|_| bad(fields[8]))?,
            y_reference: fields[9].parse().map_err(|_| bad(fields[9]))?,
        })
    }
}

/// High-level driver over one command channel.
pub struct Oscilloscope {
    channel: CommandChannel,
}

impl Oscilloscope {
    /// Connect with the default channel configuration.
    pub async fn connect(addr: &str) -> Result<Self> {
        let channel = CommandChannel::connect(addr, ChannelConfig::default()).await?;
        Ok(Self::from_channel(channel))
    }

    /// Wrap an existing channel.
    pub fn from_channel(channel: CommandChannel) -> Self {
        Self { channel }
    }

    /// The underlying channel, for catalogue commands without a wrapper.
    pub fn channel_mut(&mut self) -> &mut CommandChannel {
        &mut self.channel
    }

    /// Query and parse the instrument identity.
    pub async fn identify(&mut self) -> Result<Identity> {
        let response = self.channel.query("*IDN?").await?;
        Identity::parse(&response)
    }

    /// Start acquisition.
    pub async fn run(&mut self) -> Result<()> {
        self.channel.send(":RUN").await
    }

    /// Stop acquisition.
    pub async fn stop(&mut self) -> Result<()> {
        self.channel.send(":STOP").await
    }

    /// Fetch a display hardcopy in the given image format.
    pub async fn display_data(&mut self, format: ImageFormat) -> Result<Bytes> {
        // color ON, invert OFF, then the format spelling
        let command = format!(":DISPLAY:DATA? ON,OFF,{}", format.as_scpi());
        let timeout = self.channel.config().block_timeout;
        self.channel.execute_block(&command, timeout).await
    }

    /// Query the configured memory depth in points.
    pub async fn memory_depth(&mut self) -> Result<u64> {
        let response = self.channel.query(":ACQ:MDEP?").await?;
        response.trim().parse().map_err(|_| {
            ScopeError::UnexpectedResponse(format!(":ACQ:MDEP? not numeric: {response:?}"))
        })
    }

    /// Query waveform scaling metadata for the currently selected source.
    pub async fn waveform_preamble(&mut self) -> Result<WaveformPreamble> {
        let response = self.channel.query(":WAV:PRE?").await?;
        WaveformPreamble::parse(&response)
    }

    /// Read the full raw sample record of an analog channel.
    ///
    /// Selects the source, switches to raw byte readout, then retrieves
    /// the record in bounded windows. The preamble's point count decides
    /// the transfer size; its scaling fields are returned alongside the
    /// samples. Acquisition must be stopped for raw mode readout.
    pub async fn waveform_raw(
        &mut self,
        channel_index: u8,
        options: &TransferOptions,
    ) -> Result<(WaveformPreamble, Vec<u8>)> {
        self.channel
            .send(&format!(":WAV:SOUR CHAN{channel_index}"))
            .await?;
        self.channel.send(":WAV:MODE RAW").await?;
        self.channel.send(":WAV:FORM BYTE").await?;

        let preamble = self.waveform_preamble().await?;
        let samples = fetch_chunked(&mut self.channel, preamble.points, options, |window| {
            WindowCommands {
                set_start: format!(":WAV:STAR {}", window.start),
                set_stop: format!(":WAV:STOP {}", window.stop),
                fetch: ":WAV:DATA?".to_owned(),
            }
        })
        .await?;
        Ok((preamble, samples))
    }

    /// Close the underlying transport. Idempotent.
    pub async fn close(&mut self) {
        self.channel.close().await;
    }
}
