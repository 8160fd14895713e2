//! Hardcopy: fetch a display screenshot and store it as a capture file.
//!
//! ```sh
//! cargo run --example hardcopy -- 192.168.1.50 capture.json
//! ```
//!
//! The screenshot travels as a definite-length binary block and is
//! persisted inline (gzip + base64) with its SHA-256 recorded.

use scopewire::capture::{BlobRecord, CaptureFile};
use scopewire::{ImageFormat, Oscilloscope};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let addr = args.next().ok_or("usage: hardcopy <host[:port]> <output.json>")?;
    let output = args.next().ok_or("usage: hardcopy <host[:port]> <output.json>")?;

    let mut scope = Oscilloscope::connect(&addr).await?;
    let identity = scope.identify().await?;
    let screenshot = scope.display_data(ImageFormat::Png).await?;
    scope.close().await;

    let mut capture = CaptureFile::new(&addr);
    capture.set_instrument(identity);
    capture.add_blob(
        "hardcopy1",
        BlobRecord::inline(
            &screenshot,
            "png",
            Some(serde_json::json!({"type": "hardcopy"})),
        )?,
    );

    std::fs::write(&output, capture.to_json_pretty()?)?;
    println!("wrote {} ({} byte screenshot)", output, screenshot.len());
    Ok(())
}
