//! Identify: connect to an instrument and print its identity.
//!
//! ```sh
//! cargo run --example identify -- 192.168.1.50
//! ```
//!
//! The port defaults to the instrument's SCPI socket service (5555).

use scopewire::Oscilloscope;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let addr = std::env::args()
        .nth(1)
        .ok_or("usage: identify <host[:port]>")?;

    let mut scope = Oscilloscope::connect(&addr).await?;
    let identity = scope.identify().await?;

    println!("vendor:   {}", identity.vendor);
    println!("device:   {}", identity.device);
    println!("serial:   {}", identity.serial);
    println!("firmware: {}", identity.fw_version);

    scope.close().await;
    Ok(())
}
