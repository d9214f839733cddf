//! Garment mockup CLI tool
//!
//! Recolors the shirt in a model photo and places a design on it.

#[cfg(feature = "cli")]
use garment_mockup::cli;

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::main().await
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature not enabled. Please rebuild with --features cli");
    std::process::exit(1);
}
