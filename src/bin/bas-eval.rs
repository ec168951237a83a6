//! Boundary Adherence CLI Tool
//!
//! Scores how well edges in generated images follow ground-truth region
//! boundaries, per pair and across a batch.

#[cfg(feature = "cli")]
use boundary_adherence::cli;

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
