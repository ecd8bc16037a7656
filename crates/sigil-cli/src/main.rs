//! Sigil command-line binary.
//!
//! # Usage
//!
//! ```bash
//! # Generate a key pair
//! sigil keygen --user-id "Alice <alice@example.org>" -o alice.sec.asc --public-output alice.asc
//!
//! # Encrypt to a recipient and a passphrase, signed by Alice
//! sigil encrypt -r bob.asc -p "shared secret" --sign-key alice.sec.asc --armor note.txt -o note.asc
//!
//! # Decrypt, checking signatures against Alice's public key
//! sigil decrypt -k bob.sec.asc --verify-key alice.asc note.asc
//!
//! # Describe what a file contains
//! sigil inspect note.asc
//! ```

use clap::Parser;
use sigil_cli::{Args, run};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer().with_writer(std::io::stderr)).with(filter).init();

    run(args.command).await?;

    Ok(())
}
