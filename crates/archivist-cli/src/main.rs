#![forbid(unsafe_code)]
#![deny(unused_must_use, missing_docs)]

//! Binary entrypoint for the Archivist companion client.

#[tokio::main]
async fn main() {
    std::process::exit(archivist_cli::run().await);
}
