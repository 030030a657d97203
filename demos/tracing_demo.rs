//! Demonstrates how to enable and view tracing logs from the client.
//!
//! To see logs, run with `RUST_LOG` set to a level (info, debug, trace):
//! `RUST_LOG=debug cargo run --example tracing_demo --features tracing`

#[cfg(feature = "tracing")]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    use ripht_php_fpm::{ClientConfig, ExecutionOptions, FpmClient, WebRequest};
    use tracing::info;

    // The `fmt` subscriber reads the RUST_LOG environment variable.
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = ClientConfig::from_env()?;
    info!(address = %config.address, "Building client...");

    let client = FpmClient::builder(config.target()?)
        .pool_size(2)
        .build()?;

    info!("Executing request...");
    let request = WebRequest::post()
        .with_uri("/index.php")
        .with_content_type("application/x-www-form-urlencoded")
        .with_body("name=Jane%20Doe")
        .build()?;

    // - INFO: Pool lifecycle
    // - DEBUG: Connection, request sent, response parsed
    // - TRACE: Every FastCGI record read
    // - WARN: Lines the responder wrote to stderr
    let response = client.run(
        &ExecutionOptions::script("/var/www/html/index.php"),
        request,
    )?;

    info!("Done. Status: {}", response.status());

    Ok(())
}

#[cfg(not(feature = "tracing"))]
fn main() {
    println!("This example requires the 'tracing' feature.");
    println!("Run with: cargo run --example tracing_demo --features tracing");
}
