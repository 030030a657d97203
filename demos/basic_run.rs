//! Runs one script on a local PHP-FPM and prints the response.
//!
//! Run: `cargo run --example basic_run -- /var/www/html/index.php`
//!
//! The responder address comes from `RIPHT_FPM_ADDRESS` (default
//! `127.0.0.1:9000`); `unix:///run/php/php8.3-fpm.sock` works too.

use ripht_php_fpm::{ClientConfig, ExecutionOptions, FpmClient, WebRequest};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let script = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "/var/www/html/index.php".to_string());

    let config = ClientConfig::from_env()?;
    let client = FpmClient::builder(config.target()?)
        .on_error(|e| eprintln!("FastCGI failure: {}", e))
        .build()?;

    let options = ExecutionOptions::script(&script);
    let request = WebRequest::get()
        .with_uri("/index.php?greeting=hello")
        .with_header("Host", "localhost")
        .build()?;

    let response = client.run(&options, request)?;

    println!("Status: {}", response.status());
    for (name, value) in response.headers() {
        println!("{}: {}", name, value);
    }
    println!();
    println!("{}", response.body_string());

    if response.has_errors() {
        eprintln!("PHP errors occurred:");
        for error in response.errors() {
            eprintln!("  {:?}: {}", error.level, error.message);
        }
    }

    Ok(())
}
