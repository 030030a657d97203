//! Fires concurrent requests through a bounded worker pool.
//!
//! Run: `cargo run --example pooled_run -- /var/www/html/index.php`

use std::thread;
use std::time::Instant;

use ripht_php_fpm::{ClientConfig, ExecutionOptions, FpmClient, WebRequest};

const REQUESTS: usize = 32;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let script = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "/var/www/html/index.php".to_string());

    let config = ClientConfig::from_env()?;
    let client = FpmClient::builder(config.target()?)
        .pool_size(config.pool_size.unwrap_or(0))
        .build()?;

    let workers = client
        .pool()
        .map(|p| p.worker_count())
        .unwrap_or(1);
    println!("Running {} requests on {} workers", REQUESTS, workers);

    let options = ExecutionOptions::script(script);
    let started = Instant::now();

    let handles: Vec<_> = (0..REQUESTS)
        .map(|i| {
            let client = client.clone();
            let options = options.clone();
            thread::spawn(move || {
                let request = WebRequest::get()
                    .with_uri(format!("/index.php?i={}", i))
                    .build()
                    .map_err(|e| e.to_string())?;

                client
                    .run(&options, request)
                    .map(|res| res.status())
                    .map_err(|e| e.to_string())
            })
        })
        .collect();

    let mut ok = 0;
    for (i, handle) in handles.into_iter().enumerate() {
        match handle.join() {
            Ok(Ok(status)) => {
                ok += 1;
                println!("request {:>2}: {}", i, status);
            }
            Ok(Err(e)) => eprintln!("request {:>2}: {}", i, e),
            Err(_) => eprintln!("request {:>2}: thread panicked", i),
        }
    }

    println!(
        "{}/{} succeeded in {:?}",
        ok,
        REQUESTS,
        started.elapsed()
    );

    Ok(())
}
