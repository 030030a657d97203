//! A FastCGI client for executing PHP scripts on PHP-FPM from Rust.
//!
//! This crate speaks the FastCGI wire protocol over TCP or a Unix-domain
//! socket, builds the CGI/1.1 environment PHP expects, and turns the
//! responder's output back into a status, headers and body.
//!
//! # Execution Model
//!
//! Every [`FpmClient::run`] opens a fresh connection, sends exactly one
//! request and closes the connection once the response has been read. There
//! is no keep-alive and no multiplexing. Calls are synchronous; an optional
//! bounded worker pool runs sessions off the caller's thread while keeping
//! the same blocking contract.
//!
//! # Example
//!
//! ```no_run
//! use ripht_php_fpm::{ExecutionOptions, FpmClient, WebRequest};
//!
//! let client = FpmClient::tcp("127.0.0.1", 9000);
//! let options = ExecutionOptions::script("/var/www/html/index.php");
//!
//! let request = WebRequest::get()
//!     .with_uri("/index.php?id=42")
//!     .with_header("Host", "example.com")
//!     .build()
//!     .expect("valid request");
//!
//! let response = client.run(&options, request).expect("run");
//! println!("Status: {}, Body: {}", response.status(), response.body_string());
//! ```

pub mod adapters;
pub mod client;
pub mod execution;
pub mod pool;
pub mod protocol;

mod error;

pub use error::FpmError;

pub use adapters::{Method, WebRequest, WebRequestError};

pub use client::{
    parse_response, ClientConfig, ConnectionTarget, FpmClient,
    FpmClientBuilder, ServerVars, Termination,
};

pub use execution::{
    ErrorCallback, ExecutionMessage, ExecutionOptions, ExecutionRequest,
    FpmResponse, NoOpHooks, ResponseHeader, SessionHooks, StreamingCallback,
    SyslogLevel,
};

pub use pool::WorkerPool;

pub mod prelude {
    pub use crate::{
        ClientConfig, ConnectionTarget, ErrorCallback, ExecutionMessage,
        ExecutionOptions, ExecutionRequest, FpmClient, FpmError, FpmResponse,
        Method, NoOpHooks, SessionHooks, StreamingCallback, SyslogLevel,
        Termination, WebRequest, WebRequestError,
    };

    #[cfg(feature = "http")]
    pub use crate::{from_http_parts, from_http_request};
}

#[cfg(feature = "http")]
pub use adapters::{from_http_parts, from_http_request};
