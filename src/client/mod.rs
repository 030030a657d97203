mod config;
mod parser;
mod server_vars;
mod session;
mod target;

use std::io::{Read, Write};
#[cfg(unix)]
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

#[cfg(feature = "tracing")]
use tracing::{debug, warn};

pub use config::{
    ClientConfig, DEFAULT_ADDRESS, ENV_ADDRESS, ENV_POOL_SIZE, ENV_TERMINATION,
    ENV_TIMEOUT_MS,
};
pub use parser::parse_response;
pub use server_vars::ServerVars;
pub use session::{RawOutput, Session, SessionState, Termination, REQUEST_ID};
pub use target::{ConnectionTarget, FcgiStream};

use crate::execution::{
    ExecutionMessage, ExecutionOptions, ExecutionRequest, FpmResponse,
    NoOpHooks, SessionHooks,
};
use crate::pool::WorkerPool;
use crate::FpmError;

type ErrorHook = Box<dyn Fn(&FpmError) + Send + Sync + 'static>;

struct ClientInner {
    target: ConnectionTarget,
    io_timeout: Option<Duration>,
    termination: Termination,
    on_error: Option<ErrorHook>,
}

/// Synchronous FastCGI client for a single responder.
///
/// Each [`run`](Self::run) opens a fresh connection, sends one request and
/// closes the connection once the response has been read. Cloning is cheap
/// and clones share the same worker pool.
#[derive(Clone)]
pub struct FpmClient {
    inner: Arc<ClientInner>,
    pool: Option<Arc<WorkerPool>>,
}

impl FpmClient {
    pub fn builder(target: ConnectionTarget) -> FpmClientBuilder {
        FpmClientBuilder::new(target)
    }

    /// Client for `host:port` with default settings.
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self::with_target(ConnectionTarget::tcp(host, port))
    }

    /// Client for a `php<major>[.<minor>]-fpm.sock` socket with default
    /// settings.
    #[cfg(unix)]
    pub fn unix(path: impl AsRef<Path>) -> Result<Self, FpmError> {
        Ok(Self::with_target(ConnectionTarget::unix(path)?))
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, FpmError> {
        let mut builder = Self::builder(config.target()?)
            .termination(config.termination);

        if let Some(timeout) = config.io_timeout() {
            builder = builder.io_timeout(timeout);
        }

        if let Some(size) = config.pool_size {
            builder = builder.pool_size(size);
        }

        builder.build()
    }

    fn with_target(target: ConnectionTarget) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                target,
                io_timeout: None,
                termination: Termination::default(),
                on_error: None,
            }),
            pool: None,
        }
    }

    pub fn target(&self) -> &ConnectionTarget {
        &self.inner.target
    }

    pub fn termination(&self) -> Termination {
        self.inner.termination
    }

    pub fn io_timeout(&self) -> Option<Duration> {
        self.inner.io_timeout
    }

    pub fn pool(&self) -> Option<&WorkerPool> {
        self.pool.as_deref()
    }

    /// Executes one request and returns the parsed response.
    ///
    /// With a pool configured the session runs on a worker and this call
    /// blocks until it completes; otherwise it runs on the calling thread.
    pub fn run(
        &self,
        options: &ExecutionOptions,
        request: ExecutionRequest,
    ) -> Result<FpmResponse, FpmError> {
        let Some(pool) = self.pool.as_ref() else {
            return self
                .inner
                .execute(options, &request, &mut NoOpHooks);
        };

        let inner = Arc::clone(&self.inner);
        let options = options.clone();

        pool.execute(move || inner.execute(&options, &request, &mut NoOpHooks))
            .inspect_err(|e| self.inner.report(e))?
    }

    /// Like [`run`](Self::run), but always on the calling thread so that
    /// `hooks` can observe the session as it progresses.
    pub fn run_with_hooks<H: SessionHooks + ?Sized>(
        &self,
        options: &ExecutionOptions,
        request: ExecutionRequest,
        hooks: &mut H,
    ) -> Result<FpmResponse, FpmError> {
        self.inner
            .execute(options, &request, hooks)
    }

    /// Runs the session over a caller-supplied, already-connected stream.
    ///
    /// The client's target and I/O timeout are not used.
    pub fn run_on_stream<S, H>(
        &self,
        stream: S,
        options: &ExecutionOptions,
        request: ExecutionRequest,
        hooks: &mut H,
    ) -> Result<FpmResponse, FpmError>
    where
        S: Read + Write,
        H: SessionHooks + ?Sized,
    {
        let session = Session::from_stream(stream, self.inner.termination);
        let result = prepare(options, &request)
            .and_then(|params| exchange(session, &params, &request, &mut *hooks));

        self.inner
            .finish(result, hooks)
    }
}

impl std::fmt::Debug for FpmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FpmClient")
            .field("target", &self.inner.target)
            .field("io_timeout", &self.inner.io_timeout)
            .field("termination", &self.inner.termination)
            .field("pool", &self.pool)
            .finish()
    }
}

impl ClientInner {
    fn execute<H: SessionHooks + ?Sized>(
        &self,
        options: &ExecutionOptions,
        request: &ExecutionRequest,
        hooks: &mut H,
    ) -> Result<FpmResponse, FpmError> {
        let result = self.connect_and_exchange(options, request, hooks);
        self.finish(result, hooks)
    }

    fn connect_and_exchange<H: SessionHooks + ?Sized>(
        &self,
        options: &ExecutionOptions,
        request: &ExecutionRequest,
        hooks: &mut H,
    ) -> Result<FpmResponse, FpmError> {
        let params = prepare(options, request)?;

        let mut session = Session::new(self.termination);
        session.connect(&self.target, self.io_timeout)?;
        hooks.on_connected(&self.target);

        exchange(session, &params, request, hooks)
    }

    fn finish<H: SessionHooks + ?Sized>(
        &self,
        result: Result<FpmResponse, FpmError>,
        hooks: &mut H,
    ) -> Result<FpmResponse, FpmError> {
        if let Err(ref e) = result {
            self.report(e);
            hooks.on_error(e);
        }
        result
    }

    fn report(&self, error: &FpmError) {
        #[cfg(feature = "tracing")]
        debug!(
            address = %self.target,
            error = %error,
            "FastCGI session failed"
        );

        if let Some(ref on_error) = self.on_error {
            on_error(error);
        }
    }
}

/// Validates the options and encodes the request environment.
fn prepare(
    options: &ExecutionOptions,
    request: &ExecutionRequest,
) -> Result<Vec<u8>, FpmError> {
    options.validate()?;
    ServerVars::from_request(request, options).encode()
}

fn exchange<S, H>(
    mut session: Session<S>,
    params: &[u8],
    request: &ExecutionRequest,
    hooks: &mut H,
) -> Result<FpmResponse, FpmError>
where
    S: Read + Write,
    H: SessionHooks + ?Sized,
{
    session.send(params, request.body(), hooks)?;
    let raw = session.receive(hooks)?;

    let messages = ExecutionMessage::from_stderr(&raw.stderr);
    for message in &messages {
        #[cfg(feature = "tracing")]
        warn!(level = %message.level, "{}", message.message);

        hooks.on_message(message);
    }

    let response = parse_response(&raw.stdout)
        .with_messages(messages)
        .with_app_status(raw.end.map(|end| end.app_status));

    #[cfg(feature = "tracing")]
    debug!(
        status = response.status(),
        body_len = response.body().len(),
        "FastCGI response parsed"
    );

    hooks.on_response(&response);
    Ok(response)
}

/// Builder for [`FpmClient`].
#[must_use]
pub struct FpmClientBuilder {
    target: ConnectionTarget,
    pool_size: Option<usize>,
    pool_name: String,
    io_timeout: Option<Duration>,
    termination: Termination,
    on_error: Option<ErrorHook>,
}

impl FpmClientBuilder {
    pub fn new(target: ConnectionTarget) -> Self {
        Self {
            target,
            pool_size: None,
            pool_name: "ripht-fpm".to_string(),
            io_timeout: None,
            termination: Termination::default(),
            on_error: None,
        }
    }

    /// Runs sessions on a bounded pool of `size` workers (`0` = CPU count).
    pub fn pool_size(mut self, size: usize) -> Self {
        self.pool_size = Some(size);
        self
    }

    /// Prefix for worker thread names.
    pub fn pool_name(mut self, name: impl Into<String>) -> Self {
        self.pool_name = name.into();
        self
    }

    /// Applies to connect, read and write. `Duration::ZERO` clears it.
    pub fn io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = Some(timeout).filter(|t| !t.is_zero());
        self
    }

    pub fn termination(mut self, termination: Termination) -> Self {
        self.termination = termination;
        self
    }

    /// Observes every failure before it is returned to the caller.
    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: Fn(&FpmError) + Send + Sync + 'static,
    {
        self.on_error = Some(Box::new(f));
        self
    }

    pub fn build(self) -> Result<FpmClient, FpmError> {
        let pool = match self.pool_size {
            Some(size) => Some(Arc::new(WorkerPool::new(size, self.pool_name)?)),
            None => None,
        };

        Ok(FpmClient {
            inner: Arc::new(ClientInner {
                target: self.target,
                io_timeout: self.io_timeout,
                termination: self.termination,
                on_error: self.on_error,
            }),
            pool,
        })
    }
}

impl std::fmt::Debug for FpmClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FpmClientBuilder")
            .field("target", &self.target)
            .field("pool_size", &self.pool_size)
            .field("io_timeout", &self.io_timeout)
            .field("termination", &self.termination)
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}
