use crate::client::ConnectionTarget;
use crate::protocol::RecordType;
use crate::FpmError;

use super::message::ExecutionMessage;
use super::result::FpmResponse;

/// No-op implementation of `SessionHooks`.
pub struct NoOpHooks;

impl SessionHooks for NoOpHooks {}

/// Wraps a closure as a `SessionHooks` implementation that sees every
/// stdout chunk as it arrives.
///
/// The chunks are still accumulated into the response body.
pub struct StreamingCallback<F> {
    output_fn: F,
}

impl<F> StreamingCallback<F>
where
    F: FnMut(&[u8]),
{
    pub fn new(output_fn: F) -> Self {
        Self { output_fn }
    }
}

impl<F> SessionHooks for StreamingCallback<F>
where
    F: FnMut(&[u8]),
{
    fn on_stdout(&mut self, data: &[u8]) {
        (self.output_fn)(data);
    }
}

/// Wraps a closure as a `SessionHooks` implementation invoked on failure.
pub struct ErrorCallback<F> {
    error_fn: F,
}

impl<F> ErrorCallback<F>
where
    F: FnMut(&FpmError),
{
    pub fn new(error_fn: F) -> Self {
        Self { error_fn }
    }
}

impl<F> SessionHooks for ErrorCallback<F>
where
    F: FnMut(&FpmError),
{
    fn on_error(&mut self, error: &FpmError) {
        (self.error_fn)(error);
    }
}

/// Observer callbacks invoked while a FastCGI session runs.
///
/// All methods have default implementations that do nothing. Override only
/// what you need. Hooks observe; they never change the outcome of `run`.
pub trait SessionHooks {
    /// Called after the socket to the responder is open.
    fn on_connected(&mut self, target: &ConnectionTarget) {
        let _ = target;
    }

    /// Called once the full request envelope has been written.
    fn on_request_sent(&mut self, params_len: usize, stdin_len: usize) {
        let _ = (params_len, stdin_len);
    }

    /// Called for every record read from the responder.
    fn on_record(&mut self, record_type: RecordType, content_len: usize) {
        let _ = (record_type, content_len);
    }

    /// Called for each non-empty `FCGI_STDOUT` chunk that is kept.
    fn on_stdout(&mut self, data: &[u8]) {
        let _ = data;
    }

    /// Called for each line the responder wrote to `FCGI_STDERR`.
    fn on_message(&mut self, message: &ExecutionMessage) {
        let _ = message;
    }

    /// Called when the session fails, after the socket has been closed.
    fn on_error(&mut self, error: &FpmError) {
        let _ = error;
    }

    /// Called with the parsed response before it is returned.
    fn on_response(&mut self, response: &FpmResponse) {
        let _ = response;
    }
}

impl<H: SessionHooks + ?Sized> SessionHooks for &mut H {
    fn on_connected(&mut self, target: &ConnectionTarget) {
        (**self).on_connected(target)
    }

    fn on_request_sent(&mut self, params_len: usize, stdin_len: usize) {
        (**self).on_request_sent(params_len, stdin_len)
    }

    fn on_record(&mut self, record_type: RecordType, content_len: usize) {
        (**self).on_record(record_type, content_len)
    }

    fn on_stdout(&mut self, data: &[u8]) {
        (**self).on_stdout(data)
    }

    fn on_message(&mut self, message: &ExecutionMessage) {
        (**self).on_message(message)
    }

    fn on_error(&mut self, error: &FpmError) {
        (**self).on_error(error)
    }

    fn on_response(&mut self, response: &FpmResponse) {
        (**self).on_response(response)
    }
}
