mod header;
mod hooks;
mod message;
mod options;
mod request;
mod result;

pub use header::ResponseHeader;
pub use hooks::{ErrorCallback, NoOpHooks, SessionHooks, StreamingCallback};
pub use message::{ExecutionMessage, SyslogLevel};
pub use options::ExecutionOptions;
pub use request::ExecutionRequest;
pub use result::FpmResponse;
