use std::borrow::Cow;
use std::path::{Path, PathBuf};

use crate::FpmError;

pub(crate) static SERVER_SOFTWARE: &str = "Ripht/0.1.0";

/// Per-deployment settings forwarded to the responder as CGI variables.
///
/// Unlike [`ExecutionRequest`](super::ExecutionRequest), these do not change
/// between requests; a client typically holds one value and reuses it.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ExecutionOptions {
    pub script_path: PathBuf,
    /// Falls back to the script's parent directory when unset.
    pub document_root: Option<PathBuf>,
    pub server_addr: String,
    pub server_software: String,
    pub server_port: u16,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            script_path: PathBuf::new(),
            document_root: None,
            server_addr: "127.0.0.1".to_string(),
            server_software: SERVER_SOFTWARE.to_string(),
            server_port: 80,
        }
    }
}

impl ExecutionOptions {
    pub fn script(path: impl Into<PathBuf>) -> Self {
        Self {
            script_path: path.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_document_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.document_root = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_server_addr(mut self, addr: impl Into<String>) -> Self {
        self.server_addr = addr.into();
        self
    }

    #[must_use]
    pub fn with_server_software(mut self, name: impl Into<String>) -> Self {
        self.server_software = name.into();
        self
    }

    #[must_use]
    pub fn with_server_port(mut self, port: u16) -> Self {
        self.server_port = port;
        self
    }

    pub fn document_root(&self) -> Cow<'_, Path> {
        match self.document_root {
            Some(ref root) => Cow::Borrowed(root.as_path()),
            None => Cow::Owned(
                self.script_path
                    .parent()
                    .map(|p| p.to_path_buf())
                    .unwrap_or_else(|| PathBuf::from("/")),
            ),
        }
    }

    /// Checks the options before any connection is opened.
    ///
    /// PHP-FPM resolves `SCRIPT_FILENAME` on its own filesystem, so the
    /// script path has to be absolute.
    pub fn validate(&self) -> Result<(), FpmError> {
        if self.script_path.as_os_str().is_empty() {
            return Err(FpmError::config("script path is empty"));
        }

        if !self.script_path.is_absolute() {
            return Err(FpmError::config(format!(
                "script path must be absolute: {}",
                self.script_path.display()
            )));
        }

        if let Some(ref root) = self.document_root {
            if root.as_os_str().is_empty() {
                return Err(FpmError::config("document root is empty"));
            }
        }

        if self.server_addr.trim().is_empty() {
            return Err(FpmError::config("server address is empty"));
        }

        if self.server_software.trim().is_empty() {
            return Err(FpmError::config("server software name is empty"));
        }

        Ok(())
    }
}
