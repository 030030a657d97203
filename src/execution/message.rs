#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum SyslogLevel {
    Emergency = 0,
    Alert = 1,
    Critical = 2,
    Error = 3,
    Warning = 4,
    Notice = 5,
    Info = 6,
    Debug = 7,
}

impl SyslogLevel {
    pub fn is_error_or_worse(&self) -> bool {
        matches!(
            self,
            Self::Emergency | Self::Alert | Self::Critical | Self::Error
        )
    }

    pub fn is_warning_or_worse(&self) -> bool {
        self.is_error_or_worse() || matches!(self, Self::Warning)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Emergency => "emerg",
            Self::Alert => "alert",
            Self::Critical => "crit",
            Self::Error => "err",
            Self::Warning => "warning",
            Self::Notice => "notice",
            Self::Info => "info",
            Self::Debug => "debug",
        }
    }

    /// Classifies a PHP log line by its `PHP <Kind>:` prefix.
    fn classify(line: &str) -> Self {
        const PREFIXES: &[(&str, SyslogLevel)] = &[
            ("PHP Fatal error", SyslogLevel::Error),
            ("PHP Parse error", SyslogLevel::Error),
            ("PHP Recoverable fatal error", SyslogLevel::Error),
            ("PHP Warning", SyslogLevel::Warning),
            ("PHP Startup", SyslogLevel::Warning),
            ("PHP Notice", SyslogLevel::Notice),
            ("PHP Deprecated", SyslogLevel::Notice),
            ("PHP Strict Standards", SyslogLevel::Notice),
        ];

        PREFIXES
            .iter()
            .find(|(prefix, _)| line.starts_with(prefix))
            .map(|(_, level)| *level)
            .unwrap_or(SyslogLevel::Info)
    }
}

impl std::fmt::Display for SyslogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A line the responder wrote to `FCGI_STDERR`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub struct ExecutionMessage {
    pub message: String,
    pub level: SyslogLevel,
}

impl ExecutionMessage {
    pub fn new(level: SyslogLevel, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            level,
        }
    }

    /// Splits accumulated stderr output into classified messages.
    ///
    /// PHP-FPM prefixes forwarded log lines with `PHP message: `; the prefix
    /// is stripped before classification.
    pub fn from_stderr(stderr: &[u8]) -> Vec<Self> {
        String::from_utf8_lossy(stderr)
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| {
                let line = line.strip_prefix("PHP message: ").unwrap_or(line);
                Self::new(SyslogLevel::classify(line), line)
            })
            .collect()
    }

    pub fn is_error(&self) -> bool {
        self.level.is_error_or_worse()
    }

    pub fn is_warning(&self) -> bool {
        matches!(self.level, SyslogLevel::Warning)
    }

    pub fn is_warning_or_worse(&self) -> bool {
        self.level
            .is_warning_or_worse()
    }
}

impl std::fmt::Display for ExecutionMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.level, self.message)
    }
}
