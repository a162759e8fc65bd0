//! Error types for tagconf
//!
//! Expansion and loading failures are reported through [`Error`], a structured
//! error carrying the failing source descriptor and an actionable help message.
//! The top-level [`LoadError`] wraps every failure in a single
//! "unable to load configuration" envelope, except schema validation failures
//! which are passed through so callers can inspect each one.

use std::fmt;

/// Result type alias for tagconf operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for expansion and source loading
#[derive(Debug, Clone)]
pub struct Error {
    /// The kind of error that occurred
    pub kind: ErrorKind,
    /// Source descriptor being loaded when the error occurred (secrets redacted)
    pub source: Option<String>,
    /// Actionable help message
    pub help: Option<String>,
    /// Underlying cause (as string for Clone compatibility)
    pub cause: Option<String>,
}

/// Categories of errors that can occur
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// A `${SRC:` or `${ENV:` opening without its closing brace
    UnterminatedTag { offset: usize },
    /// Nested expansion went deeper than the configured ceiling
    TooManyLevels { max_depth: usize },
    /// `${ENV:name}` referenced a variable that is unset or empty
    EnvVarMissing { var_name: String },
    /// A source loader failed
    SourceLoad(SourceErrorKind),
    /// The caller cancelled the load
    Cancelled,
    /// No top-level source was given, found in the environment or on the command line
    SourceNotDefined,
    /// The command-line parameter naming the source had no value
    MissingArgument { parameter: String },
    /// The expanded document is not valid JSON
    Decode,
    /// The schema document itself is invalid
    Schema,
    /// The extended validator rejected the decoded settings
    Rejected,
    /// Internal error (bug in tagconf)
    Internal,
}

/// Specific source loader error categories
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceErrorKind {
    /// Server answered with something other than 200
    HttpStatus { url: String, status: u16 },
    /// Transport-level HTTP failure (connect, timeout, body read)
    Http { url: String },
    /// Secret-store URL without a query string
    InvalidSecretUrl,
    /// Secret-store URL without a `token` parameter
    MissingToken,
    /// Secret-store URL without a `path` parameter
    InvalidSecretPath,
    /// Secret-store `key` parameter with an empty segment
    InvalidSecretKey,
    /// Secret store has no data at the requested path
    SecretNotFound,
    /// Secret data has no value at the requested key
    KeyNotFound { key: String },
    /// File does not exist
    FileNotFound { path: String },
    /// Any other I/O failure reading a file
    Io { path: String },
    /// Caller-supplied loader callback failed
    Callback,
    /// Loader recognised the descriptor but its support is not compiled in
    FeatureDisabled { scheme: String },
}

impl Error {
    fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            source: None,
            help: None,
            cause: None,
        }
    }

    /// Create an unterminated tag error
    pub fn unterminated_tag(offset: usize) -> Self {
        Self {
            help: Some("Close the tag with '}' (nested tags need their own closing brace)".into()),
            ..Self::new(ErrorKind::UnterminatedTag { offset })
        }
    }

    /// Create a too many expansion levels error
    pub fn too_many_levels(max_depth: usize) -> Self {
        Self {
            help: Some(
                "Check for a source or environment variable that references itself".into(),
            ),
            ..Self::new(ErrorKind::TooManyLevels { max_depth })
        }
    }

    /// Create an environment variable missing error
    pub fn env_var_missing(var_name: impl Into<String>) -> Self {
        let var = var_name.into();
        Self {
            help: Some(format!(
                "Set the {} environment variable to a non-empty value",
                var
            )),
            ..Self::new(ErrorKind::EnvVarMissing { var_name: var })
        }
    }

    /// Create an HTTP status error
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::new(ErrorKind::SourceLoad(SourceErrorKind::HttpStatus {
            url: url.into(),
            status,
        }))
    }

    /// Create an HTTP transport error
    pub fn http_request_failed(url: impl Into<String>, message: impl Into<String>) -> Self {
        let url_str = url.into();
        Self {
            help: Some(format!(
                "Check that the URL '{}' is reachable",
                url_str
            )),
            cause: Some(message.into()),
            ..Self::new(ErrorKind::SourceLoad(SourceErrorKind::Http { url: url_str }))
        }
    }

    /// Create an invalid secret-store URL error
    pub fn invalid_secret_url() -> Self {
        Self {
            help: Some("Use vault://host:port?token=...&path=...[&key=...]".into()),
            ..Self::new(ErrorKind::SourceLoad(SourceErrorKind::InvalidSecretUrl))
        }
    }

    /// Create a missing secret-store token error
    pub fn missing_token() -> Self {
        Self {
            help: Some("Add a 'token' query parameter to the vault:// URL".into()),
            ..Self::new(ErrorKind::SourceLoad(SourceErrorKind::MissingToken))
        }
    }

    /// Create an invalid secret-store path error
    pub fn invalid_secret_path() -> Self {
        Self {
            help: Some("Add a 'path' query parameter to the vault:// URL".into()),
            ..Self::new(ErrorKind::SourceLoad(SourceErrorKind::InvalidSecretPath))
        }
    }

    /// Create an invalid secret-store key error
    pub fn invalid_secret_key() -> Self {
        Self {
            help: Some("Keys are '/'-separated and must not contain empty segments".into()),
            ..Self::new(ErrorKind::SourceLoad(SourceErrorKind::InvalidSecretKey))
        }
    }

    /// Create a secret not found error
    pub fn secret_not_found() -> Self {
        Self::new(ErrorKind::SourceLoad(SourceErrorKind::SecretNotFound))
    }

    /// Create a secret key not found error
    pub fn key_not_found(key: impl Into<String>) -> Self {
        Self::new(ErrorKind::SourceLoad(SourceErrorKind::KeyNotFound { key: key.into() }))
    }

    /// Create a file not found error
    pub fn file_not_found(path: impl Into<String>) -> Self {
        Self {
            help: Some("Relative paths are resolved against the working directory".into()),
            ..Self::new(ErrorKind::SourceLoad(SourceErrorKind::FileNotFound {
                path: path.into(),
            }))
        }
    }

    /// Create a file I/O error
    pub fn io(path: impl Into<String>, err: &std::io::Error) -> Self {
        Self {
            cause: Some(err.to_string()),
            ..Self::new(ErrorKind::SourceLoad(SourceErrorKind::Io { path: path.into() }))
        }
    }

    /// Create a loader callback error
    pub fn callback(message: impl Into<String>) -> Self {
        Self {
            cause: Some(message.into()),
            ..Self::new(ErrorKind::SourceLoad(SourceErrorKind::Callback))
        }
    }

    /// Create a feature disabled error
    pub fn feature_disabled(scheme: impl Into<String>) -> Self {
        let scheme = scheme.into();
        Self {
            help: Some(format!(
                "{} support not compiled in. Rebuild with --features http",
                scheme
            )),
            ..Self::new(ErrorKind::SourceLoad(SourceErrorKind::FeatureDisabled { scheme }))
        }
    }

    /// Create a cancelled error
    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled)
    }

    /// Create a source not defined error
    pub fn source_not_defined() -> Self {
        Self {
            help: Some(
                "Set a source explicitly, through the environment variable, or with --settings"
                    .into(),
            ),
            ..Self::new(ErrorKind::SourceNotDefined)
        }
    }

    /// Create a missing command-line argument error
    pub fn missing_argument(parameter: impl Into<String>) -> Self {
        Self::new(ErrorKind::MissingArgument {
            parameter: parameter.into(),
        })
    }

    /// Create a JSON decode error
    pub fn decode(message: impl Into<String>) -> Self {
        Self {
            cause: Some(message.into()),
            ..Self::new(ErrorKind::Decode)
        }
    }

    /// Create an invalid schema error
    pub fn schema(message: impl Into<String>) -> Self {
        Self {
            cause: Some(message.into()),
            ..Self::new(ErrorKind::Schema)
        }
    }

    /// Create an extended validator rejection
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            cause: Some(message.into()),
            ..Self::new(ErrorKind::Rejected)
        }
    }

    /// Create an internal error (bug in tagconf)
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            help: Some("This is likely a bug in tagconf. Please report it.".into()),
            cause: Some(message.into()),
            ..Self::new(ErrorKind::Internal)
        }
    }

    /// Add the source descriptor to the error, unless one is already set
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        if self.source.is_none() {
            self.source = Some(source.into());
        }
        self
    }

    /// Add help message to the error
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Check whether this error came from a source loader
    pub fn is_source_load(&self) -> bool {
        matches!(self.kind, ErrorKind::SourceLoad(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ErrorKind::UnterminatedTag { offset } => {
                write!(f, "error parsing tag: unterminated tag at offset {}", offset)?
            }
            ErrorKind::TooManyLevels { max_depth } => {
                write!(f, "too many expansion levels (maximum {})", max_depth)?
            }
            ErrorKind::EnvVarMissing { var_name } => {
                write!(f, "environment variable '{}' not set", var_name)?
            }
            ErrorKind::SourceLoad(s) => match s {
                SourceErrorKind::HttpStatus { url, status } => write!(
                    f,
                    "unexpected HTTP status code [http-status={}] from {}",
                    status, url
                )?,
                SourceErrorKind::Http { url } => write!(f, "HTTP request failed: {}", url)?,
                SourceErrorKind::InvalidSecretUrl => write!(f, "invalid url")?,
                SourceErrorKind::MissingToken => write!(f, "missing access token")?,
                SourceErrorKind::InvalidSecretPath => write!(f, "invalid path")?,
                SourceErrorKind::InvalidSecretKey => write!(f, "invalid key")?,
                SourceErrorKind::SecretNotFound => write!(f, "data not found")?,
                SourceErrorKind::KeyNotFound { key } => write!(f, "key not found: {}", key)?,
                SourceErrorKind::FileNotFound { path } => write!(f, "file not found: {}", path)?,
                SourceErrorKind::Io { path } => write!(f, "unable to read file: {}", path)?,
                SourceErrorKind::Callback => write!(f, "loader callback failed")?,
                SourceErrorKind::FeatureDisabled { scheme } => {
                    write!(f, "{} sources are disabled", scheme)?
                }
            },
            ErrorKind::Cancelled => write!(f, "operation cancelled")?,
            ErrorKind::SourceNotDefined => write!(f, "source not defined")?,
            ErrorKind::MissingArgument { parameter } => {
                write!(f, "missing source in '{}' parameter", parameter)?
            }
            ErrorKind::Decode => write!(f, "invalid JSON")?,
            ErrorKind::Schema => write!(f, "invalid JSON schema")?,
            ErrorKind::Rejected => write!(f, "settings rejected by validator")?,
            ErrorKind::Internal => write!(f, "internal error")?,
        }

        if let Some(source) = &self.source {
            write!(f, "\n  Source: {}", source)?;
        }

        if let Some(cause) = &self.cause {
            write!(f, "\n  {}", cause)?;
        }

        if let Some(help) = &self.help {
            write!(f, "\n  Help: {}", help)?;
        }

        Ok(())
    }
}

impl std::error::Error for Error {}

/// A single schema validation failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFailure {
    /// JSON pointer to the offending value (empty for the document root)
    pub location: String,
    /// Validator message
    pub message: String,
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.location.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.location, self.message)
        }
    }
}

/// Every schema failure found in a loaded document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFailed {
    pub failures: Vec<ValidationFailure>,
}

impl fmt::Display for ValidationFailed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unable to load configuration [validation failed")?;
        if let Some(first) = self.failures.first() {
            write!(f, " / {} @ {}", first.message, first.location)?;
        }
        write!(f, "]")
    }
}

impl std::error::Error for ValidationFailed {}

/// Top-level error returned by [`crate::Loader`]
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// Any expansion, loading or decoding failure
    #[error("unable to load configuration [{0}]")]
    Load(#[source] Error),
    /// Schema validation failed; every failure is listed
    #[error(transparent)]
    Validation(#[from] ValidationFailed),
}

impl LoadError {
    /// The wrapped expansion or loading error, if any
    pub fn as_error(&self) -> Option<&Error> {
        match self {
            LoadError::Load(e) => Some(e),
            LoadError::Validation(_) => None,
        }
    }

    /// The validation failures, if validation is what failed
    pub fn failures(&self) -> Option<&[ValidationFailure]> {
        match self {
            LoadError::Load(_) => None,
            LoadError::Validation(v) => Some(&v.failures),
        }
    }
}

impl From<Error> for LoadError {
    fn from(err: Error) -> Self {
        LoadError::Load(err)
    }
}
