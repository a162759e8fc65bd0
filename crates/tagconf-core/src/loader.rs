//! Top-level configuration loading
//!
//! [`Loader`] ties the pieces together:
//!
//! 1. discover the source descriptor (explicit, environment variable, or
//!    `--settings <source>` on the command line)
//! 2. fetch it through the callback or the [`LoaderChain`]
//! 3. expand tags from depth 0
//! 4. strip comments
//! 5. validate against the schema, if any
//! 6. decode into the caller's type and run the extended validator, if any
//!
//! Every failure except schema validation is wrapped in the
//! `unable to load configuration [...]` envelope of [`LoadError`].

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::comments::strip_comments;
use crate::error::{Error, LoadError, Result, ValidationFailed};
use crate::expand::{Expander, DEFAULT_MAX_DEPTH};
use crate::schema::Schema;
use crate::source::{
    redact_descriptor, CancelToken, LoadContext, LoaderChain, DEFAULT_HTTP_HEADER_TIMEOUT,
    DEFAULT_HTTP_TIMEOUT,
};

/// Command-line parameter searched when no other source is given
pub const DEFAULT_COMMAND_LINE_PARAMETER: &str = "settings";

/// Caller-supplied loader for the top-level source
///
/// It receives the descriptor and the cancellation token of the load.
/// Nested `${SRC:...}` tags never go through it.
pub type LoaderCallback = Arc<dyn Fn(&str, &CancelToken) -> Result<Vec<u8>> + Send + Sync>;

/// Options for loading configuration
#[derive(Debug, Clone)]
pub struct LoaderOptions {
    /// Source descriptor; takes precedence over discovery
    pub source: Option<String>,
    /// Environment variable holding the source descriptor
    pub environment_variable: Option<String>,
    /// Command-line parameter (without the leading `--`) followed by the source
    pub command_line_parameter: String,
    /// Maximum tag expansion depth
    pub max_depth: usize,
    /// Overall timeout for one HTTP request
    pub http_timeout: Duration,
    /// Timeout for receiving HTTP response headers
    pub http_header_timeout: Duration,
    /// Base directory for relative file sources (working directory if unset)
    pub base_dir: Option<PathBuf>,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            source: None,
            environment_variable: None,
            command_line_parameter: DEFAULT_COMMAND_LINE_PARAMETER.to_string(),
            max_depth: DEFAULT_MAX_DEPTH,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            http_header_timeout: DEFAULT_HTTP_HEADER_TIMEOUT,
            base_dir: None,
        }
    }
}

impl LoaderOptions {
    /// Options with an explicit source descriptor
    pub fn with_source(source: impl Into<String>) -> Self {
        Self {
            source: Some(source.into()),
            ..Self::default()
        }
    }
}

/// Loads, expands and validates a configuration document
pub struct Loader {
    options: LoaderOptions,
    chain: LoaderChain,
    callback: Option<LoaderCallback>,
    schema: Option<Schema>,
    cancel: CancelToken,
    args: Option<Vec<String>>,
    settings_source: Option<String>,
}

impl Default for Loader {
    fn default() -> Self {
        Self::new(LoaderOptions::default())
    }
}

impl Loader {
    /// Create a loader with the built-in source chain
    pub fn new(options: LoaderOptions) -> Self {
        Self {
            options,
            chain: LoaderChain::with_builtins(),
            callback: None,
            schema: None,
            cancel: CancelToken::new(),
            args: None,
            settings_source: None,
        }
    }

    /// Load the top-level source with `callback` instead of the chain
    pub fn with_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&str, &CancelToken) -> Result<Vec<u8>> + Send + Sync + 'static,
    {
        self.callback = Some(Arc::new(callback));
        self
    }

    /// Validate the expanded document against `schema`
    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Use `cancel` to abort in-flight loads
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Replace the source chain
    pub fn with_chain(mut self, chain: LoaderChain) -> Self {
        self.chain = chain;
        self
    }

    /// Search `args` instead of the process arguments during discovery
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = Some(args.into_iter().map(Into::into).collect());
        self
    }

    /// Get the options
    pub fn options(&self) -> &LoaderOptions {
        &self.options
    }

    /// The source of the last successful load, cleared when a load fails
    pub fn settings_source(&self) -> Option<&str> {
        self.settings_source.as_deref()
    }

    /// Load and decode the configuration
    pub fn load<T: DeserializeOwned>(&mut self) -> std::result::Result<T, LoadError> {
        self.load_validated(|_: &T| Ok(()))
    }

    /// Load and decode the configuration into a generic JSON value
    pub fn load_value(&mut self) -> std::result::Result<serde_json::Value, LoadError> {
        self.load()
    }

    /// Load, decode and run `validator` on the decoded settings
    ///
    /// A validator error is reported as `Rejected`.
    pub fn load_validated<T, F>(&mut self, validator: F) -> std::result::Result<T, LoadError>
    where
        T: DeserializeOwned,
        F: FnOnce(&T) -> std::result::Result<(), String>,
    {
        let result = self.prepare().and_then(|(source, data)| {
            let settings: T = serde_json::from_slice(&data)
                .map_err(|e| Error::decode(e.to_string()).with_source(redact_descriptor(&source)))?;
            validator(&settings).map_err(Error::rejected)?;
            Ok((source, settings))
        });
        self.record(result)
    }

    /// Load the expanded, comment-free and schema-checked document without decoding it
    pub fn load_bytes(&mut self) -> std::result::Result<Vec<u8>, LoadError> {
        let result = self.prepare();
        self.record(result)
    }

    /// Work out which source to load
    pub fn resolve_source(&self) -> Result<String> {
        if let Some(source) = self.options.source.as_deref().filter(|s| !s.is_empty()) {
            log::debug!("Using explicit source '{}'", redact_descriptor(source));
            return Ok(source.to_string());
        }

        if let Some(var) = &self.options.environment_variable {
            if let Ok(source) = std::env::var(var) {
                if !source.is_empty() {
                    log::debug!(
                        "Using source '{}' from environment variable {}",
                        redact_descriptor(&source),
                        var
                    );
                    return Ok(source);
                }
            }
        }

        let parameter = format!("--{}", self.options.command_line_parameter);
        let args: Vec<String> = match &self.args {
            Some(args) => args.clone(),
            None => std::env::args_os()
                .map(|a| a.to_string_lossy().into_owned())
                .collect(),
        };
        if let Some(pos) = args.iter().position(|a| *a == parameter) {
            let source = args
                .get(pos + 1)
                .cloned()
                .ok_or_else(|| Error::missing_argument(parameter.clone()))?;
            log::debug!(
                "Using source '{}' from {} argument",
                redact_descriptor(&source),
                parameter
            );
            return Ok(source);
        }

        Err(Error::source_not_defined())
    }

    /// Fetch `source` and expand its tags, leaving comments in place
    pub fn expand_source(&self, source: &str) -> Result<Vec<u8>> {
        let ctx = self.context();

        let raw = match &self.callback {
            Some(callback) => {
                ctx.cancel.check()?;
                callback(source, &ctx.cancel).map_err(|e| e.with_source(redact_descriptor(source)))?
            }
            None => self.chain.load(source, &ctx)?,
        };

        Expander::new(&self.chain, &ctx)
            .with_max_depth(self.options.max_depth)
            .expand(raw, 0)
    }

    fn context(&self) -> LoadContext {
        let ctx = LoadContext::new()
            .with_cancel(self.cancel.clone())
            .with_http_timeout(self.options.http_timeout)
            .with_http_header_timeout(self.options.http_header_timeout);
        match &self.options.base_dir {
            Some(dir) => ctx.with_base_dir(dir.clone()),
            None => ctx,
        }
    }

    /// Discover, expand, strip and schema-check
    fn prepare(&self) -> std::result::Result<(String, Vec<u8>), LoadError> {
        let source = self.resolve_source()?;
        let mut data = self.expand_source(&source)?;
        strip_comments(&mut data);

        if let Some(schema) = &self.schema {
            let failures = schema
                .validate_bytes(&data)
                .map_err(|e| e.with_source(redact_descriptor(&source)))?;
            if !failures.is_empty() {
                log::debug!(
                    "Schema validation of '{}' failed with {} error(s)",
                    redact_descriptor(&source),
                    failures.len()
                );
                return Err(ValidationFailed { failures }.into());
            }
        }

        Ok((source, data))
    }

    fn record<T>(
        &mut self,
        result: std::result::Result<(String, T), LoadError>,
    ) -> std::result::Result<T, LoadError> {
        match result {
            Ok((source, value)) => {
                self.settings_source = Some(source);
                Ok(value)
            }
            Err(e) => {
                self.settings_source = None;
                Err(e)
            }
        }
    }
}
