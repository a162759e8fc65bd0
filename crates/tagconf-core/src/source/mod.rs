//! Source loaders
//!
//! A source descriptor is an opaque string naming where configuration bytes
//! come from. The [`LoaderChain`] offers it to each loader in a fixed order:
//!
//! 1. `http://...` / `https://...` - HTTP GET
//! 2. `vault://host?token=..&path=..[&key=a/b]` / `vaults://...` - secret store
//! 3. `data://...` or a literal JSON object/array - inline data
//! 4. anything else (optionally `file://`) - a file path
//!
//! Each loader either loads the bytes, reports [`Probe::WrongFormat`] so the
//! next one is tried, or fails. A failure stops the chain.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};

#[cfg(feature = "http")]
mod http;

/// Default overall timeout for a single HTTP request
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);
/// Default time allowed for the response headers to arrive
pub const DEFAULT_HTTP_HEADER_TIMEOUT: Duration = Duration::from_secs(5);

const DATA_PREFIX: &str = "data://";
const FILE_PREFIX: &str = "file://";

/// Outcome of offering a descriptor to one loader
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe {
    /// The loader recognised the descriptor and produced its bytes
    Loaded(Vec<u8>),
    /// Not this loader's scheme; try the next one
    WrongFormat,
}

/// Shared cancellation flag
///
/// Clones share the same flag. Once cancelled, every pending and future load
/// made with a context holding this token fails with `Cancelled`.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create a token that is not cancelled
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel every load using this token
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Check whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Fail with `Cancelled` if cancellation was requested
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::cancelled())
        } else {
            Ok(())
        }
    }
}

/// Context shared by every load of one expansion
pub struct LoadContext {
    /// Directory relative file paths are resolved against (working directory if unset)
    pub base_dir: Option<PathBuf>,
    /// Cancellation signal honoured by every blocking load
    pub cancel: CancelToken,
    /// Overall timeout for one HTTP request
    pub http_timeout: Duration,
    /// Timeout for receiving response headers
    pub http_header_timeout: Duration,
    #[cfg(feature = "http")]
    agent: std::sync::OnceLock<ureq::Agent>,
}

impl Default for LoadContext {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for LoadContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadContext")
            .field("base_dir", &self.base_dir)
            .field("cancel", &self.cancel)
            .field("http_timeout", &self.http_timeout)
            .field("http_header_timeout", &self.http_header_timeout)
            .finish()
    }
}

impl LoadContext {
    /// Create a context with default timeouts
    pub fn new() -> Self {
        Self {
            base_dir: None,
            cancel: CancelToken::new(),
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            http_header_timeout: DEFAULT_HTTP_HEADER_TIMEOUT,
            #[cfg(feature = "http")]
            agent: std::sync::OnceLock::new(),
        }
    }

    /// Set the directory for relative file paths
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    /// Set the cancellation token
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Set the overall HTTP request timeout
    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    /// Set the HTTP response header timeout
    pub fn with_http_header_timeout(mut self, timeout: Duration) -> Self {
        self.http_header_timeout = timeout;
        self
    }

    /// HTTP agent shared by every request made with this context
    #[cfg(feature = "http")]
    pub(crate) fn agent(&self) -> &ureq::Agent {
        self.agent.get_or_init(|| {
            let config = ureq::Agent::config_builder()
                .timeout_global(Some(self.http_timeout))
                .timeout_recv_response(Some(self.http_header_timeout))
                .http_status_as_error(false)
                .build();
            config.into()
        })
    }
}

/// Trait for source loader implementations
pub trait SourceLoader: Send + Sync {
    /// Load the bytes named by `descriptor`, or report that it is not this loader's format
    fn load(&self, descriptor: &str, ctx: &LoadContext) -> Result<Probe>;

    /// Get the name of this loader
    fn name(&self) -> &str;
}

/// A simple function-based loader
pub struct FnLoader<F>
where
    F: Fn(&str, &LoadContext) -> Result<Probe> + Send + Sync,
{
    name: String,
    func: F,
}

impl<F> FnLoader<F>
where
    F: Fn(&str, &LoadContext) -> Result<Probe> + Send + Sync,
{
    /// Create a new function-based loader
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> SourceLoader for FnLoader<F>
where
    F: Fn(&str, &LoadContext) -> Result<Probe> + Send + Sync,
{
    fn load(&self, descriptor: &str, ctx: &LoadContext) -> Result<Probe> {
        (self.func)(descriptor, ctx)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Ordered set of loaders tried one after another
#[derive(Clone)]
pub struct LoaderChain {
    loaders: Vec<Arc<dyn SourceLoader>>,
}

impl Default for LoaderChain {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl LoaderChain {
    /// Create an empty chain
    pub fn new() -> Self {
        Self {
            loaders: Vec::new(),
        }
    }

    /// Create the standard chain: http, vault, data, file
    pub fn with_builtins() -> Self {
        Self::new()
            .with(Arc::new(FnLoader::new("http", load_http)))
            .with(Arc::new(FnLoader::new("vault", load_vault)))
            .with(Arc::new(FnLoader::new("data", load_data)))
            .with(Arc::new(FnLoader::new("file", load_file)))
    }

    /// Append a loader to the end of the chain
    pub fn with(mut self, loader: Arc<dyn SourceLoader>) -> Self {
        self.loaders.push(loader);
        self
    }

    /// Names of the loaders, in the order they are tried
    pub fn names(&self) -> Vec<&str> {
        self.loaders.iter().map(|l| l.name()).collect()
    }

    /// Load the bytes named by `descriptor`
    ///
    /// Stops at the first loader that does not report a wrong format. Its
    /// error, if any, is returned as is with the descriptor attached.
    pub fn load(&self, descriptor: &str, ctx: &LoadContext) -> Result<Vec<u8>> {
        ctx.cancel.check()?;

        for loader in &self.loaders {
            match loader.load(descriptor, ctx) {
                Ok(Probe::Loaded(bytes)) => {
                    log::debug!(
                        "Loaded {} bytes from '{}' ({} loader)",
                        bytes.len(),
                        redact_descriptor(descriptor),
                        loader.name()
                    );
                    return Ok(bytes);
                }
                Ok(Probe::WrongFormat) => continue,
                Err(e) => return Err(e.with_source(redact_descriptor(descriptor))),
            }
        }

        Err(Error::internal(format!(
            "no loader accepts source '{}'",
            redact_descriptor(descriptor)
        )))
    }
}

/// Render a descriptor for logs and errors: secret-store tokens are masked
/// and long inline documents are shortened
pub fn redact_descriptor(descriptor: &str) -> String {
    const MAX_LEN: usize = 96;

    let masked = match descriptor.split_once('?') {
        Some((base, query)) if secret_store_address(descriptor).is_some() => {
            let query: Vec<String> = query
                .split('&')
                .map(|pair| match pair.split_once('=') {
                    Some(("token", _)) => "token=***".to_string(),
                    _ => pair.to_string(),
                })
                .collect();
            format!("{}?{}", base, query.join("&"))
        }
        _ => descriptor.to_string(),
    };

    truncate_str(&masked, MAX_LEN)
}

/// Truncate a string on a character boundary for display
fn truncate_str(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut end = max_len;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}

/// Check for an `http://` or `https://` descriptor
fn is_http_url(descriptor: &str) -> bool {
    descriptor.starts_with("http://") || descriptor.starts_with("https://")
}

/// Rewrite `vault://` to `http://` and `vaults://` to `https://`
fn secret_store_address(descriptor: &str) -> Option<String> {
    if let Some(rest) = descriptor.strip_prefix("vault://") {
        Some(format!("http://{}", rest))
    } else {
        descriptor
            .strip_prefix("vaults://")
            .map(|rest| format!("https://{}", rest))
    }
}

/// Built-in HTTP loader
///
/// Usage:
///   ${SRC:https://config.example.com/app.json}
///
/// Any status other than 200 is an error, never a fallthrough.
fn load_http(descriptor: &str, ctx: &LoadContext) -> Result<Probe> {
    if !is_http_url(descriptor) {
        return Ok(Probe::WrongFormat);
    }

    #[cfg(feature = "http")]
    {
        http::fetch(descriptor, ctx).map(Probe::Loaded)
    }

    #[cfg(not(feature = "http"))]
    {
        let _ = ctx;
        Err(Error::feature_disabled("http"))
    }
}

/// Built-in secret-store loader
///
/// Usage:
///   ${SRC:vault://127.0.0.1:8200?token=T&path=secret/data/app}
///   ${SRC:vaults://vault.internal?token=T&path=secret/data/app&key=db/password}
///
/// Without `key` the whole secret is returned as JSON. With `key`, a string
/// value is returned verbatim (not quoted) and anything else as JSON.
fn load_vault(descriptor: &str, ctx: &LoadContext) -> Result<Probe> {
    let Some(address) = secret_store_address(descriptor) else {
        return Ok(Probe::WrongFormat);
    };

    #[cfg(feature = "http")]
    {
        let request = http::SecretRequest::parse(&address)?;
        request.fetch(ctx).map(Probe::Loaded)
    }

    #[cfg(not(feature = "http"))]
    {
        let _ = (address, ctx);
        Err(Error::feature_disabled("vault"))
    }
}

/// Built-in inline data loader
///
/// Usage:
///   ${SRC:data://anything at all}       - everything after `data://`, verbatim
///   ${SRC:{"literal": "json"}}          - a JSON object or array, verbatim
fn load_data(descriptor: &str, _ctx: &LoadContext) -> Result<Probe> {
    if let Some(rest) = descriptor.strip_prefix(DATA_PREFIX) {
        return Ok(Probe::Loaded(rest.as_bytes().to_vec()));
    }

    match descriptor.trim_start().as_bytes().first() {
        Some(b'{') | Some(b'[') => Ok(Probe::Loaded(descriptor.as_bytes().to_vec())),
        _ => Ok(Probe::WrongFormat),
    }
}

/// Built-in file loader
///
/// Usage:
///   ${SRC:settings.json}                - relative to the working directory
///   ${SRC:/etc/app/settings.json}       - absolute
///   ${SRC:file:///etc/app/settings.json}
///
/// This loader accepts every descriptor, so it must stay last in the chain.
fn load_file(descriptor: &str, ctx: &LoadContext) -> Result<Probe> {
    let raw = descriptor.strip_prefix(FILE_PREFIX).unwrap_or(descriptor);
    let path = resolve_path(Path::new(raw), ctx).map_err(|e| Error::io(raw, &e))?;

    match std::fs::read(&path) {
        Ok(bytes) => Ok(Probe::Loaded(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(Error::file_not_found(path.display().to_string()))
        }
        Err(e) => Err(Error::io(path.display().to_string(), &e)),
    }
}

/// Make a path absolute against the context base directory or the working directory
fn resolve_path(path: &Path, ctx: &LoadContext) -> std::io::Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    match &ctx.base_dir {
        Some(base) => Ok(base.join(path)),
        None => Ok(std::env::current_dir()?.join(path)),
    }
}
