//! HTTP and secret-store fetching over ureq

use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

use serde_json::{Map, Value};

use super::LoadContext;
use crate::error::{Error, Result};

/// How often a blocked request checks for cancellation
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Header carrying the secret-store access token
const TOKEN_HEADER: &str = "X-Vault-Token";

struct Fetched {
    status: u16,
    body: Vec<u8>,
}

/// GET `url` and return the body of a 200 response
pub(super) fn fetch(url: &str, ctx: &LoadContext) -> Result<Vec<u8>> {
    let fetched = get(url, &[], ctx)?;
    if fetched.status != 200 {
        return Err(Error::http_status(url, fetched.status));
    }
    Ok(fetched.body)
}

/// Run a GET on a worker thread so the caller can give up on cancellation
fn get(url: &str, headers: &[(&str, &str)], ctx: &LoadContext) -> Result<Fetched> {
    ctx.cancel.check()?;

    let agent = ctx.agent().clone();
    let target = url.to_string();
    let headers: Vec<(String, String)> = headers
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    let (tx, rx) = mpsc::channel();
    std::thread::Builder::new()
        .name("tagconf-http".into())
        .spawn(move || {
            // The receiver is gone if the load was cancelled
            let _ = tx.send(perform(&agent, &target, &headers));
        })
        .map_err(|e| Error::http_request_failed(url, e.to_string()))?;

    loop {
        match rx.recv_timeout(CANCEL_POLL_INTERVAL) {
            Ok(result) => return result,
            Err(RecvTimeoutError::Timeout) => {
                if ctx.cancel.is_cancelled() {
                    log::debug!("HTTP request to {} abandoned on cancellation", url);
                    return Err(Error::cancelled());
                }
            }
            Err(RecvTimeoutError::Disconnected) => {
                return Err(Error::internal("HTTP worker exited without a result"));
            }
        }
    }
}

fn perform(agent: &ureq::Agent, url: &str, headers: &[(String, String)]) -> Result<Fetched> {
    let mut request = agent.get(url);
    for (name, value) in headers {
        request = request.header(name.as_str(), value.as_str());
    }

    let response = request.call().map_err(|e| {
        let error_msg = match &e {
            ureq::Error::Timeout(kind) => format!("Request timeout: {:?}", kind),
            ureq::Error::Io(io_err) => format!("Connection error: {}", io_err),
            _ => format!("HTTP request failed: {}", e),
        };
        Error::http_request_failed(url, error_msg)
    })?;

    let status = response.status().as_u16();
    if status != 200 {
        return Ok(Fetched {
            status,
            body: Vec::new(),
        });
    }

    // ureq caps bodies at 10 MiB unless told otherwise
    let mut reader = response.into_body();
    let body = reader
        .with_config()
        .limit(u64::MAX)
        .read_to_vec()
        .map_err(|e| Error::http_request_failed(url, e.to_string()))?;

    Ok(Fetched { status, body })
}

/// A parsed secret-store descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct SecretRequest {
    /// Server base URL, already rewritten to http:// or https://
    pub address: String,
    pub token: String,
    pub path: String,
    /// Key segments; empty means the whole secret
    pub key: Vec<String>,
}

impl SecretRequest {
    /// Parse a rewritten descriptor such as `http://host:8200?token=T&path=P&key=a/b`
    pub fn parse(address: &str) -> Result<Self> {
        let (base, query) = address
            .split_once('?')
            .ok_or_else(Error::invalid_secret_url)?;
        let query = query.split_once('#').map_or(query, |(q, _)| q);

        let mut token = None;
        let mut path = None;
        let mut key = None;
        for (name, value) in url::form_urlencoded::parse(query.as_bytes()) {
            let slot = match &*name {
                "token" => &mut token,
                "path" => &mut path,
                "key" => &mut key,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.into_owned());
            } else {
                log::warn!("Ignoring repeated '{}' parameter in secret-store URL", name);
            }
        }

        let key = match key {
            Some(key) => {
                let segments: Vec<String> = key.split('/').map(str::to_string).collect();
                if segments.iter().any(String::is_empty) {
                    return Err(Error::invalid_secret_key());
                }
                segments
            }
            None => Vec::new(),
        };

        let token = token
            .filter(|t| !t.is_empty())
            .ok_or_else(Error::missing_token)?;
        let path = path
            .filter(|p| !p.is_empty())
            .ok_or_else(Error::invalid_secret_path)?;

        Ok(Self {
            address: base.trim_end_matches('/').to_string(),
            token,
            path,
            key,
        })
    }

    /// Endpoint the secret is read from
    pub fn endpoint(&self) -> String {
        format!("{}/v1/{}", self.address, self.path.trim_start_matches('/'))
    }

    /// Read the secret and select the requested key
    pub fn fetch(&self, ctx: &LoadContext) -> Result<Vec<u8>> {
        let endpoint = self.endpoint();
        let fetched = get(&endpoint, &[(TOKEN_HEADER, self.token.as_str())], ctx)?;

        match fetched.status {
            200 => {}
            404 => return Err(Error::secret_not_found()),
            status => return Err(Error::http_status(endpoint, status)),
        }

        let response: Value = serde_json::from_slice(&fetched.body)
            .map_err(|e| Error::decode(format!("secret store response: {}", e)))?;

        // KV version 2 nests the secret under data.data
        let data = response
            .get("data")
            .and_then(|d| d.get("data"))
            .and_then(Value::as_object)
            .ok_or_else(Error::secret_not_found)?;

        select_key(data, &self.key)
    }
}

/// Pick the value at `key` out of secret data
///
/// String values come back verbatim, everything else as compact JSON.
fn select_key(data: &Map<String, Value>, key: &[String]) -> Result<Vec<u8>> {
    let Some((last, parents)) = key.split_last() else {
        return encode(data);
    };
    let not_found = || Error::key_not_found(key.join("/"));

    let mut current = data;
    for segment in parents {
        current = current
            .get(segment)
            .and_then(Value::as_object)
            .ok_or_else(not_found)?;
    }

    match current.get(last) {
        None | Some(Value::Null) => Err(not_found()),
        Some(Value::String(s)) => Ok(s.as_bytes().to_vec()),
        Some(other) => encode(other),
    }
}

fn encode<T: serde::Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| Error::internal(e.to_string()))
}
