//! Binding of logical storage paths to absolute, optionally signed, URLs.
//!
//! A signed URL has the form `<server-url><path>?<token>,<signature>` where the
//! signature is the hex encoded HMAC-SHA256 of the path under the configured
//! signature key. The token comes from a [`StorageService`] and is cached for the
//! configured TTL.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::config::StorageConfig;

type HmacSha256 = Hmac<Sha256>;

/// Cache key of the storage token. There is a single token per configuration.
pub const TOKEN_KEY: &str = "token";

/// Issues access tokens and stores uploaded files.
///
/// Both methods report failure with an empty string.
pub trait StorageService: Send + Sync {
    /// Fetches a fresh access token.
    fn get_token(&self, config: &StorageConfig) -> String;

    /// Uploads `data` and returns its path or URL.
    fn upload_file(&self, data: &[u8], token: &str, config: &StorageConfig) -> String;
}

/// Returns the lowercase hex HMAC-SHA256 of `data` under `key`.
pub fn hmac_sha256_hex(key: &[u8], data: &[u8]) -> String {
    let mut hmac = HmacSha256::new_from_slice(key).expect("HMAC should accept any key length");
    hmac.update(data);
    hex::encode(hmac.finalize().into_bytes())
}

/// Turns storage paths into URLs and back.
///
/// # Examples
///
/// ```
/// use veiled_rs::{Binder, StorageConfig};
///
/// let config = StorageConfig::new().server_url("https://cdn.example.com").unwrap();
/// let binder = Binder::new(&config);
///
/// assert_eq!(binder.sign("a/b.png"), "https://cdn.example.com/a/b.png");
/// assert_eq!(binder.unsign("https://cdn.example.com/a/b.png?t,00ff"), "/a/b.png");
/// ```
#[derive(Debug, Clone)]
pub struct Binder {
    config: StorageConfig,
}

impl Binder {
    pub fn new(config: &StorageConfig) -> Binder {
        Binder {
            config: config.clone(),
        }
    }

    /// Creates a binder from the global [`StorageConfig`].
    pub fn global() -> Binder {
        Binder {
            config: StorageConfig::global(),
        }
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// True when signing is switched on and every signing parameter is set.
    pub fn is_signing_enabled(&self) -> bool {
        let config = &self.config;
        config.signed
            && !config.server_url.is_empty()
            && !config.bucket_name.is_empty()
            && !config.access_key.is_empty()
            && !config.signature_key.is_empty()
    }

    fn server(&self) -> &str {
        let url = self.config.server_url.as_str();
        url.strip_suffix('/').unwrap_or(url)
    }

    /// Binds `path` to the server URL, adding a token and signature when signing
    /// is enabled and a token is available.
    ///
    /// Any existing binding on `path` is removed first, so signing a signed URL
    /// signs its path again. An empty path stays empty.
    pub fn sign(&self, path: &str) -> String {
        let path = self.unsign(path);
        if path.is_empty() {
            return path;
        }
        let path = format!("/{}", path.strip_prefix('/').unwrap_or(&path));

        if self.is_signing_enabled() {
            let token = self.token();
            if !token.is_empty() {
                let signature =
                    hmac_sha256_hex(self.config.signature_key.as_bytes(), path.as_bytes());
                return format!("{}{}?{},{}", self.server(), path, token, signature);
            }
            tracing::debug!(path = %path, "No storage token, binding unsigned");
        }

        format!("{}{}", self.server(), path)
    }

    /// Strips the query and the server URL from `bound`, returning the path.
    ///
    /// The signature is not verified.
    pub fn unsign(&self, bound: &str) -> String {
        let path = bound.split('?').next().unwrap_or_default();
        let server = self.server();
        if !server.is_empty() {
            if let Some(rest) = path.strip_prefix(server) {
                if rest.is_empty() || rest.starts_with('/') {
                    return rest.to_string();
                }
            }
        }
        path.to_string()
    }

    /// Returns the cached token, fetching and caching a new one on a miss.
    ///
    /// An empty string means no token is available. Empty tokens are not cached.
    pub fn token(&self) -> String {
        if let Some(token) = self.config.cache.get(TOKEN_KEY) {
            return token;
        }
        let service = match &self.config.service {
            Some(service) => service,
            None => return String::new(),
        };

        let token = service.get_token(&self.config);
        if !token.is_empty() {
            self.config.cache.set(TOKEN_KEY, token.clone(), self.config.ttl);
            tracing::debug!(
                bucket = %self.config.bucket_name,
                ttl = ?self.config.ttl,
                "Cached storage token"
            );
        }
        token
    }

    /// Uploads `data` through the storage service.
    ///
    /// Returns an empty string when no token is available or the upload fails.
    pub fn upload_file(&self, data: &[u8]) -> String {
        let token = self.token();
        match &self.config.service {
            Some(service) if !token.is_empty() => service.upload_file(data, &token, &self.config),
            _ => {
                tracing::warn!(
                    bucket = %self.config.bucket_name,
                    size = data.len(),
                    "Upload skipped, no storage token"
                );
                String::new()
            }
        }
    }
}
