use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use once_cell::sync::Lazy;

use crate::cache::{MemoryCache, TokenCache};
use crate::codec::{Codec, EncryptService};
use crate::storage::StorageService;

static GLOBAL_ENCRYPT: Lazy<RwLock<EncryptConfig>> =
    Lazy::new(|| RwLock::new(EncryptConfig::default()));

static GLOBAL_STORAGE: Lazy<RwLock<StorageConfig>> =
    Lazy::new(|| RwLock::new(StorageConfig::default()));

/// Default lifetime of a cached storage token.
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, PartialEq)]
pub enum ConfigError {
    InvalidServerUrl(String),
    InvalidTtl,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConfigError::InvalidServerUrl(url) => {
                write!(f, "Server URL {:?} must start with http:// or https://", url)
            }
            ConfigError::InvalidTtl => {
                write!(f, "Token TTL must be greater than zero")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Selects the obfuscation strategy used by [`crate::Encrypted`].
#[derive(Clone)]
pub struct EncryptConfig {
    pub service: Arc<dyn EncryptService>,
}

impl Default for EncryptConfig {
    fn default() -> Self {
        EncryptConfig {
            service: Arc::new(Codec::new()),
        }
    }
}

impl fmt::Debug for EncryptConfig {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("EncryptConfig").finish_non_exhaustive()
    }
}

impl EncryptConfig {
    pub fn new(service: Arc<dyn EncryptService>) -> Self {
        EncryptConfig { service }
    }

    /// Sets the global configuration. This should be called once at start-up, before
    /// the column types are used.
    pub fn set_global(config: EncryptConfig) {
        let mut global = GLOBAL_ENCRYPT
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *global = config;
    }

    /// Returns the global configuration, which uses [`Codec`] unless replaced.
    pub fn global() -> EncryptConfig {
        GLOBAL_ENCRYPT
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Settings for binding storage paths to signed URLs.
///
/// The cache and service are shared, so clones of a configuration share one
/// cached token.
#[derive(Clone)]
pub struct StorageConfig {
    pub signed: bool,
    pub server_url: String,
    pub bucket_name: String,
    pub access_key: String,
    pub signature_key: String,
    pub ttl: Duration,
    pub cache: Arc<dyn TokenCache>,
    pub service: Option<Arc<dyn StorageService>>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            signed: false,
            server_url: String::new(),
            bucket_name: "app".to_string(),
            access_key: String::new(),
            signature_key: String::new(),
            ttl: DEFAULT_TOKEN_TTL,
            cache: Arc::new(MemoryCache::new()),
            service: None,
        }
    }
}

impl fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("StorageConfig")
            .field("signed", &self.signed)
            .field("server_url", &self.server_url)
            .field("bucket_name", &self.bucket_name)
            .field("access_key", &self.access_key)
            .field("signature_key", &"<redacted>")
            .field("ttl", &self.ttl)
            .field("service", &self.service.is_some())
            .finish()
    }
}

impl StorageConfig {
    /// Creates an unsigned configuration with the bucket `app`, a five minute token
    /// TTL, an in-memory cache and no storage service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Turns URL signing on or off. Signing also needs all keys to be set.
    pub fn signed(mut self, signed: bool) -> Self {
        self.signed = signed;
        self
    }

    /// Sets the URL prepended to storage paths.
    /// The value must be empty or start with `http://` or `https://`.
    pub fn server_url(mut self, server_url: &str) -> Result<Self, ConfigError> {
        if !server_url.is_empty()
            && !server_url.starts_with("http://")
            && !server_url.starts_with("https://")
        {
            return Err(ConfigError::InvalidServerUrl(server_url.to_string()));
        }
        self.server_url = server_url.to_string();
        Ok(self)
    }

    pub fn bucket_name(mut self, bucket_name: &str) -> Self {
        self.bucket_name = bucket_name.to_string();
        self
    }

    pub fn access_key(mut self, access_key: &str) -> Self {
        self.access_key = access_key.to_string();
        self
    }

    /// Sets the HMAC key used to sign paths.
    pub fn signature_key(mut self, signature_key: &str) -> Self {
        self.signature_key = signature_key.to_string();
        self
    }

    /// Sets how long a fetched token stays cached. Must be non-zero.
    pub fn ttl(mut self, ttl: Duration) -> Result<Self, ConfigError> {
        if ttl.is_zero() {
            Err(ConfigError::InvalidTtl)
        } else {
            self.ttl = ttl;
            Ok(self)
        }
    }

    pub fn cache(mut self, cache: Arc<dyn TokenCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Sets the service that issues tokens and uploads files.
    pub fn service(mut self, service: Arc<dyn StorageService>) -> Self {
        self.service = Some(service);
        self
    }

    /// Sets the global configuration. This should be called once at start-up.
    ///
    /// Replacing the configuration while other threads bind paths is allowed but
    /// the caller decides which configuration those calls see.
    pub fn set_global(config: StorageConfig) {
        let mut global = GLOBAL_STORAGE
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *global = config;
    }

    /// Returns the global configuration, or the defaults if none was set.
    pub fn global() -> StorageConfig {
        GLOBAL_STORAGE
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
