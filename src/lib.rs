//! `veiled` keeps identifying numbers and storage paths out of sight while they are
//! stored in a database or shown to users.
//!
//! It offers three things:
//!
//! - A reversible obfuscation of the digit runs (8 to 20 digits, such as ID card or
//!   phone numbers) embedded in free-form text, so they are not readable at rest.
//! - A one-way mask of the same runs for display.
//! - A binder that turns logical storage paths into absolute URLs, signed with an
//!   HMAC and a short-lived access token when signing is configured.
//!
//! The obfuscation is **not** encryption. It deters casual reading of stored values
//! but anyone who knows the scheme can reverse it.
//!
//! # Usage
//!
//! ## Column types (recommended)
//!
//! `Encrypted`, `StoragePath` and `StoragePaths` work with Diesel (Postgres) and
//! Serde, and route through the global configuration.
//!
//! ```
//! use veiled_rs::{Encrypted, StoragePath};
//!
//! #[derive(serde::Serialize)]
//! struct Person {
//!     pub id_number: Encrypted,
//!     pub avatar: StoragePath,
//! }
//!
//! let person = Person {
//!     id_number: Encrypted::from("110101199003078515"),
//!     avatar: StoragePath::from("avatars/7.png"),
//! };
//! assert_eq!(person.id_number.to_string(), "1101**********8515");
//! assert_eq!(person.id_number.encoded(), "8db649ba**52eda85!");
//! assert_eq!(
//!     serde_json::to_string(&person).unwrap(),
//!     "{\"id_number\":\"110101199003078515\",\"avatar\":\"/avatars/7.png\"}"
//! );
//! ```
//!
//! ## Low level API
//!
//! `Codec` obfuscates and masks strings, `Binder` binds paths.
//!
//! ```
//! use veiled_rs::{Binder, Codec, StorageConfig};
//!
//! let codec = Codec::new();
//! let encoded = codec.encode("tel 13812345678");
//! assert_eq!(encoded, "TEL dadb7*f0f8!");
//! assert_eq!(codec.decode(&encoded), "TEL 13812345678");
//!
//! let config = StorageConfig::new()
//!     .server_url("https://cdn.example.com")
//!     .unwrap();
//! let binder = Binder::new(&config);
//! assert_eq!(binder.sign("a/b.png"), "https://cdn.example.com/a/b.png");
//! ```
//!

mod cache;
mod codec;
mod config;
mod field;
mod mask;
mod split;
mod storage;

pub use cache::{MemoryCache, TokenCache};
pub use codec::{decode_run, encode_run, Codec, EncryptService, Error, MAX_RUN, MIN_RUN};
pub use config::{ConfigError, EncryptConfig, StorageConfig, DEFAULT_TOKEN_TTL};
pub use field::{Encrypted, StoragePath, StoragePaths};
pub use mask::{mask, mask_run};
pub use split::{split, split_regex, Segment, Segments};
pub use storage::{hmac_sha256_hex, Binder, StorageService, TOKEN_KEY};
