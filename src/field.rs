use std::fmt;

use diesel::deserialize::{self, FromSql, Queryable};
use diesel::expression::AsExpression;
use diesel::pg::{Pg, PgValue};
use diesel::serialize::{self, Output, ToSql};
use diesel::sql_types::{Array, Text};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{Binder, EncryptConfig};

/// A text column whose digit runs are obfuscated at rest.
///
/// Writing to the database stores the encoded form, reading decodes it again,
/// both through the global [`EncryptConfig`]. Serde sees the plain value.
/// `Display` shows the masked value, so logging an `Encrypted` does not leak it.
///
/// # Examples
///
/// ```
/// use veiled_rs::Encrypted;
///
/// let id = Encrypted::from("ID 110101199003078515");
/// assert_eq!(id.to_string(), "ID 1101**********8515");
/// assert_eq!(id.encoded(), "ID 8db649ba**52eda85!");
/// assert_eq!(serde_json::to_string(&id).unwrap(), "\"ID 110101199003078515\"");
/// ```
#[derive(AsExpression, Debug, Clone, Default, PartialEq, Eq)]
#[diesel(sql_type = Text)]
pub struct Encrypted(String);

impl Encrypted {
    pub fn value(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    /// Returns the form stored in the database.
    pub fn encoded(&self) -> String {
        EncryptConfig::global().service.encode(&self.0)
    }

    /// Builds a value from its stored form.
    pub fn from_encoded(encoded: &str) -> Self {
        Encrypted(EncryptConfig::global().service.decode(encoded))
    }

    pub fn masked(&self) -> String {
        EncryptConfig::global().service.mask(&self.0)
    }
}

impl From<String> for Encrypted {
    fn from(value: String) -> Self {
        Encrypted(value)
    }
}

impl From<&str> for Encrypted {
    fn from(value: &str) -> Self {
        Encrypted(value.to_string())
    }
}

impl fmt::Display for Encrypted {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.masked())
    }
}

impl Serialize for Encrypted {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Encrypted {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(Encrypted)
    }
}

impl ToSql<Text, Pg> for Encrypted {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        <String as ToSql<Text, Pg>>::to_sql(&self.encoded(), &mut out.reborrow())
    }
}

impl FromSql<Text, Pg> for Encrypted {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        let stored = <String as FromSql<Text, Pg>>::from_sql(bytes)?;
        Ok(Encrypted::from_encoded(&stored))
    }
}

impl Queryable<Text, Pg> for Encrypted {
    type Row = String;

    fn build(row: Self::Row) -> deserialize::Result<Self> {
        Ok(Encrypted::from_encoded(&row))
    }
}

/// A text column holding a storage path.
///
/// The database keeps the logical path. Serializing with Serde produces the
/// bound, possibly signed, URL from the global [`crate::StorageConfig`], and
/// deserializing accepts either form.
///
/// # Examples
///
/// ```
/// use veiled_rs::StoragePath;
///
/// let avatar = StoragePath::from("avatars/1.png");
/// assert_eq!(avatar.path(), "avatars/1.png");
/// assert_eq!(avatar.signed(), "/avatars/1.png");
/// ```
#[derive(AsExpression, Debug, Clone, Default, PartialEq, Eq)]
#[diesel(sql_type = Text)]
pub struct StoragePath(String);

impl StoragePath {
    /// Returns the logical path, without server URL or signature.
    pub fn path(&self) -> String {
        Binder::global().unsign(&self.0)
    }

    /// Returns the URL clients should use.
    pub fn signed(&self) -> String {
        Binder::global().sign(&self.0)
    }

    /// Uploads `data` through the global storage service and returns the stored
    /// path, or `None` when the upload was skipped or failed.
    pub fn upload(data: &[u8]) -> Option<StoragePath> {
        let stored = Binder::global().upload_file(data);
        if stored.is_empty() {
            None
        } else {
            Some(StoragePath::from(stored))
        }
    }

    fn unbound(value: &str) -> Self {
        StoragePath(Binder::global().unsign(value))
    }
}

impl From<String> for StoragePath {
    fn from(path: String) -> Self {
        StoragePath(path)
    }
}

impl From<&str> for StoragePath {
    fn from(path: &str) -> Self {
        StoragePath(path.to_string())
    }
}

impl fmt::Display for StoragePath {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.path())
    }
}

impl Serialize for StoragePath {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.signed())
    }
}

impl<'de> Deserialize<'de> for StoragePath {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bound = String::deserialize(deserializer)?;
        Ok(StoragePath::unbound(&bound))
    }
}

impl ToSql<Text, Pg> for StoragePath {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        <String as ToSql<Text, Pg>>::to_sql(&self.path(), &mut out.reborrow())
    }
}

impl FromSql<Text, Pg> for StoragePath {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        let stored = <String as FromSql<Text, Pg>>::from_sql(bytes)?;
        Ok(StoragePath::unbound(&stored))
    }
}

impl Queryable<Text, Pg> for StoragePath {
    type Row = String;

    fn build(row: Self::Row) -> deserialize::Result<Self> {
        Ok(StoragePath::unbound(&row))
    }
}

/// A `text[]` column of storage paths, handled element-wise like [`StoragePath`].
#[derive(AsExpression, Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[diesel(sql_type = Array<Text>)]
#[serde(transparent)]
pub struct StoragePaths(pub Vec<StoragePath>);

impl StoragePaths {
    /// Returns the logical paths.
    pub fn paths(&self) -> Vec<String> {
        self.0.iter().map(StoragePath::path).collect()
    }
}

impl From<Vec<StoragePath>> for StoragePaths {
    fn from(paths: Vec<StoragePath>) -> Self {
        StoragePaths(paths)
    }
}

impl ToSql<Array<Text>, Pg> for StoragePaths {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        <Vec<String> as ToSql<Array<Text>, Pg>>::to_sql(&self.paths(), &mut out.reborrow())
    }
}

impl FromSql<Array<Text>, Pg> for StoragePaths {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        let stored = <Vec<String> as FromSql<Array<Text>, Pg>>::from_sql(bytes)?;
        Ok(StoragePaths(
            stored.iter().map(|path| StoragePath::unbound(path)).collect(),
        ))
    }
}

impl Queryable<Array<Text>, Pg> for StoragePaths {
    type Row = Vec<String>;

    fn build(row: Self::Row) -> deserialize::Result<Self> {
        Ok(StoragePaths(
            row.iter().map(|path| StoragePath::unbound(path)).collect(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use crate::{StorageConfig, StorageService};

    // Tests touching the global storage configuration run one at a time.
    static GLOBAL_LOCK: Mutex<()> = Mutex::new(());

    struct FakeService {
        fetches: AtomicUsize,
    }

    impl StorageService for FakeService {
        fn get_token(&self, _config: &StorageConfig) -> String {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            "tok".to_string()
        }

        fn upload_file(&self, data: &[u8], _token: &str, _config: &StorageConfig) -> String {
            format!("uploads/{}.bin", data.len())
        }
    }

    fn with_signed_storage<F: FnOnce(&FakeService)>(test: F) {
        let _guard = GLOBAL_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let service = Arc::new(FakeService {
            fetches: AtomicUsize::new(0),
        });
        let config = StorageConfig::new()
            .signed(true)
            .server_url("https://cdn.example.com")
            .unwrap()
            .access_key("access")
            .signature_key("secret")
            .service(service.clone());
        StorageConfig::set_global(config);
        test(&service);
        StorageConfig::set_global(StorageConfig::new());
    }

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct Person {
        id_number: Encrypted,
        avatar: StoragePath,
    }

    #[test]
    fn test_encrypted() {
        let value = Encrypted::from("CARD 6222021234567890123");
        assert_eq!(value.encoded(), "CARD 510c75a8**ef117653!");
        assert_eq!(value.to_string(), "CARD 6222***********0123");
        assert_eq!(Encrypted::from_encoded("CARD 510c75a8**ef117653!"), value);
        assert_eq!(value.into_inner(), "CARD 6222021234567890123");
    }

    #[test]
    fn test_encrypted_serde() {
        let value: Encrypted = serde_json::from_str("\"13812345678\"").unwrap();
        assert_eq!(value.value(), "13812345678");
        assert_eq!(serde_json::to_string(&value).unwrap(), "\"13812345678\"");
        assert_eq!(format!("{}", value), "1381***5678");
    }

    #[test]
    fn test_storage_path_unsigned() {
        let _guard = GLOBAL_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let path = StoragePath::from("a/b.png");
        assert_eq!(path.signed(), "/a/b.png");
        assert_eq!(path.path(), "a/b.png");
        assert_eq!(StoragePath::upload(b"data"), None);
    }

    #[test]
    fn test_storage_path_signed() {
        with_signed_storage(|service| {
            let path = StoragePath::from("/a/b.png");
            let url = path.signed();
            assert_eq!(
                url,
                "https://cdn.example.com/a/b.png?tok,\
                 54000778c832e7a981f05f5a8688c7893ba41eceaaf548d448de22ce7e9da92e"
            );
            assert_eq!(StoragePath::from(url.as_str()).path(), "/a/b.png");
            assert_eq!(path.to_string(), "/a/b.png");

            path.signed();
            assert_eq!(service.fetches.load(Ordering::SeqCst), 1);
        });
    }

    #[test]
    fn test_person_serde() {
        with_signed_storage(|_| {
            let person = Person {
                id_number: Encrypted::from("110101199003078515"),
                avatar: StoragePath::from("/avatars/7.png"),
            };
            let json = serde_json::to_string(&person).unwrap();
            assert!(json.contains("\"id_number\":\"110101199003078515\""));
            assert!(json.contains("\"avatar\":\"https://cdn.example.com/avatars/7.png?tok,"));

            let back: Person = serde_json::from_str(&json).unwrap();
            assert_eq!(back, person);
        });
    }

    #[test]
    fn test_storage_paths() {
        with_signed_storage(|_| {
            let paths = StoragePaths::from(vec![
                StoragePath::from("/a.png"),
                StoragePath::from("https://cdn.example.com/b.png?old,sig"),
            ]);
            assert_eq!(paths.paths(), vec!["/a.png", "/b.png"]);

            let json = serde_json::to_string(&paths).unwrap();
            assert!(json.starts_with("[\"https://cdn.example.com/a.png?tok,"));
            let back: StoragePaths = serde_json::from_str(&json).unwrap();
            assert_eq!(back.paths(), vec!["/a.png", "/b.png"]);
        });
    }

    #[test]
    fn test_upload() {
        with_signed_storage(|_| {
            assert_eq!(
                StoragePath::upload(b"hello"),
                Some(StoragePath::from("uploads/5.bin"))
            );
        });
    }
}
