//! Error types for the identity import core library.
//!
//! Each subsystem has its own error type derived with `thiserror`.
//! [`ImportError`] wraps the ones an import can run into.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue {
        field: String,
        detail: String,
    },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Webmail database errors
// ---------------------------------------------------------------------------

/// Errors from the SQLite webmail identity store.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Underlying rusqlite error.
    #[error("database error: {0}")]
    SqliteError(#[from] rusqlite::Error),

    /// A migration failed.
    #[error("database migration failed (version {version}): {detail}")]
    MigrationFailed {
        version: u32,
        detail: String,
    },

    /// A record was not found.
    #[error("{entity} not found: {id}")]
    NotFound {
        entity: String,
        id: String,
    },
}

// ---------------------------------------------------------------------------
// Legacy (Horde) database errors
// ---------------------------------------------------------------------------

/// Errors from talking to the legacy Horde preferences database.
#[derive(Debug, Error)]
pub enum LegacyError {
    /// The DSN string could not be parsed.
    #[error("invalid legacy DSN '{dsn}': {detail}")]
    InvalidDsn {
        dsn: String,
        detail: String,
    },

    /// The DSN names a driver this build cannot open.
    #[error("unsupported legacy database driver '{0}'")]
    UnsupportedDriver(String),

    /// Opening or authenticating the connection failed.
    #[error("failed to connect to legacy database: {0}")]
    ConnectionFailed(String),

    /// The preference lookup itself failed.
    #[error("legacy preference query failed: {0}")]
    QueryFailed(String),
}

// ---------------------------------------------------------------------------
// Blob decoding errors
// ---------------------------------------------------------------------------

/// Errors from decoding a serialized preference blob.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Input ended before a complete value was read.
    #[error("unexpected end of serialized data at byte {0}")]
    UnexpectedEof(usize),

    /// A byte that does not fit the serialize grammar.
    #[error("unexpected byte '{found}' at byte {offset}, expected {expected}")]
    UnexpectedByte {
        offset: usize,
        found: char,
        expected: &'static str,
    },

    /// A type tag the decoder refuses to handle (objects, references).
    #[error("unsupported serialized type '{tag}' at byte {offset}")]
    UnsupportedType {
        offset: usize,
        tag: char,
    },

    /// A length, integer or float that does not parse.
    #[error("invalid number at byte {offset}: {detail}")]
    InvalidNumber {
        offset: usize,
        detail: String,
    },

    /// String content is not UTF-8.
    #[error("string at byte {0} is not valid UTF-8")]
    InvalidUtf8(usize),

    /// Bytes remain after the top-level value.
    #[error("trailing data after serialized value at byte {0}")]
    TrailingData(usize),

    /// The decoded value does not have the shape of an identity list.
    #[error("unexpected identity data shape: {0}")]
    Shape(String),

    /// JSON-encoded preference that failed to parse.
    #[error("invalid JSON preference: {0}")]
    Json(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Import errors
// ---------------------------------------------------------------------------

/// Errors that abort an identity import before or during its writes.
#[derive(Debug, Error)]
pub enum ImportError {
    /// The login name yields no usable legacy key.
    #[error("cannot derive a legacy user key from username '{0}'")]
    InvalidUsername(String),

    /// The user has no webmail identity to receive the default record.
    #[error("user has no existing webmail identity to update")]
    NoDefaultIdentity,

    /// The legacy database was unreachable or the query failed.
    #[error("legacy source error: {0}")]
    Legacy(#[from] LegacyError),

    /// The preference blob could not be decoded.
    #[error("legacy identities could not be decoded: {0}")]
    Decode(#[from] DecodeError),

    /// The host identity store rejected a read or the default update.
    #[error("identity store error: {0}")]
    Store(#[from] DatabaseError),
}
