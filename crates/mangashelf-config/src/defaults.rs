//! Default values applied when a variable is unset.

/// Directory holding downloaded galleries.
pub const LIBRARY_ROOT: &str = "./data/directories";
/// Database holding the key-value store and the queue table.
pub const DATABASE_URL: &str = "sqlite://./data/mangashelf.db";
/// Log level when neither the variable nor `RUST_LOG` is set.
pub const LOG_LEVEL: &str = "info";
/// Background queue delay between items, in milliseconds.
pub const QUEUE_DELAY_MS: u64 = 100;
/// HTTP client timeout, in seconds.
pub const HTTP_TIMEOUT_SECS: u64 = 30;
/// Pages transferred concurrently per batch.
pub const BATCH_SIZE: usize = 3;
/// Attempts allowed per batch before a download fails.
pub const RETRY_BUDGET: usize = 3;
/// `AniList` GraphQL endpoint.
pub const METADATA_URL: &str = "https://graphql.anilist.co/";
