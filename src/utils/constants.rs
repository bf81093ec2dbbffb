/// Coordinate bounds (decimal degrees)
pub const MIN_LONGITUDE: f64 = -180.0;
pub const MAX_LONGITUDE: f64 = 180.0;
pub const MIN_LATITUDE: f64 = -90.0;
pub const MAX_LATITUDE: f64 = 90.0;

/// Upload line layout
pub const FIELD_SEPARATOR: char = ',';
pub const FIELDS_PER_LINE: usize = 3;

/// Multipart field carrying the uploaded batch
pub const UPLOAD_FIELD_NAME: &str = "file";

/// Header carrying the shared secret
pub const API_KEY_HEADER: &str = "x-api-key";

/// Defaults
pub const DEFAULT_DATABASE_PATH: &str = "data/dronitor.db";
pub const DEFAULT_CONFIG_FILE: &str = "dronitor.toml";
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
pub const DEFAULT_BUFFER_SIZE: usize = 8192 * 16; // 128KB
pub const SQLITE_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "DRONITOR";
