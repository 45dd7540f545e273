/// Application constants
///
/// Hardcoded values used throughout the worker, organized by category.
// ============================================================================
// Message Format Constants
// ============================================================================

/// Source identifier attached to structured log lines
pub const SOURCE_NAME: &str = "notify-worker";

// ============================================================================
// Timing Constants
// ============================================================================

/// Idempotency record TTL in seconds (24 hours)
pub const IDEMPOTENCY_TTL_SECONDS: u64 = 86400;

/// Broker connect retry interval in seconds
pub const AMQP_CONNECT_RETRY_SECONDS: u64 = 5;

/// Default consumer prefetch count
pub const DEFAULT_PREFETCH_COUNT: u16 = 10;

// ============================================================================
// Retry Configuration
// ============================================================================

/// Maximum number of broker-level retries before dead-lettering
pub const MAX_RETRIES: u32 = 5;

/// Default retry-queue TTL in milliseconds (delayed redelivery window)
pub const DEFAULT_RETRY_DELAY_MS: u64 = 30_000;

/// Base delay for internal (non-message-level) exponential backoff, in milliseconds
pub const RETRY_BASE_DELAY_MS: u64 = 1000;

/// Maximum delay for internal exponential backoff in milliseconds (5 minutes)
pub const RETRY_MAX_DELAY_MS: u64 = 5 * 60 * 1000;

/// Jitter factor for internal retry delays (0.0 to 1.0)
pub const RETRY_JITTER_FACTOR: f64 = 0.1;

// ============================================================================
// Validation Constants
// ============================================================================

/// Email validation regex (RFC 5322 simplified)
pub const EMAIL_REGEX_PATTERN: &str =
    r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$";

// ============================================================================
// Testing Constants
// ============================================================================
