//! Fixed protocol constants that should NOT be changed.
//!
//! These values are part of the wire contract between the hub and its
//! clients; changing them silently breaks deployed clients.

// ─────────────────────────────────────────────────────────────────────────────
// Connection Keep-Alive
// ─────────────────────────────────────────────────────────────────────────────

/// Maximum time to wait for any inbound frame before the connection is
/// considered dead (seconds). Pong frames count as activity.
pub const PONG_WAIT_SECS: u64 = 60;

/// Interval between keep-alive pings (seconds).
///
/// Must be shorter than [`PONG_WAIT_SECS`] so a healthy client always has a
/// ping to answer before its deadline expires.
pub const PING_PERIOD_SECS: u64 = PONG_WAIT_SECS * 9 / 10;

/// Upper bound on a single socket write (seconds).
pub const WRITE_WAIT_SECS: u64 = 10;

// ─────────────────────────────────────────────────────────────────────────────
// Message Limits
// ─────────────────────────────────────────────────────────────────────────────

/// Maximum inbound frame size (bytes). Commands are tiny; anything larger
/// is a misbehaving client and terminates the connection.
pub const MAX_MESSAGE_SIZE: usize = 4096;

/// Capacity of each participant's outbound send queue.
///
/// Enqueues are non-blocking; when the queue is full the message is dropped.
/// Every `state` message is a complete snapshot, so a dropped broadcast is
/// subsumed by the next one.
pub const SEND_QUEUE_CAPACITY: usize = 16;

// ─────────────────────────────────────────────────────────────────────────────
// Session Lifecycle
// ─────────────────────────────────────────────────────────────────────────────

/// How long an empty session is kept alive waiting for a reconnect (seconds).
pub const GRACE_PERIOD_SECS: u64 = 30;

// ─────────────────────────────────────────────────────────────────────────────
// Streaming Tokens
// ─────────────────────────────────────────────────────────────────────────────

/// Lifetime of a minted stream token (seconds). Sessions are ephemeral, so
/// 24 hours comfortably outlives any live session.
pub const STREAM_TOKEN_TTL_SECS: u64 = 24 * 60 * 60;

// ─────────────────────────────────────────────────────────────────────────────
// Library Search
// ─────────────────────────────────────────────────────────────────────────────

/// Maximum number of results returned by the in-session library search.
pub const SEARCH_RESULT_LIMIT: usize = 20;
