//! Shared constants for end-to-end tests

// ============================================================================
// Timing
// ============================================================================

/// Quiet period of the debounce gates in tests
pub const DEBOUNCE_MS: u64 = 50;

/// Simulated link analysis delay in tests
pub const LINK_DELAY_MS: u64 = 10;

/// Maximum time to wait for server to become ready
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// Polling interval when waiting for server or state changes
pub const POLL_INTERVAL_MS: u64 = 10;

/// Maximum time to wait for the controller to reach a state
pub const STATE_TIMEOUT_MS: u64 = 5000;

/// HTTP request timeout for test client
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

// ============================================================================
// Generated content
// ============================================================================

/// Genre the fake service always answers with
pub const GENERATED_GENRE: &str = "Techno";

/// Tags the fake service always answers with
pub const GENERATED_TAGS: &str = "techno, warehouse, night";

/// A tiny PNG signature, enough for MIME sniffing
pub const PNG_BYTES: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52,
];

/// A tiny JPEG signature, used for user-uploaded covers
pub const JPEG_BYTES: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46, 0x49, 0x46];
