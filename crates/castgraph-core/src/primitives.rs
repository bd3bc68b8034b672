//! # Engine Primitives
//!
//! Hardcoded runtime constants for the Castgraph engine.
//!
//! These are compiled into the binary and immutable at runtime.

/// Network expansion depth used when the caller gives none, or zero.
pub const DEFAULT_NETWORK_DEPTH: usize = 2;

/// Maximum traversal depth for network expansion.
///
/// - All queries must be computationally bounded.
/// - Larger requested depths are clamped to this value.
pub const MAX_TRAVERSAL_DEPTH: usize = 100;

/// Lowest allowed relationship intensity.
pub const MIN_INTENSITY: u8 = 1;

/// Highest allowed relationship intensity.
pub const MAX_INTENSITY: u8 = 5;

/// Intensity given to relationships created without one.
pub const DEFAULT_INTENSITY: u8 = 3;

/// How many times a compensating rollback is attempted before the engine
/// gives up and reports a consistency fault.
pub const ROLLBACK_ATTEMPTS: usize = 3;

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Maximum length for character names, in bytes.
pub const MAX_NAME_LENGTH: usize = 256;

/// Maximum length for relationship and character descriptions, in bytes.
pub const MAX_DESCRIPTION_LENGTH: usize = 4096;

/// Maximum number of edges a single character may hold.
///
/// Bounds the per-node work of every traversal step.
pub const MAX_EDGES_PER_CHARACTER: usize = 1024;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_depth_within_bound() {
        assert!(DEFAULT_NETWORK_DEPTH <= MAX_TRAVERSAL_DEPTH);
        assert!(DEFAULT_NETWORK_DEPTH > 0);
    }

    #[test]
    fn intensity_range_is_consistent() {
        assert!(MIN_INTENSITY <= DEFAULT_INTENSITY);
        assert!(DEFAULT_INTENSITY <= MAX_INTENSITY);
    }
}
