//! Record identifiers.

use uuid::Uuid;

/// Generates a new, globally unique record identifier.
///
/// Corresponds to the original source's `guid.NewString()` call at record
/// creation time; a v4 UUID is the idiomatic Rust equivalent.
pub fn new_record_id() -> Uuid {
	Uuid::new_v4()
}
