//! ID generation utilities.

use uuid::Uuid;

/// Generates a new time-ordered UUID v7 as a string.
///
/// This is the id format of every Strata entity: variables, environments,
/// folders and secret providers.
#[must_use]
pub fn generate_id() -> String {
    Uuid::now_v7().to_string()
}
