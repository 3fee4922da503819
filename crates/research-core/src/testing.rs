//! Small deterministic test helpers, mirroring the teacher's
//! `dashflow-testing` crate (`MockTool`, `MockEmbeddings`): a fixed clock and
//! a stable id generator so orchestrator tests are reproducible.

use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

/// A fixed instant used in place of `Utc::now()` in deterministic tests.
#[must_use]
pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
}

/// Deterministic UUID derived from a seed string, for tests that need
/// stable identifiers across runs without depending on random state.
#[must_use]
pub fn deterministic_uuid(seed: &str) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, seed.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_uuid_is_stable() {
        assert_eq!(deterministic_uuid("a"), deterministic_uuid("a"));
        assert_ne!(deterministic_uuid("a"), deterministic_uuid("b"));
    }
}
