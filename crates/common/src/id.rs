//! ID generation utilities.

use ulid::Ulid;

/// ID generator for reports, tips and other entities.
#[derive(Debug, Clone, Default)]
pub struct IdGenerator {
    _private: (),
}

impl IdGenerator {
    /// Create a new ID generator.
    #[must_use]
    pub const fn new() -> Self {
        Self { _private: () }
    }

    /// Generate a new ULID-based ID.
    ///
    /// ULIDs are lexicographically sortable and shorter than UUIDs when
    /// represented as strings.
    #[must_use]
    pub fn generate(&self) -> String {
        Ulid::new().to_string().to_lowercase()
    }

    /// Generate a ULID-based ID with a short kind prefix, e.g. `tip_01h...`.
    #[must_use]
    pub fn generate_prefixed(&self, prefix: &str) -> String {
        format!("{prefix}_{}", self.generate())
    }
}

/// Deterministic ID of a timeline event, derived from its report and sequence.
#[must_use]
pub fn timeline_event_id(report_id: &str, seq: i64) -> String {
    format!("{report_id}:{seq:06}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_ulid() {
        let id_gen = IdGenerator::new();
        let id1 = id_gen.generate();
        let id2 = id_gen.generate();

        assert_eq!(id1.len(), 26);
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_generate_prefixed() {
        let id = IdGenerator::new().generate_prefixed("tip");
        assert!(id.starts_with("tip_"));
        assert_eq!(id.len(), 30);
    }

    #[test]
    fn test_timeline_event_ids_sort_by_sequence() {
        let a = timeline_event_id("rpt_1", 9);
        let b = timeline_event_id("rpt_1", 10);
        assert!(a < b);
    }
}
