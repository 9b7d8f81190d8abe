use serde::{Deserialize, Serialize};
use std::cmp::Reverse;

/// One DNS SRV answer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SrvRecord {
    pub priority: u16,
    pub weight: u16,
    pub port: u16,
    /// Target host without the trailing root dot.
    pub target: String,
}

impl SrvRecord {
    pub fn new(priority: u16, weight: u16, port: u16, target: impl Into<String>) -> Self {
        let target = target.into();
        let target = match target.strip_suffix('.') {
            Some(stripped) if !stripped.is_empty() => stripped.to_string(),
            _ => target,
        };
        Self {
            priority,
            weight,
            port,
            target,
        }
    }
}

/// Orders records by ascending priority, then descending weight.
///
/// The sort is stable: records with equal priority and weight keep their
/// answer order.
pub fn rank(mut records: Vec<SrvRecord>) -> Vec<SrvRecord> {
    records.sort_by_key(|record| (record.priority, Reverse(record.weight)));
    records
}

/// The record a service resolves to, if any.
pub fn top_ranked(records: Vec<SrvRecord>) -> Option<SrvRecord> {
    rank(records).into_iter().next()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn targets(records: &[SrvRecord]) -> Vec<&str> {
        records.iter().map(|r| r.target.as_str()).collect()
    }

    #[test]
    fn test_priority_then_weight() {
        let ranked = rank(vec![
            SrvRecord::new(20, 5, 1, "C"),
            SrvRecord::new(10, 5, 1, "B"),
            SrvRecord::new(10, 9, 1, "A"),
        ]);
        assert_eq!(targets(&ranked), ["A", "B", "C"]);
    }

    #[test]
    fn test_lower_priority_beats_higher_weight() {
        let top = top_ranked(vec![
            SrvRecord::new(20, 100, 1, "heavy"),
            SrvRecord::new(10, 1, 1, "preferred"),
        ]);
        assert_eq!(top.unwrap().target, "preferred");
    }

    #[test]
    fn test_ties_keep_answer_order() {
        let ranked = rank(vec![
            SrvRecord::new(10, 5, 27017, "foo.example.com"),
            SrvRecord::new(10, 5, 27017, "bar.example.com"),
        ]);
        assert_eq!(targets(&ranked), ["foo.example.com", "bar.example.com"]);
    }

    #[test]
    fn test_empty_answer_has_no_top() {
        assert!(top_ranked(Vec::new()).is_none());
    }

    #[test]
    fn test_trailing_dot_stripped() {
        assert_eq!(SrvRecord::new(1, 1, 1, "db.example.com.").target, "db.example.com");
        assert_eq!(SrvRecord::new(1, 1, 1, ".").target, ".");
    }
}
