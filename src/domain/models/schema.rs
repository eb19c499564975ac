//! Schema namespace domain models.
//!
//! Every run of the sink writes into its own Postgres schema. Names follow
//! `<prefix><N>` and only ever advance.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::errors::{DomainError, DomainResult};

/// Suffix used when a network has never been provisioned.
pub const INITIAL_SCHEMA_SUFFIX: u64 = 1;

/// The active namespace of one network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSchema {
    pub network: String,
    pub schema_name: String,
    pub created_at: DateTime<Utc>,
}

/// Shape of the per-namespace cursor table. Rows are written by the sink binary only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorRecord {
    pub id: String,
    pub cursor: String,
    pub block_num: i64,
    pub block_id: String,
}

/// Name used for the first namespace of a network.
pub fn initial_schema(prefix: &str) -> String {
    format!("{prefix}{INITIAL_SCHEMA_SUFFIX}")
}

/// Split a schema name into its prefix and trailing number.
pub fn split_schema(schema: &str) -> Option<(&str, u64)> {
    let prefix = schema.trim_end_matches(|c: char| c.is_ascii_digit());
    let digits = &schema[prefix.len()..];
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok().map(|n| (prefix, n))
}

/// Advance the trailing number of a schema name: `dcl7` becomes `dcl8`.
pub fn increment_schema(schema: &str) -> DomainResult<String> {
    let (prefix, number) =
        split_schema(schema).ok_or_else(|| DomainError::InvalidSchema(schema.to_string()))?;
    let next = number
        .checked_add(1)
        .ok_or_else(|| DomainError::InvalidSchema(schema.to_string()))?;
    Ok(format!("{prefix}{next}"))
}

/// Name of the next namespace for a network.
///
/// Starts from the registry's `latest` name (or the initial name when there
/// is none) and moves past any `existing` namespace with the same prefix, so
/// a namespace left behind by a failed allocation is never reused.
pub fn next_schema(prefix: &str, latest: Option<&str>, existing: &[String]) -> DomainResult<String> {
    let candidate = match latest {
        Some(name) => increment_schema(name)?,
        None => initial_schema(prefix),
    };
    let Some((candidate_prefix, mut number)) = split_schema(&candidate) else {
        return Err(DomainError::InvalidSchema(candidate.clone()));
    };

    for (name_prefix, taken) in existing.iter().filter_map(|name| split_schema(name)) {
        if name_prefix == candidate_prefix && taken >= number {
            number = taken
                .checked_add(1)
                .ok_or_else(|| DomainError::InvalidSchema(format!("{name_prefix}{taken}")))?;
        }
    }

    Ok(format!("{candidate_prefix}{number}"))
}

/// True when `name` can be interpolated as an unquoted Postgres identifier.
pub fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() || c == '_' => {}
        _ => return false,
    }
    name.len() <= 63 && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_increment_schema() {
        assert_eq!(increment_schema("dcl7").unwrap(), "dcl8");
        assert_eq!(increment_schema("dcl9").unwrap(), "dcl10");
        assert_eq!(increment_schema("a1b22").unwrap(), "a1b23");
    }

    #[test]
    fn test_increment_schema_without_digits() {
        let err = increment_schema("dcl").unwrap_err();
        assert!(matches!(err, DomainError::InvalidSchema(ref s) if s == "dcl"));
        assert!(err.to_string().contains("Invalid schema"));
    }

    #[test]
    fn test_increment_schema_overflow() {
        let name = format!("dcl{}", u64::MAX);
        assert!(increment_schema(&name).is_err());
    }

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_next_schema_initial() {
        assert_eq!(next_schema("dcl", None, &[]).unwrap(), "dcl1");
    }

    #[test]
    fn test_next_schema_follows_registry() {
        assert_eq!(next_schema("dcl", Some("dcl7"), &names(&["dcl7"])).unwrap(), "dcl8");
    }

    #[test]
    fn test_next_schema_skips_orphans() {
        // registry says dcl3, but dcl5 was left behind by a failed allocation
        let existing = names(&["dcl3", "dcl5", "dcl4"]);
        assert_eq!(next_schema("dcl", Some("dcl3"), &existing).unwrap(), "dcl6");
        assert_eq!(next_schema("dcl", None, &names(&["dcl1"])).unwrap(), "dcl2");
    }

    #[test]
    fn test_next_schema_ignores_other_prefixes() {
        let existing = names(&["other40", "public", "dcl2"]);
        assert_eq!(next_schema("dcl", Some("dcl2"), &existing).unwrap(), "dcl3");
    }

    #[test]
    fn test_next_schema_invalid_registry_name() {
        assert!(matches!(
            next_schema("dcl", Some("broken"), &[]),
            Err(DomainError::InvalidSchema(_))
        ));
    }

    #[test]
    fn test_is_plain_identifier() {
        assert!(is_plain_identifier("dcl12"));
        assert!(is_plain_identifier("_x"));
        assert!(!is_plain_identifier("1dcl"));
        assert!(!is_plain_identifier("dcl; drop"));
        assert!(!is_plain_identifier("DCL"));
        assert!(!is_plain_identifier(""));
    }

    proptest! {
        #[test]
        fn prop_increment_is_strictly_increasing(prefix in "[a-z_]{1,8}", n in 0u64..1_000_000) {
            let name = format!("{prefix}{n}");
            let next = increment_schema(&name).unwrap();
            let (next_prefix, next_n) = split_schema(&next).unwrap();
            prop_assert_eq!(next_prefix, prefix.as_str());
            prop_assert_eq!(next_n, n + 1);
        }

        #[test]
        fn prop_repeated_allocation_never_reuses(steps in 1usize..50) {
            let mut seen = std::collections::HashSet::new();
            let mut current = initial_schema("dcl");
            seen.insert(current.clone());
            for _ in 0..steps {
                current = increment_schema(&current).unwrap();
                prop_assert!(seen.insert(current.clone()));
            }
        }
    }
}
