//! Image tag generation
//!
//! Every successful build publishes under three tags: the mutable `latest`,
//! an immutable fixed-width timestamp tag, and an immutable short-revision
//! tag. Timestamp tags sort lexicographically in build order; revision tags
//! are stable across rebuilds of the same revision.

pub mod ledger;

pub use ledger::RevisionLedger;

use crate::error::{DrydockError, DrydockResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The mutable tag, always overwritten to point at the newest build
pub const LATEST: &str = "latest";

/// Short revision tag length. Seven hex characters match the short form
/// used in commit references and are checked against the ledger for
/// collisions rather than trusted blindly.
pub const SHORT_REVISION_LEN: usize = 7;

/// The three tags associated with one built image, in publish order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagSet {
    /// Constant literal "latest"
    pub latest: String,
    /// UTC timestamp, `YYYYMMDDHHMMSS`, fixed width
    pub date: String,
    /// Short form of the source revision id
    pub revision: String,
}

impl TagSet {
    /// Derive the tag set for a build of `revision` at `now`.
    ///
    /// Pure function of its inputs: the same revision always yields the same
    /// revision tag, and two builds in the same clock-second share a date
    /// tag. Collision detection against other revisions is the ledger's job.
    pub fn generate(now: DateTime<Utc>, revision: &str) -> DrydockResult<Self> {
        Ok(Self {
            latest: LATEST.to_string(),
            date: date_tag(now),
            revision: short_revision(revision)?,
        })
    }

    /// Tags in publish order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        [
            self.latest.as_str(),
            self.date.as_str(),
            self.revision.as_str(),
        ]
        .into_iter()
    }
}

/// Fixed-width, lexicographically sortable UTC timestamp tag
pub fn date_tag(now: DateTime<Utc>) -> String {
    now.format("%Y%m%d%H%M%S").to_string()
}

/// Shorten a revision id to its tag form.
///
/// Requires at least `SHORT_REVISION_LEN` characters; truncating anything
/// shorter would manufacture tags that never appeared in revision history.
pub fn short_revision(revision: &str) -> DrydockResult<String> {
    let trimmed = revision.trim();
    if trimmed.len() < SHORT_REVISION_LEN {
        return Err(DrydockError::RevisionTooShort(trimmed.to_string()));
    }
    if !trimmed.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(DrydockError::RepositoryInvalid {
            name: trimmed.to_string(),
            reason: "revision id must be hexadecimal".to_string(),
        });
    }
    Ok(trimmed[..SHORT_REVISION_LEN].to_ascii_lowercase())
}

/// Case-fold a repository fully-qualified name into a registry namespace.
///
/// Registries reject uppercase path components, so `Org/Repo` must become
/// `org/repo` before any reference is formed.
pub fn fold_namespace(repo: &str) -> DrydockResult<String> {
    let folded = repo.trim().to_ascii_lowercase();

    let valid_part = |p: &str| {
        !p.is_empty()
            && p.chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    };

    let parts: Vec<&str> = folded.split('/').collect();
    if parts.len() < 2 || !parts.iter().all(|p| valid_part(p)) {
        return Err(DrydockError::RepositoryInvalid {
            name: repo.to_string(),
            reason: "expected owner/name with alphanumeric components".to_string(),
        });
    }

    Ok(folded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn date_tag_fixed_width() {
        let t = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        assert_eq!(date_tag(t), "20240301100000");
        assert_eq!(date_tag(t).len(), 14);
    }

    #[test]
    fn date_tags_sort_lexicographically() {
        let t1 = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        let t2 = Utc.with_ymd_and_hms(2024, 3, 1, 11, 0, 0).unwrap();
        let t3 = Utc.with_ymd_and_hms(2024, 12, 31, 23, 59, 59).unwrap();
        assert!(date_tag(t1) < date_tag(t2));
        assert!(date_tag(t2) < date_tag(t3));
    }

    #[test]
    fn revision_tag_stable_across_time() {
        let t1 = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        let t2 = Utc.with_ymd_and_hms(2025, 6, 2, 8, 30, 0).unwrap();
        let a = TagSet::generate(t1, "abc1234def5678").unwrap();
        let b = TagSet::generate(t2, "abc1234def5678").unwrap();
        assert_eq!(a.revision, b.revision);
        assert_ne!(a.date, b.date);
    }

    #[test]
    fn generate_end_to_end_scenario() {
        let t1 = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        let tags = TagSet::generate(t1, "abc1234").unwrap();
        assert_eq!(tags.latest, "latest");
        assert_eq!(tags.date, "20240301100000");
        assert_eq!(tags.revision, "abc1234");

        let t2 = Utc.with_ymd_and_hms(2024, 3, 1, 11, 0, 0).unwrap();
        let tags2 = TagSet::generate(t2, "def5678").unwrap();
        assert_eq!(tags2.date, "20240301110000");
        assert_eq!(tags2.revision, "def5678");
    }

    #[test]
    fn short_revision_rejects_truncated_input() {
        assert!(matches!(
            short_revision("abc12"),
            Err(DrydockError::RevisionTooShort(_))
        ));
    }

    #[test]
    fn short_revision_rejects_non_hex() {
        assert!(short_revision("not-a-rev-id").is_err());
    }

    #[test]
    fn short_revision_lowercases() {
        assert_eq!(short_revision("ABC1234FF").unwrap(), "abc1234");
    }

    #[test]
    fn fold_namespace_lowercases() {
        assert_eq!(fold_namespace("Org/Repo").unwrap(), "org/repo");
        assert_eq!(fold_namespace("already/lower").unwrap(), "already/lower");
    }

    #[test]
    fn fold_namespace_rejects_bare_name() {
        assert!(fold_namespace("repo").is_err());
        assert!(fold_namespace("org/").is_err());
        assert!(fold_namespace("org/re po").is_err());
    }

    #[test]
    fn tag_set_iter_order() {
        let t = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        let tags = TagSet::generate(t, "abc1234").unwrap();
        let collected: Vec<&str> = tags.iter().collect();
        assert_eq!(collected, vec!["latest", "20240301100000", "abc1234"]);
    }
}
