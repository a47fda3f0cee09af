//! Review revisions, read back from the hidden review refs.

use crate::object::ObjectId;
use std::collections::BTreeMap;

const SOURCE: &str = "source";
const DESTINATION: &str = "destination";

/// One pushed revision of a review.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revision {
    /// Revision number, starting at 1.
    pub number: u32,
    /// Target of the revision's `source` ref.
    pub source: ObjectId,
    /// Target of the revision's `destination` ref.
    pub destination: ObjectId,
}

/// Namespace holding every hidden ref of the review `review_id`.
pub fn review_refs_prefix(review_id: &str) -> String {
    format!("refs/heads/reviews/{review_id}/")
}

/// Groups the refs found under `prefix` into revisions.
///
/// Refs are expected as `<prefix><number>/source` and
/// `<prefix><number>/destination`. Anything else is ignored, as are
/// revisions missing one of their two refs. The result is ordered by
/// revision number.
pub fn parse_revisions<I>(prefix: &str, refs: I) -> Vec<Revision>
where
    I: IntoIterator<Item = (ObjectId, String)>,
{
    let mut found: BTreeMap<u32, (Option<ObjectId>, Option<ObjectId>)> = BTreeMap::new();

    for (id, name) in refs {
        let Some((number, kind)) = name
            .strip_prefix(prefix)
            .and_then(|rest| rest.split_once('/'))
        else {
            continue;
        };
        let Ok(number) = number.parse::<u32>() else {
            continue;
        };

        let slot = found.entry(number).or_default();
        match kind {
            SOURCE => slot.0 = Some(id),
            DESTINATION => slot.1 = Some(id),
            _ => {}
        }
    }

    found
        .into_iter()
        .filter_map(|(number, refs)| match refs {
            (Some(source), Some(destination)) => Some(Revision {
                number,
                source,
                destination,
            }),
            _ => {
                tracing::debug!(prefix, number, "Skipping incomplete review revision");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::receive::{review_ref, DESTINATION_REF_TEMPLATE, SOURCE_REF_TEMPLATE};

    fn id(byte: u8) -> ObjectId {
        ObjectId::from_bytes([byte; 20])
    }

    fn refs(entries: &[(u8, &str)]) -> Vec<(ObjectId, String)> {
        entries
            .iter()
            .map(|(byte, name)| (id(*byte), name.to_string()))
            .collect()
    }

    #[test]
    fn test_prefix_covers_review_refs() {
        let prefix = review_refs_prefix("abc");
        assert!(review_ref(SOURCE_REF_TEMPLATE, "abc", 1).starts_with(&prefix));
        assert!(review_ref(DESTINATION_REF_TEMPLATE, "abc", 7).starts_with(&prefix));
    }

    #[test]
    fn test_pairs_grouped_by_number() {
        let prefix = review_refs_prefix("abc");
        let revisions = parse_revisions(
            &prefix,
            refs(&[
                (1, "refs/heads/reviews/abc/1/destination"),
                (2, "refs/heads/reviews/abc/1/source"),
                (3, "refs/heads/reviews/abc/2/source"),
                (4, "refs/heads/reviews/abc/2/destination"),
            ]),
        );

        assert_eq!(
            revisions,
            vec![
                Revision {
                    number: 1,
                    source: id(2),
                    destination: id(1),
                },
                Revision {
                    number: 2,
                    source: id(3),
                    destination: id(4),
                },
            ]
        );
    }

    #[test]
    fn test_numeric_order() {
        let prefix = review_refs_prefix("abc");
        let revisions = parse_revisions(
            &prefix,
            refs(&[
                (1, "refs/heads/reviews/abc/10/source"),
                (1, "refs/heads/reviews/abc/10/destination"),
                (2, "refs/heads/reviews/abc/9/source"),
                (2, "refs/heads/reviews/abc/9/destination"),
            ]),
        );
        let numbers: Vec<u32> = revisions.iter().map(|r| r.number).collect();
        assert_eq!(numbers, [9, 10]);
    }

    #[test]
    fn test_incomplete_and_foreign_refs_ignored() {
        let prefix = review_refs_prefix("abc");
        let revisions = parse_revisions(
            &prefix,
            refs(&[
                (1, "refs/heads/reviews/abc/1/source"),
                (2, "refs/heads/reviews/abcd/2/source"),
                (2, "refs/heads/reviews/abcd/2/destination"),
                (3, "refs/heads/reviews/abc/x/source"),
                (3, "refs/heads/reviews/abc/x/destination"),
                (4, "refs/heads/reviews/abc/3/other"),
                (5, "refs/heads/main"),
            ]),
        );
        assert!(revisions.is_empty());
    }
}
