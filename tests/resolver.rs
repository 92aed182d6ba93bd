use assert_matches::assert_matches;
use chrono::{TimeZone, Utc};

use cladecount::domain::AsOf;
use cladecount::error::CladeError;
use cladecount::s3::{ObjectVersion, VersionStore, resolve_as_of};

struct FixedStore {
    versions: Vec<ObjectVersion>,
}

impl VersionStore for FixedStore {
    fn list_versions(&self, _bucket: &str, _key: &str) -> Result<Vec<ObjectVersion>, CladeError> {
        Ok(self.versions.clone())
    }
}

fn version(id: &str, year: i32, month: u32, day: u32) -> ObjectVersion {
    ObjectVersion {
        version_id: id.to_string(),
        last_modified: Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).unwrap(),
    }
}

#[test]
fn never_selects_a_version_created_after_the_requested_instant() {
    // v1 effective 2024-09-01, v2 effective 2024-09-20: any as-of inside
    // [2024-09-01, 2024-09-20) must return v1.
    let store = FixedStore {
        versions: vec![version("v1", 2024, 9, 1), version("v2", 2024, 9, 20)],
    };

    for day in ["2024-09-01", "2024-09-10", "2024-09-19"] {
        let as_of: AsOf = day.parse().unwrap();
        let reference = resolve_as_of(&store, "bucket", "key", &as_of).unwrap();
        assert_eq!(reference.version_id, "v1", "as of {day}");
    }

    let at_switch: AsOf = "2024-09-20".parse().unwrap();
    let reference = resolve_as_of(&store, "bucket", "key", &at_switch).unwrap();
    assert_eq!(reference.version_id, "v2");
}

#[test]
fn resolution_is_deterministic_regardless_of_listing_order() {
    let forward = FixedStore {
        versions: vec![
            version("v1", 2024, 9, 1),
            version("v2", 2024, 9, 10),
            version("v3", 2024, 9, 20),
        ],
    };
    let reversed = FixedStore {
        versions: vec![
            version("v3", 2024, 9, 20),
            version("v2", 2024, 9, 10),
            version("v1", 2024, 9, 1),
        ],
    };
    let as_of: AsOf = "2024-09-15".parse().unwrap();

    let first = resolve_as_of(&forward, "bucket", "key", &as_of).unwrap();
    let second = resolve_as_of(&reversed, "bucket", "key", &as_of).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.version_id, "v2");
}

#[test]
fn reference_carries_versioned_url_and_as_of() {
    let store = FixedStore {
        versions: vec![version("abc123", 2024, 9, 1)],
    };
    let as_of: AsOf = "2024-09-24".parse().unwrap();

    let reference = resolve_as_of(
        &store,
        "nextstrain-data",
        "files/ncov/open/metadata.tsv.zst",
        &as_of,
    )
    .unwrap();

    assert_eq!(reference.bucket, "nextstrain-data");
    assert_eq!(reference.key, "files/ncov/open/metadata.tsv.zst");
    assert_eq!(
        reference.url,
        "https://nextstrain-data.s3.amazonaws.com/files/ncov/open/metadata.tsv.zst?versionId=abc123"
    );
    assert_eq!(reference.as_of, as_of.datetime());
}

#[test]
fn empty_history_is_not_found() {
    let store = FixedStore {
        versions: Vec::new(),
    };
    let as_of: AsOf = "2024-09-24".parse().unwrap();

    let err = resolve_as_of(&store, "bucket", "key", &as_of).unwrap_err();
    assert_matches!(err, CladeError::NoVersionFound { key, .. } if key == "key");
}
