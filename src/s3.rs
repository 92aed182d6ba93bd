use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use tracing::debug;

use crate::domain::{AsOf, ObjectReference};
use crate::error::CladeError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectVersion {
    pub version_id: String,
    pub last_modified: DateTime<Utc>,
}

pub trait VersionStore: Send + Sync {
    fn list_versions(&self, bucket: &str, key: &str) -> Result<Vec<ObjectVersion>, CladeError>;
}

impl<S: VersionStore + ?Sized> VersionStore for &S {
    fn list_versions(&self, bucket: &str, key: &str) -> Result<Vec<ObjectVersion>, CladeError> {
        (**self).list_versions(bucket, key)
    }
}

pub fn version_url(bucket: &str, key: &str, version_id: &str) -> String {
    format!("https://{bucket}.s3.amazonaws.com/{key}?versionId={version_id}")
}

// Latest version whose modification time is not after the as-of instant.
// Versions created later must never be selected.
pub fn resolve_as_of<S: VersionStore>(
    store: &S,
    bucket: &str,
    key: &str,
    as_of: &AsOf,
) -> Result<ObjectReference, CladeError> {
    let versions = store.list_versions(bucket, key)?;
    let selected = versions
        .into_iter()
        .filter(|version| version.last_modified <= as_of.datetime())
        .max_by_key(|version| version.last_modified)
        .ok_or_else(|| CladeError::NoVersionFound {
            key: key.to_string(),
            as_of: as_of.to_string(),
        })?;

    debug!(
        bucket,
        key,
        version_id = %selected.version_id,
        last_modified = %selected.last_modified,
        "resolved object version"
    );

    Ok(ObjectReference {
        bucket: bucket.to_string(),
        key: key.to_string(),
        url: version_url(bucket, key, &selected.version_id),
        version_id: selected.version_id,
        as_of: as_of.datetime(),
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListVersionsResult {
    #[serde(default)]
    is_truncated: bool,
    next_key_marker: Option<String>,
    next_version_id_marker: Option<String>,
    #[serde(rename = "Version", default)]
    versions: Vec<VersionEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct VersionEntry {
    key: String,
    version_id: String,
    last_modified: DateTime<Utc>,
}

#[derive(Clone)]
pub struct S3HttpStore {
    client: Client,
}

impl S3HttpStore {
    pub fn new() -> Result<Self, CladeError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("cladecount/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| CladeError::S3Http(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|err| CladeError::S3Http(err.to_string()))?;
        Ok(Self { client })
    }

    fn list_page(
        &self,
        bucket: &str,
        key: &str,
        key_marker: Option<&str>,
        version_id_marker: Option<&str>,
    ) -> Result<ListVersionsResult, CladeError> {
        let url = format!("https://{bucket}.s3.amazonaws.com/");
        let mut request = self
            .client
            .get(&url)
            .query(&[("versions", ""), ("prefix", key)]);
        if let Some(marker) = key_marker {
            request = request.query(&[("key-marker", marker)]);
        }
        if let Some(marker) = version_id_marker {
            request = request.query(&[("version-id-marker", marker)]);
        }

        let response = request
            .send()
            .map_err(|err| CladeError::S3Http(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "object store listing failed".to_string());
            return Err(CladeError::S3Status { status, message });
        }

        let body = response
            .text()
            .map_err(|err| CladeError::S3Http(err.to_string()))?;
        quick_xml::de::from_str(&body).map_err(|err| CladeError::S3Http(err.to_string()))
    }
}

impl VersionStore for S3HttpStore {
    fn list_versions(&self, bucket: &str, key: &str) -> Result<Vec<ObjectVersion>, CladeError> {
        let mut versions = Vec::new();
        let mut key_marker: Option<String> = None;
        let mut version_id_marker: Option<String> = None;

        loop {
            let page = self.list_page(
                bucket,
                key,
                key_marker.as_deref(),
                version_id_marker.as_deref(),
            )?;

            // The listing is by prefix; other keys sharing it are not ours.
            versions.extend(
                page.versions
                    .into_iter()
                    .filter(|entry| entry.key == key)
                    .map(|entry| ObjectVersion {
                        version_id: entry.version_id,
                        last_modified: entry.last_modified,
                    }),
            );

            if !page.is_truncated {
                return Ok(versions);
            }
            key_marker = page.next_key_marker;
            version_id_marker = page.next_version_id_marker;
        }
    }
}
