use std::fmt;
use std::time::Duration;

use reqwest::blocking::Client;
use serde_json::{Map, Value};
use tracing::warn;

use crate::config::Config;
use crate::domain::{AsOf, MetadataSource, min_ncov_metadata_date};
use crate::error::CladeError;
use crate::frame::LazyTable;
use crate::metadata::load_metadata;
use crate::s3::{VersionStore, resolve_as_of};

const SARS_COV_2_DATASET: &str = "sars-cov-2";
const SARS_COV_2_DATASET_FULL: &str = "nextstrain/sars-cov-2/wuhan-hu-1/orfs";

// Point-in-time view of the published surveillance data: the sequence file,
// its metadata, and (when available) the pipeline metadata that produced them.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub sequence_as_of: AsOf,
    pub tree_as_of: AsOf,
    pub url_sequence: String,
    pub url_sequence_metadata: String,
    pub url_ncov_metadata: Option<String>,
}

impl Snapshot {
    pub fn resolve<S: VersionStore>(
        store: &S,
        config: &Config,
        sequence_as_of: AsOf,
        tree_as_of: Option<AsOf>,
    ) -> Result<Self, CladeError> {
        let tree_as_of = tree_as_of.unwrap_or(sequence_as_of);

        let sequence = resolve_as_of(
            store,
            &config.nextstrain_bucket,
            &config.genome_sequence_key,
            &sequence_as_of,
        )?;
        let sequence_metadata = resolve_as_of(
            store,
            &config.nextstrain_bucket,
            &config.genome_metadata_key,
            &sequence_as_of,
        )?;

        // Pipeline metadata only started being published partway through.
        let url_ncov_metadata = if sequence_as_of.datetime() >= min_ncov_metadata_date() {
            Some(
                resolve_as_of(
                    store,
                    &config.nextstrain_bucket,
                    &config.ncov_metadata_key,
                    &sequence_as_of,
                )?
                .url,
            )
        } else {
            None
        };

        Ok(Self {
            sequence_as_of,
            tree_as_of,
            url_sequence: sequence.url,
            url_sequence_metadata: sequence_metadata.url,
            url_ncov_metadata,
        })
    }

    pub fn sequence_metadata(&self, num_rows: Option<usize>) -> Result<LazyTable, CladeError> {
        load_metadata(
            &MetadataSource::Url(self.url_sequence_metadata.clone()),
            num_rows,
        )
    }

    pub fn ncov_metadata(&self) -> Result<Map<String, Value>, CladeError> {
        let Some(url) = &self.url_ncov_metadata else {
            return Ok(Map::new());
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| CladeError::TransferHttp(err.to_string()))?;
        let response = client
            .get(url)
            .send()
            .map_err(|err| CladeError::TransferHttp(err.to_string()))?;
        if !response.status().is_success() {
            warn!(
                status = response.status().as_u16(),
                url = %url,
                "failed to retrieve ncov metadata"
            );
            return Ok(Map::new());
        }

        let mut metadata: Map<String, Value> = response
            .json()
            .map_err(|err| CladeError::TransferHttp(err.to_string()))?;
        let dataset_name = metadata
            .get("nextclade_dataset_name")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if dataset_name.eq_ignore_ascii_case(SARS_COV_2_DATASET) {
            metadata.insert(
                "nextclade_dataset_name_full".to_string(),
                Value::String(SARS_COV_2_DATASET_FULL.to_string()),
            );
        }
        Ok(metadata)
    }
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SARS-CoV-2 sequences as of {} with clade assignments as of {}",
            self.sequence_as_of, self.tree_as_of
        )
    }
}
