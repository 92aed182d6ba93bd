use std::fs;

use serde::Serialize;
use tracing::info;

use crate::config::Config;
use crate::domain::{AsOf, MetadataSource};
use crate::error::CladeError;
use crate::fetch::{MetadataDownloader, Transfer};
use crate::frame::Value;
use crate::metadata::{clade_counts, filter_metadata, load_metadata};
use crate::ncbi::SequenceClient;
use crate::package::unpack_genome_package;
use crate::s3::VersionStore;

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub use_existing: bool,
    pub num_rows: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CountsResult {
    pub as_of: String,
    pub metadata_file: String,
    pub counts_file: String,
    pub groups: usize,
    pub sequences: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PackageResult {
    pub released_since: String,
    pub package_file: String,
    pub extracted_to: String,
}

pub struct Pipeline<S: VersionStore, N: SequenceClient, T: Transfer> {
    config: Config,
    versions: S,
    ncbi: N,
    transfer: T,
}

impl<S: VersionStore, N: SequenceClient, T: Transfer> Pipeline<S, N, T> {
    pub fn new(config: Config, versions: S, ncbi: N, transfer: T) -> Self {
        Self {
            config,
            versions,
            ncbi,
            transfer,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn clade_counts(
        &self,
        as_of: &AsOf,
        options: &RunOptions,
    ) -> Result<CountsResult, CladeError> {
        fs::create_dir_all(self.config.data_path.as_std_path())
            .map_err(|err| CladeError::Filesystem(err.to_string()))?;

        let downloader = MetadataDownloader::new(&self.versions, &self.transfer);
        let metadata_file = downloader.download(
            &self.config.nextstrain_bucket,
            &self.config.genome_metadata_key,
            &self.config.data_path,
            as_of,
            options.use_existing,
        )?;

        let metadata = load_metadata(
            &MetadataSource::Path(metadata_file.clone()),
            options.num_rows,
        )?;
        let filtered = filter_metadata(&metadata, None);
        let counts = clade_counts(&filtered).collect()?;

        let counts_file = self.config.counts_file(as_of);
        counts.write_tsv(&counts_file)?;

        let count_index = counts.column_index("count")?;
        let sequences: i64 = counts
            .rows()
            .iter()
            .map(|row| match row[count_index] {
                Value::Int(count) => count,
                _ => 0,
            })
            .sum();
        info!(
            groups = counts.height(),
            sequences,
            counts_file = %counts_file,
            "clade counts written"
        );

        Ok(CountsResult {
            as_of: as_of.to_string(),
            metadata_file: metadata_file.to_string(),
            counts_file: counts_file.to_string(),
            groups: counts.height(),
            sequences,
        })
    }

    pub fn fetch_sequence_package(
        &self,
        released_since: &str,
    ) -> Result<PackageResult, CladeError> {
        fs::create_dir_all(self.config.data_path.as_std_path())
            .map_err(|err| CladeError::Filesystem(err.to_string()))?;

        let package_path = self.config.ncbi_package_path();
        self.ncbi
            .download_package(released_since, package_path.as_std_path())?;
        unpack_genome_package(
            package_path.as_std_path(),
            self.config.data_path.as_std_path(),
        )?;

        Ok(PackageResult {
            released_since: released_since.to_string(),
            package_file: package_path.to_string(),
            extracted_to: self.config.data_path.to_string(),
        })
    }
}
