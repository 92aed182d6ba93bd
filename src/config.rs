use camino::Utf8PathBuf;
use chrono::Utc;
use directories::BaseDirs;

use crate::domain::AsOf;
use crate::error::CladeError;

pub const NCBI_BASE_URL: &str =
    "https://api.ncbi.nlm.nih.gov/datasets/v2alpha/virus/genome/download";
pub const NEXTSTRAIN_BUCKET: &str = "nextstrain-data";
pub const GENOME_METADATA_KEY: &str = "files/ncov/open/metadata.tsv.zst";
pub const GENOME_SEQUENCE_KEY: &str = "files/ncov/open/sequences.fasta.zst";
pub const NCOV_METADATA_KEY: &str = "files/ncov/open/metadata_version.json";

#[derive(Debug, Clone)]
pub struct Config {
    pub ncbi_base_url: String,
    pub nextstrain_bucket: String,
    pub genome_metadata_key: String,
    pub genome_sequence_key: String,
    pub ncov_metadata_key: String,
    pub data_path: Utf8PathBuf,
    pub run_time: String,
}

impl Config {
    pub fn new(data_path_root: Option<Utf8PathBuf>) -> Result<Self, CladeError> {
        let run_time = Utc::now().format("%Y%m%dT%H%M%S").to_string();
        let data_path = match data_path_root {
            Some(root) => root,
            None => BaseDirs::new()
                .and_then(|dirs| {
                    Utf8PathBuf::from_path_buf(
                        dirs.home_dir().join("covid_variant").join(&run_time),
                    )
                    .ok()
                })
                .ok_or_else(|| {
                    CladeError::Filesystem("unable to resolve data directory".to_string())
                })?,
        };

        Ok(Self {
            ncbi_base_url: NCBI_BASE_URL.to_string(),
            nextstrain_bucket: NEXTSTRAIN_BUCKET.to_string(),
            genome_metadata_key: GENOME_METADATA_KEY.to_string(),
            genome_sequence_key: GENOME_SEQUENCE_KEY.to_string(),
            ncov_metadata_key: NCOV_METADATA_KEY.to_string(),
            data_path,
            run_time,
        })
    }

    pub fn ncbi_package_path(&self) -> Utf8PathBuf {
        self.data_path.join("ncbi.zip")
    }

    pub fn sequence_file(&self) -> Utf8PathBuf {
        self.data_path.join("ncbi_dataset/data/genomic.fna")
    }

    pub fn counts_file(&self, as_of: &AsOf) -> Utf8PathBuf {
        self.data_path
            .join(format!("{}_clade_counts.tsv", as_of.date_stamp()))
    }

    pub fn nextclade_dataset_path(&self, tag: &str) -> Utf8PathBuf {
        self.data_path.join(format!("nextclade_dataset_{tag}.zip"))
    }
}
