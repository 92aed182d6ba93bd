use std::fs::File;
use std::path::Path;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};
use serde_json::json;
use tracing::info;

use crate::error::CladeError;

pub trait SequenceClient: Send + Sync {
    fn download_package(&self, released_since: &str, destination: &Path)
    -> Result<(), CladeError>;
}

impl<N: SequenceClient + ?Sized> SequenceClient for &N {
    fn download_package(
        &self,
        released_since: &str,
        destination: &Path,
    ) -> Result<(), CladeError> {
        (**self).download_package(released_since, destination)
    }
}

#[derive(Clone)]
pub struct NcbiHttpClient {
    client: Client,
    base_url: String,
}

impl NcbiHttpClient {
    pub fn new(base_url: &str) -> Result<Self, CladeError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("cladecount/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| CladeError::NcbiHttp(err.to_string()))?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/zip"));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(300))
            .connect_timeout(Duration::from_secs(300))
            .build()
            .map_err(|err| CladeError::NcbiHttp(err.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.to_string(),
        })
    }

    fn write_response_to_file(
        &self,
        mut response: reqwest::blocking::Response,
        destination: &Path,
    ) -> Result<(), CladeError> {
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "NCBI request failed".to_string());
            return Err(CladeError::NcbiStatus { status, message });
        }

        let mut file =
            File::create(destination).map_err(|err| CladeError::Filesystem(err.to_string()))?;
        std::io::copy(&mut response, &mut file)
            .map_err(|err| CladeError::Filesystem(err.to_string()))?;
        Ok(())
    }
}

pub fn package_request_body(released_since: &str) -> serde_json::Value {
    json!({
        "released_since": released_since,
        "taxon": "SARS-CoV-2",
        "refseq_only": false,
        "annotated_only": false,
        "host": "Homo sapiens",
        "complete_only": false,
        "table_fields": ["unspecified"],
        "include_sequence": ["GENOME"],
        "aux_report": ["DATASET_REPORT"],
        "format": "tsv",
        "use_psg": false,
    })
}

impl SequenceClient for NcbiHttpClient {
    fn download_package(
        &self,
        released_since: &str,
        destination: &Path,
    ) -> Result<(), CladeError> {
        info!(released_since, "NCBI genome package download starting");
        let response = self
            .client
            .post(&self.base_url)
            .json(&package_request_body(released_since))
            .send()
            .map_err(|err| CladeError::NcbiHttp(err.to_string()))?;
        self.write_response_to_file(response, destination)
    }
}
