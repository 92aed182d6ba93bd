use std::fs::File;
use std::path::Path;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use tracing::info;

use crate::domain::AsOf;
use crate::error::CladeError;
use crate::s3::{VersionStore, resolve_as_of};

pub trait Transfer: Send + Sync {
    fn fetch_to_file(&self, url: &str, destination: &Path) -> Result<(), CladeError>;
}

impl<T: Transfer + ?Sized> Transfer for &T {
    fn fetch_to_file(&self, url: &str, destination: &Path) -> Result<(), CladeError> {
        (**self).fetch_to_file(url, destination)
    }
}

#[derive(Clone)]
pub struct HttpTransfer {
    client: Client,
}

impl HttpTransfer {
    pub fn new() -> Result<Self, CladeError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("cladecount/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| CladeError::TransferHttp(err.to_string()))?,
        );
        // No overall timeout: payloads are multi-gigabyte and io::copy keeps
        // memory bounded while the body streams.
        let client = Client::builder()
            .default_headers(headers)
            .timeout(None)
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| CladeError::TransferHttp(err.to_string()))?;
        Ok(Self { client })
    }
}

impl Transfer for HttpTransfer {
    fn fetch_to_file(&self, url: &str, destination: &Path) -> Result<(), CladeError> {
        let mut response = self
            .client
            .get(url)
            .send()
            .map_err(|err| CladeError::TransferHttp(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "download failed".to_string());
            return Err(CladeError::TransferStatus { status, message });
        }

        let mut file =
            File::create(destination).map_err(|err| CladeError::Filesystem(err.to_string()))?;
        std::io::copy(&mut response, &mut file)
            .map_err(|err| CladeError::Filesystem(err.to_string()))?;
        Ok(())
    }
}

pub struct MetadataDownloader<S: VersionStore, T: Transfer> {
    versions: S,
    transfer: T,
}

impl<S: VersionStore, T: Transfer> MetadataDownloader<S, T> {
    pub fn new(versions: S, transfer: T) -> Self {
        Self { versions, transfer }
    }

    // The reuse check matches on filename only; a crash mid-write can leave a
    // partial file that is indistinguishable from a complete one.
    pub fn download(
        &self,
        bucket: &str,
        key: &str,
        data_path: &Utf8Path,
        as_of: &AsOf,
        use_existing: bool,
    ) -> Result<Utf8PathBuf, CladeError> {
        let basename = key.rsplit('/').next().unwrap_or(key);
        let filename = data_path.join(format!("{}-{basename}", as_of.date_stamp()));

        if use_existing && filename.as_std_path().exists() {
            info!(metadata_file = %filename, "using existing genome metadata file");
            return Ok(filename);
        }

        let reference = resolve_as_of(&self.versions, bucket, key, as_of)?;
        info!(source = %reference.url, destination = %filename, "starting genome metadata download");
        self.transfer
            .fetch_to_file(&reference.url, filename.as_std_path())?;
        Ok(filename)
    }
}
