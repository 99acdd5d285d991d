//! Streaming download of release assets

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::StreamExt;
use log::debug;
use tokio::io::AsyncWriteExt;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

const DOWNLOAD_CONNECT_TIMEOUT: Duration = Duration::from_secs(30); // Initial connection
const DOWNLOAD_INACTIVITY_TIMEOUT: Duration = Duration::from_secs(300); // 5 min no data

/// Downloads a URL into a file, one request, no retries
#[derive(Debug, Clone)]
pub struct Downloader {
    client: reqwest::Client,
    inactivity_timeout: Duration,
}

impl Downloader {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(DOWNLOAD_CONNECT_TIMEOUT)
            .user_agent(concat!("ghrel/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_client(client))
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            inactivity_timeout: DOWNLOAD_INACTIVITY_TIMEOUT,
        }
    }

    pub fn inactivity_timeout(mut self, limit: Duration) -> Self {
        self.inactivity_timeout = limit;
        self
    }

    /// Stream `url` into `dest_dir/filename`, creating `dest_dir` if needed.
    ///
    /// A failure mid-stream leaves the partial file behind; callers download
    /// into a disposable workspace.
    pub async fn download(
        &self,
        cancel: &CancellationToken,
        url: &str,
        dest_dir: &Path,
        filename: &str,
    ) -> Result<PathBuf> {
        debug!("GET {url}");
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            response = self.client.get(url).send() => response?,
        };

        let status = response.status();
        if status.as_u16() > 299 {
            return Err(Error::HttpStatus {
                status: status.as_u16(),
            });
        }

        tokio::fs::create_dir_all(dest_dir).await?;
        let path = dest_dir.join(filename);
        let mut file = tokio::fs::File::create(&path).await?;

        let total = response.content_length();
        let mut stream = response.bytes_stream();
        let mut downloaded: u64 = 0;

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                next = timeout(self.inactivity_timeout, stream.next()) => next,
            };

            let chunk = match next {
                Ok(Some(Ok(chunk))) => chunk,
                Ok(Some(Err(e))) => return Err(e.into()),
                Ok(None) => break, // Stream ended normally
                Err(_) => {
                    return Err(Error::DownloadStalled {
                        secs: self.inactivity_timeout.as_secs(),
                    });
                }
            };

            file.write_all(&chunk).await?;
            downloaded += chunk.len() as u64;
        }

        file.flush().await?;

        match total {
            Some(total) => debug!("Downloaded {downloaded}/{total} bytes to {}", path.display()),
            None => debug!("Downloaded {downloaded} bytes to {}", path.display()),
        }
        Ok(path)
    }
}
