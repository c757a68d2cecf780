//! Audio intake: upload suffix checks and remote URL fetching.

use anyhow::Context;
use tracing::info;

use crate::error::InputError;

/// Container suffixes the service accepts for uploads.
pub const ALLOWED_SUFFIXES: [&str; 7] = ["wav", "mp3", "m4a", "flac", "aac", "ogg", "mp4"];

/// Advisory filter on the uploaded filename. Files without a suffix are let
/// through; the decoder is the authority on whether the bytes are readable.
pub fn check_suffix(file_name: &str) -> Result<(), InputError> {
    let Some((_, suffix)) = file_name.rsplit_once('.') else {
        return Ok(());
    };

    let suffix = suffix.to_ascii_lowercase();
    if ALLOWED_SUFFIXES.contains(&suffix.as_str()) {
        Ok(())
    } else {
        Err(InputError::UnsupportedFormat { suffix })
    }
}

/// Streams remote audio down with the same size ceiling as uploads.
pub struct RemoteFetcher {
    client: reqwest::Client,
    max_bytes: usize,
}

impl RemoteFetcher {
    pub fn new(max_bytes: usize) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .context("Failed to create HTTP client for audio downloads")?;

        Ok(Self { client, max_bytes })
    }

    /// Download `url`, enforcing the byte ceiling while streaming.
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>, InputError> {
        let download_err = |message: String| InputError::Download { message };

        info!("Downloading audio from {}", url);

        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| download_err(e.to_string()))?;

        if !response.status().is_success() {
            return Err(download_err(format!("server returned {}", response.status())));
        }

        let mut bytes = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| download_err(e.to_string()))?
        {
            bytes.extend_from_slice(&chunk);
            if bytes.len() > self.max_bytes {
                return Err(InputError::FileTooLarge {
                    size: bytes.len(),
                    max: self.max_bytes,
                });
            }
        }

        info!("Downloaded {} bytes", bytes.len());

        Ok(bytes)
    }
}
