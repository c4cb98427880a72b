//! FTP implementation of the remote store.
//!
//! Every operation opens its own connection (connect, log in, binary mode,
//! operate, quit). There is no pooling and no retry.

use std::time::Duration;

use async_ftp::types::FileType;
use async_ftp::{FtpError, FtpStream};
use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, warn};

use super::listing::parse_listing;
use super::{RemoteEntry, RemoteRead, RemoteStore};
use crate::config::FtpConfig;
use crate::{FiledockError, Result};

/// Reply code for "file unavailable".
const FILE_UNAVAILABLE: &str = "550";

/// Bytes buffered between the FTP data connection and the reader.
const STREAM_BUFFER: usize = 64 * 1024;

fn remote_err(e: FtpError) -> FiledockError {
    FiledockError::Remote(e.to_string())
}

fn is_unavailable(e: &FtpError) -> bool {
    e.to_string().contains(FILE_UNAVAILABLE)
}

/// Remote store talking to an FTP server.
#[derive(Debug, Clone)]
pub struct FtpStore {
    host: String,
    port: u16,
    user: String,
    password: String,
    connect_timeout: Duration,
}

impl FtpStore {
    pub fn new(config: &FtpConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            user: config.user.clone(),
            password: config.password.clone(),
            connect_timeout: Duration::from_secs(config.connect_timeout_secs.max(1)),
        }
    }

    fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    async fn connect(&self) -> Result<FtpStream> {
        let address = self.address();
        let mut stream = tokio::time::timeout(self.connect_timeout, FtpStream::connect(address.as_str()))
            .await
            .map_err(|_| FiledockError::Remote(format!("connecting to {address} timed out")))?
            .map_err(remote_err)?;

        stream
            .login(&self.user, &self.password)
            .await
            .map_err(remote_err)?;
        stream
            .transfer_type(FileType::Binary)
            .await
            .map_err(remote_err)?;

        Ok(stream)
    }

    async fn close(mut stream: FtpStream) {
        if let Err(e) = stream.quit().await {
            debug!(error = %e, "FTP quit failed");
        }
    }
}

#[async_trait]
impl RemoteStore for FtpStore {
    async fn check(&self) -> Result<()> {
        let stream = self.connect().await?;
        Self::close(stream).await;
        Ok(())
    }

    async fn ensure_dir(&self, dir: &str) -> Result<()> {
        let mut stream = self.connect().await?;

        let mut current = String::new();
        for part in dir.split('/').filter(|p| !p.is_empty()) {
            if !current.is_empty() {
                current.push('/');
            }
            current.push_str(part);
            // 550 here means the directory already exists
            if let Err(e) = stream.mkdir(&current).await {
                debug!(dir = %current, error = %e, "FTP mkdir skipped");
            }
        }

        Self::close(stream).await;
        Ok(())
    }

    async fn list(&self, dir: &str) -> Result<Vec<RemoteEntry>> {
        let mut stream = self.connect().await?;
        let result = stream.list(Some(dir)).await;
        Self::close(stream).await;

        let lines = result.map_err(remote_err)?;
        Ok(parse_listing(&lines, Utc::now()))
    }

    async fn put(&self, path: &str, content: &[u8]) -> Result<()> {
        let mut stream = self.connect().await?;
        let mut reader = content;
        let result = stream.put(path, &mut reader).await;
        Self::close(stream).await;

        result.map_err(remote_err)
    }

    async fn open(&self, path: &str) -> Result<Option<RemoteRead>> {
        let mut stream = self.connect().await?;

        // SIZE is optional on many servers; only 550 is meaningful here
        let len = match stream.size(path).await {
            Ok(size) => size.map(|s| s as u64),
            Err(e) if is_unavailable(&e) => {
                Self::close(stream).await;
                return Ok(None);
            }
            Err(e) => {
                debug!(path = %path, error = %e, "FTP SIZE unavailable");
                None
            }
        };

        let data = match stream.get(path).await {
            Ok(data) => data,
            Err(e) => {
                Self::close(stream).await;
                return if is_unavailable(&e) {
                    Ok(None)
                } else {
                    Err(remote_err(e))
                };
            }
        };

        let (mut writer, reader) = tokio::io::duplex(STREAM_BUFFER);
        let path = path.to_string();
        tokio::spawn(async move {
            let mut data = data;
            let copied = tokio::io::copy(&mut data, &mut writer).await;
            drop(writer);
            match copied {
                Ok(bytes) => debug!(path = %path, bytes, "FTP download finished"),
                Err(e) => warn!(path = %path, error = %e, "FTP download interrupted"),
            }
            drop(data);
            if let Err(e) = stream
                .read_response_in(&[
                    async_ftp::status::CLOSING_DATA_CONNECTION,
                    async_ftp::status::REQUESTED_FILE_ACTION_OK,
                ])
                .await
            {
                debug!(path = %path, error = %e, "FTP transfer did not complete cleanly");
            }
            Self::close(stream).await;
        });

        Ok(Some(RemoteRead {
            reader: Box::new(reader),
            len,
        }))
    }

    async fn delete(&self, path: &str) -> Result<bool> {
        let mut stream = self.connect().await?;
        let result = stream.rm(path).await;
        Self::close(stream).await;

        match result {
            Ok(()) => Ok(true),
            Err(e) if is_unavailable(&e) => Ok(false),
            Err(e) => Err(remote_err(e)),
        }
    }
}
