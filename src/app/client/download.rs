//! File download operations with atomic writes and streaming
//!
//! Report files are served from signed Cloud Storage URLs. Bytes are streamed
//! unchanged into a temporary file next to the destination, which is renamed
//! into place once the body is complete, so an interrupted download never
//! leaves a truncated report behind.

use std::path::{Path, PathBuf};

use backoff::ExponentialBackoffBuilder;
use futures::StreamExt;
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use url::Url;

use crate::constants::files;
use crate::errors::{DownloadError, DownloadResult};

/// File download operations handler
pub struct DownloadHandler<'a> {
    client: &'a Client,
}

impl<'a> DownloadHandler<'a> {
    /// Creates a new DownloadHandler around an HTTP client
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// Downloads `url` to `destination` byte-for-byte, returning the size
    ///
    /// Transient failures (timeouts, connection errors, HTTP 429 and 5xx) are
    /// retried with exponential backoff for a bounded time; anything else
    /// fails immediately. An existing destination file is replaced.
    ///
    /// # Errors
    ///
    /// Returns `DownloadError` if:
    /// - The URL is invalid
    /// - The storage server keeps failing or returns a client error
    /// - File I/O operations fail
    pub async fn download_to_file(&self, url: &str, destination: &Path) -> DownloadResult<u64> {
        let url = Url::parse(url).map_err(|e| DownloadError::InvalidUrl {
            url: url.to_string(),
            error: e.to_string(),
        })?;

        let policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(files::RETRY_INITIAL_INTERVAL)
            .with_max_elapsed_time(Some(files::RETRY_MAX_ELAPSED))
            .build();

        let bytes = backoff::future::retry(policy, || async {
            self.download_attempt(&url, destination)
                .await
                .map_err(|e| {
                    if e.is_transient() {
                        tracing::warn!("Download of {} failed: {}. Retrying", url, e);
                        backoff::Error::transient(e)
                    } else {
                        backoff::Error::permanent(e)
                    }
                })
        })
        .await?;

        tracing::info!(
            "Downloaded {} bytes to {}",
            bytes,
            destination.display()
        );
        Ok(bytes)
    }

    /// Streams one attempt into a temporary file and moves it into place
    async fn download_attempt(&self, url: &Url, destination: &Path) -> DownloadResult<u64> {
        let response = self.client.get(url.clone()).send().await?;

        if !response.status().is_success() {
            return Err(DownloadError::ServerError {
                status: response.status().as_u16(),
            });
        }

        let (temp, mut file) = create_temp_beside(destination).await?;

        let mut written = 0u64;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        persist(temp, destination)?;
        Ok(written)
    }
}

/// Writes `contents` to `destination` through a temporary file
pub async fn write_atomically(destination: &Path, contents: &[u8]) -> DownloadResult<()> {
    let (temp, mut file) = create_temp_beside(destination).await?;
    file.write_all(contents).await?;
    file.flush().await?;
    file.sync_all().await?;
    drop(file);

    persist(temp, destination)
}

async fn create_temp_beside(
    destination: &Path,
) -> DownloadResult<(tempfile::NamedTempFile, tokio::fs::File)> {
    let parent = match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    tokio::fs::create_dir_all(&parent).await?;

    let temp = tempfile::Builder::new()
        .prefix(".dbm-download-")
        .tempfile_in(&parent)?;
    let file = tokio::fs::File::from_std(temp.reopen()?);
    Ok((temp, file))
}

fn persist(temp: tempfile::NamedTempFile, destination: &Path) -> DownloadResult<()> {
    let temp_path = temp.path().to_path_buf();
    temp.persist(destination)
        .map_err(|_e| DownloadError::AtomicOperationFailed {
            temp_path,
            final_path: destination.to_path_buf(),
        })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_download_is_byte_for_byte() {
        // Non-UTF-8 and CRLF content must survive untouched
        let server = MockServer::start().await;
        let body: Vec<u8> = vec![0xEF, 0xBB, 0xBF, b'a', b',', b'b', b'\r', b'\n', 0x00, 0xFF, 0xFE];
        Mock::given(method("GET"))
            .and(path("/bucket/report.csv"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let destination = dir.path().join("nested").join("report.csv");
        let client = Client::new();

        let written = DownloadHandler::new(&client)
            .download_to_file(&format!("{}/bucket/report.csv", server.uri()), &destination)
            .await
            .unwrap();

        assert_eq!(written, body.len() as u64);
        assert_eq!(tokio::fs::read(&destination).await.unwrap(), body);
    }

    #[tokio::test]
    async fn test_download_replaces_existing_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"new".to_vec()))
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let destination = dir.path().join("report.csv");
        tokio::fs::write(&destination, b"old contents that are longer")
            .await
            .unwrap();

        let client = Client::new();
        DownloadHandler::new(&client)
            .download_to_file(&server.uri(), &destination)
            .await
            .unwrap();

        assert_eq!(tokio::fs::read(&destination).await.unwrap(), b"new");
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let destination = dir.path().join("missing.csv");
        let client = Client::new();

        let result = DownloadHandler::new(&client)
            .download_to_file(&server.uri(), &destination)
            .await;

        assert!(matches!(
            result,
            Err(DownloadError::ServerError { status: 404 })
        ));
        assert!(!destination.exists());
        // No stray temp files left behind
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_transient_error_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ok".to_vec()))
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let destination = dir.path().join("report.csv");
        let client = Client::new();

        DownloadHandler::new(&client)
            .download_to_file(&server.uri(), &destination)
            .await
            .unwrap();

        assert_eq!(tokio::fs::read(&destination).await.unwrap(), b"ok");
    }

    #[tokio::test]
    async fn test_invalid_url() {
        let dir = tempdir().unwrap();
        let client = Client::new();
        let result = DownloadHandler::new(&client)
            .download_to_file("not-a-url", &dir.path().join("x.csv"))
            .await;
        assert!(matches!(result, Err(DownloadError::InvalidUrl { .. })));
    }

    #[tokio::test]
    async fn test_write_atomically() {
        let dir = tempdir().unwrap();
        let destination = dir.path().join("line_items.csv");
        write_atomically(&destination, "Line Item Id,Name\n1,Ünïcode\n".as_bytes())
            .await
            .unwrap();

        let contents = tokio::fs::read_to_string(&destination).await.unwrap();
        assert_eq!(contents, "Line Item Id,Name\n1,Ünïcode\n");
    }

    #[tokio::test]
    async fn test_slow_body_outlasting_read_timeout_still_downloads() {
        use std::time::Duration;
        use tokio::io::AsyncReadExt;
        use tokio::net::TcpListener;

        // Ten bytes, 150ms apart: never idle for the 500ms read timeout but
        // three times longer in total
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 4096];
            let _ = stream.read(&mut request).await.unwrap();
            stream
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 10\r\nConnection: close\r\n\r\n")
                .await
                .unwrap();
            for byte in b"0123456789" {
                tokio::time::sleep(Duration::from_millis(150)).await;
                stream.write_all(&[*byte]).await.unwrap();
                stream.flush().await.unwrap();
            }
        });

        let config = crate::app::client::ClientConfig {
            read_timeout: Duration::from_millis(500),
            ..Default::default()
        };
        let client = config.build_http_client().unwrap();
        let dir = tempdir().unwrap();
        let destination = dir.path().join("slow.csv");

        let written = DownloadHandler::new(&client)
            .download_to_file(&format!("http://127.0.0.1:{}/slow.csv", port), &destination)
            .await
            .unwrap();

        assert_eq!(written, 10);
        assert_eq!(tokio::fs::read(&destination).await.unwrap(), b"0123456789");
    }
}
