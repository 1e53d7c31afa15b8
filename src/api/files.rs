//! File operations against the dropp backend.
//!
//! - `GET /list` returns the file listing and storage usage.
//! - `POST /upload/` takes a multipart form with a single `file` part.
//! - `DELETE /files/{id}` removes one file.
//! - Download URLs are pre-signed and fetched without credentials.

use mime_guess::mime::Mime;
use reqwest::{multipart, StatusCode};

use super::client::ApiClient;
use super::types::{DeleteOutcome, FileRecord, ListResponse, StorageQuota};
use crate::error::{DroppError, Result};

pub const LIST_PATH: &str = "/list";
pub const UPLOAD_PATH: &str = "/upload/";

/// Fetch and decode `GET /list`.
///
/// Body read failures are network errors; a body that is not a valid
/// listing is a parse error.
pub async fn listing(
    client: &ApiClient,
    token: &str,
) -> Result<(Vec<FileRecord>, Option<StorageQuota>)> {
    let resp = client.authenticated_get(LIST_PATH, token).await?;
    let body = resp.bytes().await?;
    let parsed: ListResponse = serde_json::from_slice(&body)?;
    Ok(parsed.into_parts())
}

/// List the user's files in server order.
pub async fn list_files(client: &ApiClient, token: &str) -> Result<Vec<FileRecord>> {
    let (files, _) = listing(client, token).await?;
    log::debug!("Listed {} files", files.len());
    Ok(files)
}

/// Fetch current storage usage from the listing's `storage` block.
pub async fn fetch_quota(client: &ApiClient, token: &str) -> Result<StorageQuota> {
    let (_, storage) = listing(client, token).await?;
    storage.ok_or_else(|| DroppError::Parse("listing has no storage block".into()))
}

/// Upload a file as the `file` part of a multipart form.
pub async fn upload_file(
    client: &ApiClient,
    token: &str,
    bytes: Vec<u8>,
    file_name: &str,
    mime_type: &str,
) -> Result<()> {
    let size = bytes.len();
    let mime = match mime_type.parse::<Mime>() {
        Ok(mime) => mime,
        Err(e) => {
            log::warn!(
                "Ignoring invalid MIME type '{}' for {}: {}",
                mime_type,
                file_name,
                e
            );
            mime_guess::mime::APPLICATION_OCTET_STREAM
        }
    };
    let part = multipart::Part::bytes(bytes)
        .file_name(file_name.to_string())
        .mime_str(mime.as_ref())?;
    let form = multipart::Form::new().part("file", part);

    client
        .authenticated_multipart_post(UPLOAD_PATH, token, form)
        .await?;
    log::info!("Uploaded {} ({} bytes)", file_name, size);
    Ok(())
}

/// Delete a file by id.
///
/// A 404 means the file is already gone and is reported as
/// [`DeleteOutcome::AlreadyAbsent`] rather than an error.
pub async fn delete_file(client: &ApiClient, token: &str, file_id: &str) -> Result<DeleteOutcome> {
    let path = format!("/files/{}", urlencoding::encode(file_id));
    let resp = client.authenticated_delete(&path, token).await?;

    let status = resp.status();
    if status.is_success() {
        log::info!("Deleted file {}", file_id);
        return Ok(DeleteOutcome::Deleted);
    }
    if status == StatusCode::NOT_FOUND {
        log::warn!("File {} was already absent on the server", file_id);
        return Ok(DeleteOutcome::AlreadyAbsent);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(DroppError::http(status.as_u16(), &body))
}

/// Download the raw bytes behind a signed URL.
pub async fn download_blob(client: &ApiClient, download_url: &str) -> Result<Vec<u8>> {
    client.get_bytes(download_url).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeBackend, TEST_TOKEN};

    async fn setup() -> (FakeBackend, ApiClient) {
        let backend = FakeBackend::start().await;
        let client = ApiClient::new(&backend.base_url()).unwrap();
        (backend, client)
    }

    #[tokio::test]
    async fn test_list_files_copies_fields_in_order() {
        let (backend, client) = setup().await;
        backend.add_file("id-3", "zeta.txt", b"zzz");
        backend.add_file("id-1", "alpha.bin", &[0u8; 1500]);
        backend.add_file("id-2", "mid.pdf", b"");

        let files = list_files(&client, TEST_TOKEN).await.unwrap();
        assert_eq!(files.len(), 3);
        let ids: Vec<_> = files.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["id-3", "id-1", "id-2"]);
        assert_eq!(files[0].name, "zeta.txt");
        assert_eq!(files[0].size, 3);
        assert_eq!(files[1].size, 1500);
        assert_eq!(
            files[0].download_url,
            format!("http://{}/blob/id-3", backend.addr)
        );
    }

    #[tokio::test]
    async fn test_list_files_unauthorized() {
        let (_backend, client) = setup().await;
        let err = list_files(&client, "wrong-token").await.unwrap_err();
        assert_eq!(err.status(), Some(401));
    }

    #[tokio::test]
    async fn test_list_files_malformed_body_is_parse_error() {
        let (backend, client) = setup().await;
        backend.state().malformed_list = true;
        let err = list_files(&client, TEST_TOKEN).await.unwrap_err();
        assert!(matches!(err, DroppError::Parse(_)), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_network_failure_is_network_error() {
        // Bind then drop a listener to get a port nothing is serving on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = ApiClient::new(&format!("http://{}/api", addr)).unwrap();
        let err = list_files(&client, TEST_TOKEN).await.unwrap_err();
        assert!(matches!(err, DroppError::Network(_)), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_fetch_quota() {
        let (backend, client) = setup().await;
        {
            let mut state = backend.state();
            state.cap = 100;
            state.used = 42;
        }
        let quota = fetch_quota(&client, TEST_TOKEN).await.unwrap();
        assert_eq!(quota.capacity_bytes, 100);
        assert_eq!(quota.used_bytes, 42);
        assert_eq!(quota.available(), 58);
    }

    #[tokio::test]
    async fn test_upload_sends_single_file_part() {
        let (backend, client) = setup().await;
        upload_file(
            &client,
            TEST_TOKEN,
            b"hello world".to_vec(),
            "greeting.txt",
            "text/plain",
        )
        .await
        .unwrap();

        let state = backend.state();
        assert_eq!(state.uploads.len(), 1);
        let part = &state.uploads[0];
        assert_eq!(part.field, "file");
        assert_eq!(part.file_name.as_deref(), Some("greeting.txt"));
        assert_eq!(part.content_type.as_deref(), Some("text/plain"));
        assert_eq!(part.content, b"hello world");
    }

    #[tokio::test]
    async fn test_upload_invalid_mime_falls_back_to_octet_stream() {
        let (backend, client) = setup().await;
        upload_file(&client, TEST_TOKEN, b"raw".to_vec(), "data.bin", "not a mime")
            .await
            .unwrap();

        let state = backend.state();
        assert_eq!(state.uploads.len(), 1);
        assert_eq!(
            state.uploads[0].content_type.as_deref(),
            Some("application/octet-stream")
        );
        assert_eq!(state.uploads[0].content, b"raw");
    }

    #[tokio::test]
    async fn test_upload_rejected_by_server() {
        let (backend, client) = setup().await;
        backend.state().upload_status = Some(413);
        let err = upload_file(&client, TEST_TOKEN, vec![1, 2, 3], "a.bin", "application/octet-stream")
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(413));
    }

    #[tokio::test]
    async fn test_delete_then_absent() {
        let (backend, client) = setup().await;
        backend.add_file("gone", "x.txt", b"x");

        let first = delete_file(&client, TEST_TOKEN, "gone").await.unwrap();
        assert_eq!(first, DeleteOutcome::Deleted);
        let second = delete_file(&client, TEST_TOKEN, "gone").await.unwrap();
        assert_eq!(second, DeleteOutcome::AlreadyAbsent);
        assert_eq!(backend.state().deletes, vec!["gone", "gone"]);
    }

    #[tokio::test]
    async fn test_delete_unauthorized() {
        let (backend, client) = setup().await;
        backend.add_file("f1", "x.txt", b"x");
        let err = delete_file(&client, "nope", "f1").await.unwrap_err();
        assert_eq!(err.status(), Some(401));
        assert_eq!(backend.file_ids(), vec!["f1"]);
    }

    #[tokio::test]
    async fn test_download_blob_is_unauthenticated() {
        let (backend, client) = setup().await;
        backend.add_file("b1", "data.bin", &[9, 8, 7]);
        let url = format!("http://{}/blob/b1", backend.addr);

        let bytes = download_blob(&client, &url).await.unwrap();
        assert_eq!(bytes, vec![9, 8, 7]);
        assert_eq!(backend.state().blob_requests_with_auth, 0);

        let missing = format!("http://{}/blob/none", backend.addr);
        let err = download_blob(&client, &missing).await.unwrap_err();
        assert_eq!(err.status(), Some(404));
    }
}
