use std::collections::BTreeMap;
use std::io::Cursor;
use std::path::Path;

use chrono::{DateTime, Utc};
use google_drive3::{api::File, api::Scope, hyper_rustls, hyper_util, yup_oauth2, DriveHub};
use tokio::runtime::Handle;
use tracing::{debug, info};

use super::gateway::{ArtifactStore, StorageError};
use crate::workflows::wizard::{ArtifactUrl, FileHandle};

const DRIVE_FILE_PREFIX: &str = "https://drive.google.com/file/d/";

/// HTTPS connector used by the service-account hub.
pub type DriveConnector =
    hyper_rustls::HttpsConnector<hyper_util::client::legacy::connect::HttpConnector>;

/// Artifact store backed by Google Drive folders, one folder per bucket.
///
/// Workflows stay synchronous; each call blocks on the runtime handle. Callers inside
/// that runtime must come from a blocking thread (`spawn_blocking`).
pub struct GoogleDriveArtifactStore<C>
where
    C: google_drive3::common::Connector + Send + Sync + 'static,
{
    hub: DriveHub<C>,
    runtime: Handle,
    bucket_folders: BTreeMap<String, String>,
}

impl<C> GoogleDriveArtifactStore<C>
where
    C: google_drive3::common::Connector + Send + Sync + 'static,
{
    pub fn new(hub: DriveHub<C>, runtime: Handle, bucket_folders: BTreeMap<String, String>) -> Self {
        Self {
            hub,
            runtime,
            bucket_folders,
        }
    }

    pub fn with_current_runtime(
        hub: DriveHub<C>,
        bucket_folders: BTreeMap<String, String>,
    ) -> Result<Self, StorageError> {
        let runtime = Handle::try_current().map_err(Self::map_error)?;
        Ok(Self::new(hub, runtime, bucket_folders))
    }

    fn map_error<E: std::fmt::Display>(err: E) -> StorageError {
        StorageError::Unavailable(err.to_string())
    }
}

impl GoogleDriveArtifactStore<DriveConnector> {
    /// Authenticate with a service-account key file and bind to the current runtime.
    pub async fn from_service_account(
        key_path: &Path,
        bucket_folders: BTreeMap<String, String>,
    ) -> Result<Self, StorageError> {
        let key = yup_oauth2::read_service_account_key(key_path)
            .await
            .map_err(Self::map_error)?;
        let auth = yup_oauth2::ServiceAccountAuthenticator::builder(key)
            .build()
            .await
            .map_err(Self::map_error)?;

        let connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_native_roots()
            .map_err(Self::map_error)?
            .https_or_http()
            .enable_http1()
            .build();
        let client =
            hyper_util::client::legacy::Client::builder(hyper_util::rt::TokioExecutor::new())
                .build(connector);

        info!(buckets = bucket_folders.len(), "google drive artifact store authenticated");
        Self::with_current_runtime(DriveHub::new(client, auth), bucket_folders)
    }
}

impl<C> std::fmt::Debug for GoogleDriveArtifactStore<C>
where
    C: google_drive3::common::Connector + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleDriveArtifactStore")
            .field("buckets", &self.bucket_folders.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl<C> ArtifactStore for GoogleDriveArtifactStore<C>
where
    C: google_drive3::common::Connector + Send + Sync + 'static,
{
    fn upload(
        &self,
        artifact: &FileHandle,
        bucket: &str,
        folder: Option<&str>,
    ) -> Result<ArtifactUrl, StorageError> {
        let parent = self
            .bucket_folders
            .get(bucket)
            .ok_or_else(|| StorageError::Rejected(format!("no drive folder configured for bucket '{bucket}'")))?;

        let metadata = File {
            name: Some(artifact_name(folder, &artifact.file_name, Utc::now())),
            mime_type: Some(artifact.mime_type.clone()),
            parents: Some(vec![parent.clone()]),
            ..File::default()
        };
        let media_type = artifact
            .mime_type
            .parse::<mime::Mime>()
            .unwrap_or(mime::APPLICATION_OCTET_STREAM);
        let cursor = Cursor::new(artifact.bytes().to_vec());

        let result = self.runtime.block_on(async {
            self.hub
                .files()
                .create(metadata)
                .param("fields", "id,webViewLink")
                .supports_all_drives(true)
                .add_scope(Scope::File)
                .upload(cursor, media_type)
                .await
        });

        let (_, file) = result.map_err(GoogleDriveArtifactStore::<C>::map_error)?;
        let id = file
            .id
            .ok_or_else(|| StorageError::Rejected("drive returned no file id".to_string()))?;
        debug!(bucket, file_id = %id, "drive upload completed");

        Ok(ArtifactUrl(
            file.web_view_link
                .unwrap_or_else(|| format!("{DRIVE_FILE_PREFIX}{id}/view")),
        ))
    }

    fn delete(&self, url: &ArtifactUrl) -> Result<(), StorageError> {
        let id = file_id_from_url(&url.0)
            .ok_or_else(|| StorageError::NotFound(url.0.clone()))?
            .to_string();

        let result = self.runtime.block_on(async {
            self.hub
                .files()
                .delete(&id)
                .supports_all_drives(true)
                .add_scope(Scope::Full)
                .doit()
                .await
        });

        result.map_err(GoogleDriveArtifactStore::<C>::map_error)?;
        Ok(())
    }
}

/// Drive has no paths; the folder and upload time become part of the file name.
pub fn artifact_name(folder: Option<&str>, file_name: &str, uploaded_at: DateTime<Utc>) -> String {
    let stamp = uploaded_at.format("%Y%m%dT%H%M%S");
    match folder.map(str::trim).filter(|folder| !folder.is_empty()) {
        Some(folder) => format!("{folder}/{stamp}-{file_name}"),
        None => format!("{stamp}-{file_name}"),
    }
}

/// Accepts `.../file/d/<id>/view` links and `?id=<id>` links.
pub fn file_id_from_url(url: &str) -> Option<&str> {
    if let Some(rest) = url.strip_prefix(DRIVE_FILE_PREFIX) {
        let id = rest.split(['/', '?']).next().unwrap_or_default();
        return (!id.is_empty()).then_some(id);
    }

    let (_, query) = url.split_once('?')?;
    query
        .split('&')
        .find_map(|pair| pair.strip_prefix("id="))
        .filter(|id| !id.is_empty())
}
