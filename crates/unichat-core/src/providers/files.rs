//! Out-of-band file upload
//!
//! Large attachments are uploaded through a `FileService` and referenced by
//! URI. When no service is configured, or the upload fails, the file is
//! inlined as base64 instead of failing the turn.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;
use std::sync::Arc;

use super::error::{CompletionError, CompletionResult};
use super::http;
use super::traits::AdapterContext;
use crate::content::MediaPart;
use crate::logging::Logger;
use crate::types::{AbortHandle, FileRef, ModelDescriptor};

/// A file the backend can reference by URI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub uri: String,
    pub mime: String,
}

/// Upload service for large attachments
#[async_trait]
pub trait FileService: Send + Sync {
    /// Upload `data` for use with `model`
    async fn upload(
        &self,
        file: &FileRef,
        data: Vec<u8>,
        model: &ModelDescriptor,
        abort: &AbortHandle,
    ) -> CompletionResult<UploadedFile>;
}

/// Gemini Files API (raw upload protocol)
pub struct GeminiFileService {
    http: reqwest::Client,
    logger: Arc<dyn Logger>,
}

#[derive(Deserialize)]
struct GeminiUploadResponse {
    file: GeminiFile,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiFile {
    uri: String,
    #[serde(default)]
    mime_type: Option<String>,
}

impl GeminiFileService {
    pub fn new(http: reqwest::Client, logger: Arc<dyn Logger>) -> Self {
        Self { http, logger }
    }

    /// `https://host/v1beta` -> `https://host/upload/v1beta/files`
    fn upload_url(api_base: &str) -> String {
        match api_base.rfind("/v1") {
            Some(pos) => format!("{}/upload{}/files", &api_base[..pos], &api_base[pos..]),
            None => format!("{}/upload/v1beta/files", api_base),
        }
    }
}

#[async_trait]
impl FileService for GeminiFileService {
    async fn upload(
        &self,
        file: &FileRef,
        data: Vec<u8>,
        model: &ModelDescriptor,
        abort: &AbortHandle,
    ) -> CompletionResult<UploadedFile> {
        let key = model
            .api_key
            .as_deref()
            .ok_or_else(|| CompletionError::missing_api_key("gemini"))?;
        let url = Self::upload_url(&model.api_base());
        self.logger.debug(&format!(
            "[GeminiFiles] Uploading '{}' ({} bytes)",
            file.name,
            data.len()
        ));

        let request = self
            .http
            .post(&url)
            .header("x-goog-api-key", key)
            .header("X-Goog-Upload-Protocol", "raw")
            .header("X-Goog-Upload-File-Name", file.name.as_str())
            .header("Content-Type", file.mime.as_str())
            .body(data);
        let response = http::send(request, "gemini", abort).await?;
        let body = http::read_json(response, abort).await?;
        let parsed: GeminiUploadResponse = serde_json::from_value(body)?;

        Ok(UploadedFile {
            uri: parsed.file.uri,
            mime: parsed.file.mime_type.unwrap_or_else(|| file.mime.clone()),
        })
    }
}

/// A media part ready for the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireMedia {
    Uploaded(UploadedFile),
    Inline {
        data: String,
        mime: String,
        name: Option<String>,
    },
}

/// Resolve a media part, uploading when needed
///
/// Returns `None` when a large file cannot even be read; only an abort is
/// fatal.
pub async fn resolve_media(
    ctx: &AdapterContext,
    part: &MediaPart,
    model: &ModelDescriptor,
    abort: &AbortHandle,
) -> CompletionResult<Option<WireMedia>> {
    let file = match part {
        MediaPart::Inline { data, mime, name } => {
            return Ok(Some(WireMedia::Inline {
                data: data.clone(),
                mime: mime.clone(),
                name: name.clone(),
            }))
        }
        MediaPart::NeedsUpload { file } => file,
    };

    let data = match ctx.content.read_file(&file.id).await {
        Ok(data) => data,
        Err(e) => {
            ctx.logger
                .warn(&format!("[Files] Could not read '{}': {}", file.name, e));
            return Ok(None);
        }
    };

    if let Some(service) = &ctx.files {
        match service.upload(file, data.clone(), model, abort).await {
            Ok(uploaded) => return Ok(Some(WireMedia::Uploaded(uploaded))),
            Err(e) if e.is_aborted() => return Err(e),
            Err(e) => ctx.logger.warn(&format!(
                "[Files] Upload of '{}' failed, inlining instead: {}",
                file.name, e
            )),
        }
    }

    Ok(Some(WireMedia::Inline {
        data: STANDARD.encode(&data),
        mime: file.mime.clone(),
        name: Some(file.name.clone()),
    }))
}
