use crate::config::TrackerConfig;
use crate::error::{Result, TrackerError};
use crate::models::document::ErrorBody;
use crate::models::{DocumentDescriptor, DocumentId, PipelineMessage, SourceFile, UploadResponse};
use async_stream::stream;
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use futures::stream::BoxStream;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder, Response};
use reqwest_eventsource::{Event, EventSource};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use url::Url;

/// Receives byte-transfer progress of an upload as a 0-100 percentage.
pub type ProgressCallback = Arc<dyn Fn(u8) + Send + Sync>;

/// Size of the slices the upload body is streamed in.
const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// Remote side of the OCR pipeline as seen by the tracker.
#[async_trait]
pub trait PipelineApi: Send + Sync {
    /// Uploads one file and returns the created-document descriptor.
    async fn upload(&self, file: &SourceFile, on_progress: ProgressCallback)
    -> Result<UploadResponse>;

    /// Fetches the authoritative status of a document.
    async fn document_status(&self, document_id: DocumentId) -> Result<DocumentDescriptor>;

    /// Opens the server-sent event channel of a document. The stream yields
    /// an `Err` and ends if the channel faults; dropping it closes the
    /// connection.
    fn document_events(
        &self,
        document_id: DocumentId,
    ) -> BoxStream<'static, Result<PipelineMessage>>;
}

/// [`PipelineApi`] over HTTP.
pub struct HttpPipelineClient {
    client: Client,
    base_url: Url,
    auth_token: Option<String>,
    request_timeout: Duration,
}

impl HttpPipelineClient {
    pub fn new(base_url: &str, auth_token: Option<String>, request_timeout: Duration) -> Result<Self> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder().build()?;

        Ok(Self {
            client,
            base_url,
            auth_token,
            request_timeout,
        })
    }

    pub fn from_config(config: &TrackerConfig) -> Result<Self> {
        Self::new(
            &config.api_base_url,
            config.auth_token.clone(),
            config.request_timeout,
        )
    }

    pub fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.auth_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let detail = response
            .json::<ErrorBody>()
            .await
            .ok()
            .and_then(|body| body.detail_text());

        Err(TrackerError::Api {
            status: status.as_u16(),
            detail,
        })
    }
}

/// Splits `data` into cheap slices and reports cumulative progress as the
/// HTTP body pulls them.
fn progress_body(data: Bytes, on_progress: ProgressCallback) -> reqwest::Body {
    let total = data.len() as u64;
    let chunks: Vec<Bytes> = (0..data.len())
        .step_by(UPLOAD_CHUNK_SIZE)
        .map(|start| data.slice(start..(start + UPLOAD_CHUNK_SIZE).min(data.len())))
        .collect();
    let sent = Arc::new(AtomicU64::new(0));

    let body = futures::stream::iter(chunks).map(move |chunk| {
        let done = sent.fetch_add(chunk.len() as u64, Ordering::Relaxed) + chunk.len() as u64;
        on_progress(percent(done, total));
        Ok::<_, std::io::Error>(chunk)
    });

    reqwest::Body::wrap_stream(body)
}

pub fn percent(done: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    ((done.min(total) * 100) / total) as u8
}

#[async_trait]
impl PipelineApi for HttpPipelineClient {
    async fn upload(
        &self,
        file: &SourceFile,
        on_progress: ProgressCallback,
    ) -> Result<UploadResponse> {
        let url = self.endpoint("upload")?;
        tracing::debug!("Uploading '{}' ({} bytes) to {}", file.name(), file.size(), url);

        if file.size() == 0 {
            on_progress(100);
        }

        let part = Part::stream_with_length(
            progress_body(file.data().clone(), on_progress),
            file.size(),
        )
        .file_name(file.name().to_string())
        .mime_str(file.content_type().as_ref())?;

        let response = self
            .request(Method::POST, url)
            .timeout(self.request_timeout)
            .multipart(Form::new().part("file", part))
            .send()
            .await?;

        let body = Self::check(response).await?.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn document_status(&self, document_id: DocumentId) -> Result<DocumentDescriptor> {
        let url = self.endpoint(&format!("documents/{}", document_id))?;
        let response = self
            .request(Method::GET, url)
            .timeout(self.request_timeout)
            .send()
            .await?;

        let body = Self::check(response).await?.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    fn document_events(
        &self,
        document_id: DocumentId,
    ) -> BoxStream<'static, Result<PipelineMessage>> {
        let url = match self.endpoint(&format!("documents/{}/events", document_id)) {
            Ok(url) => url,
            Err(e) => return futures::stream::once(async move { Err(e) }).boxed(),
        };

        tracing::debug!("Subscribing to {}", url);
        let mut source = match EventSource::new(self.request(Method::GET, url)) {
            Ok(source) => source,
            Err(e) => {
                let err = TrackerError::Stream(e.to_string());
                return futures::stream::once(async move { Err(err) }).boxed();
            }
        };
        source.set_retry_policy(Box::new(reqwest_eventsource::retry::Never));

        Box::pin(stream! {
            while let Some(event) = source.next().await {
                match event {
                    Ok(Event::Open) => {
                        tracing::debug!("Event stream opened for document {}", document_id);
                    }
                    Ok(Event::Message(msg)) => {
                        let data = msg.data.trim();
                        if data.is_empty() || data == "keepalive" {
                            continue;
                        }
                        match serde_json::from_str::<PipelineMessage>(data) {
                            Ok(message) => yield Ok(message),
                            Err(e) => {
                                tracing::warn!(
                                    "Ignoring malformed event for document {}: {} - Data: {}",
                                    document_id,
                                    e,
                                    data
                                );
                            }
                        }
                    }
                    Err(e) => {
                        source.close();
                        yield Err(TrackerError::Stream(e.to_string()));
                        break;
                    }
                }
            }
        })
    }
}
