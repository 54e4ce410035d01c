#![allow(dead_code)]

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use ocr_upload_tracker::models::{
    DocumentDescriptor, DocumentId, DocumentStatus, PipelineMessage, PipelineStatus,
    UploadResponse,
};
use ocr_upload_tracker::services::pipeline_client::{PipelineApi, ProgressCallback};
use ocr_upload_tracker::{Result, SourceFile, TrackedItem, TrackerError};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::new("ocr_upload_tracker=debug"))
        .with(fmt::layer().with_test_writer())
        .try_init();
}

/// Scripted behaviour of `upload` for one file name.
#[derive(Debug, Clone)]
pub enum UploadScript {
    Accept(Option<DocumentId>),
    Reject(Option<String>),
    Hang,
}

/// One step of a scripted event channel.
#[derive(Debug, Clone)]
pub enum EventScript {
    Message(PipelineMessage),
    Fault,
    Hang,
}

pub fn event(step: &str, status: &str) -> EventScript {
    EventScript::Message(PipelineMessage {
        step: Some(step.to_string()),
        status: Some(match status {
            "completed" => PipelineStatus::Completed,
            "failed" => PipelineStatus::Failed,
            "processing" => PipelineStatus::Processing,
            _ => PipelineStatus::Other,
        }),
        ocr_text: None,
        error: None,
    })
}

pub fn event_with(step: &str, status: &str, ocr_text: Option<&str>, error: Option<&str>) -> EventScript {
    match event(step, status) {
        EventScript::Message(mut msg) => {
            msg.ocr_text = ocr_text.map(str::to_string);
            msg.error = error.map(str::to_string);
            EventScript::Message(msg)
        }
        other => other,
    }
}

pub fn descriptor(id: DocumentId, status: DocumentStatus, error: Option<&str>) -> DocumentDescriptor {
    DocumentDescriptor {
        id,
        status,
        error_message: error.map(str::to_string),
        filename: None,
        original_filename: None,
        file_type: None,
        page_count: None,
        chunk_count: None,
        ocr_confidence_avg: None,
        created_at: None,
        updated_at: None,
    }
}

/// In-memory pipeline: uploads, status answers and event channels are all
/// scripted per file name / document id.
#[derive(Default)]
pub struct MockPipelineApi {
    uploads: Mutex<HashMap<String, UploadScript>>,
    statuses: Mutex<HashMap<DocumentId, VecDeque<Result<DocumentDescriptor>>>>,
    events: Mutex<HashMap<DocumentId, Vec<EventScript>>>,
    status_calls: Mutex<HashMap<DocumentId, usize>>,
    status_delay: Mutex<Option<Duration>>,
    next_id: AtomicUsize,
    pub streams_opened: Arc<AtomicUsize>,
    pub streams_closed: Arc<AtomicUsize>,
}

impl MockPipelineApi {
    pub fn new() -> Self {
        Self {
            next_id: AtomicUsize::new(1),
            ..Default::default()
        }
    }

    pub fn script_upload(&self, file_name: &str, script: UploadScript) {
        self.uploads
            .lock()
            .unwrap()
            .insert(file_name.to_string(), script);
    }

    /// Status answers are consumed in order; the last one repeats.
    pub fn script_statuses(&self, id: DocumentId, answers: Vec<Result<DocumentDescriptor>>) {
        self.statuses
            .lock()
            .unwrap()
            .insert(id, answers.into_iter().collect());
    }

    pub fn script_events(&self, id: DocumentId, events: Vec<EventScript>) {
        self.events.lock().unwrap().insert(id, events);
    }

    /// Every status answer is held back by `delay` before it is returned.
    pub fn delay_statuses(&self, delay: Duration) {
        *self.status_delay.lock().unwrap() = Some(delay);
    }

    pub fn status_calls(&self, id: DocumentId) -> usize {
        self.status_calls
            .lock()
            .unwrap()
            .get(&id)
            .copied()
            .unwrap_or(0)
    }
}

struct CloseGuard(Arc<AtomicUsize>);

impl Drop for CloseGuard {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl PipelineApi for MockPipelineApi {
    async fn upload(&self, file: &SourceFile, on_progress: ProgressCallback) -> Result<UploadResponse> {
        let script = self
            .uploads
            .lock()
            .unwrap()
            .get(file.name())
            .cloned()
            .unwrap_or_else(|| {
                UploadScript::Accept(Some(self.next_id.fetch_add(1, Ordering::SeqCst) as DocumentId))
            });

        match script {
            UploadScript::Accept(id) => {
                on_progress(50);
                on_progress(100);
                Ok(UploadResponse {
                    message: Some("File uploaded successfully. Processing started.".to_string()),
                    document: id.map(|id| descriptor(id, DocumentStatus::Pending, None)),
                })
            }
            UploadScript::Reject(detail) => Err(TrackerError::Api {
                status: 422,
                detail,
            }),
            UploadScript::Hang => {
                on_progress(10);
                std::future::pending().await
            }
        }
    }

    async fn document_status(&self, document_id: DocumentId) -> Result<DocumentDescriptor> {
        *self
            .status_calls
            .lock()
            .unwrap()
            .entry(document_id)
            .or_insert(0) += 1;

        let delay = *self.status_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut statuses = self.statuses.lock().unwrap();
        let Some(queue) = statuses.get_mut(&document_id) else {
            return Ok(descriptor(document_id, DocumentStatus::Processing, None));
        };

        if queue.len() > 1 {
            return queue.pop_front().unwrap();
        }
        match queue.front() {
            Some(Ok(doc)) => Ok(doc.clone()),
            Some(Err(_)) => Err(TrackerError::Stream("scripted status failure".to_string())),
            None => Ok(descriptor(document_id, DocumentStatus::Processing, None)),
        }
    }

    fn document_events(&self, document_id: DocumentId) -> BoxStream<'static, Result<PipelineMessage>> {
        let script = self
            .events
            .lock()
            .unwrap()
            .get(&document_id)
            .cloned()
            .unwrap_or_default();

        self.streams_opened.fetch_add(1, Ordering::SeqCst);
        let guard = CloseGuard(self.streams_closed.clone());

        async_stream::stream! {
            let _guard = guard;
            for step in script {
                match step {
                    EventScript::Message(msg) => {
                        tokio::task::yield_now().await;
                        yield Ok(msg);
                    }
                    EventScript::Fault => {
                        yield Err(TrackerError::Stream("connection reset".to_string()));
                        return;
                    }
                    EventScript::Hang => {
                        std::future::pending::<()>().await;
                    }
                }
            }
        }
        .boxed()
    }
}

pub fn pdf(name: &str) -> SourceFile {
    SourceFile::new(name, b"%PDF-1.5 test".to_vec())
}

pub fn png(name: &str) -> SourceFile {
    SourceFile::new(name, b"\x89PNG\r\n\x1a\n".to_vec())
}

pub fn find<'a>(items: &'a [TrackedItem], name: &str) -> &'a TrackedItem {
    items
        .iter()
        .find(|item| item.file.name == name)
        .unwrap_or_else(|| panic!("no item named {}", name))
}
