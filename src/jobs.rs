//! Clone Job Management
//!
//! Every submitted clone becomes a [`Job`] with an append-only event log.
//! Observers may subscribe at any time: they get the full history first and
//! then live events until the job finishes.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::cloner::WebsiteCloner;
use crate::error::CloneError;
use crate::events::{CloneResult, Event, EventSink};
use crate::url_resolver::normalize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Running,
    Completed,
    Failed,
}

/// Full job record, as returned by the job detail endpoint
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: Uuid,
    pub url: String,
    pub status: JobStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub events: Vec<Event>,
    pub result: Option<CloneResult>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
    pub id: Uuid,
    pub url: String,
    pub status: JobStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
}

impl From<&Job> for JobSummary {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id,
            url: job.url.clone(),
            status: job.status,
            start_time: job.start_time,
            end_time: job.end_time,
        }
    }
}

struct JobState {
    job: Job,
    subscribers: Vec<mpsc::UnboundedSender<Event>>,
}

/// One job's record and its observers. The event log and the subscriber
/// list share a lock, so a subscriber never misses or repeats an event.
pub struct JobHandle {
    state: Mutex<JobState>,
}

impl JobHandle {
    fn new(id: Uuid, url: String) -> Self {
        Self {
            state: Mutex::new(JobState {
                job: Job {
                    id,
                    url,
                    status: JobStatus::Running,
                    start_time: Utc::now(),
                    end_time: None,
                    events: Vec::new(),
                    result: None,
                },
                subscribers: Vec::new(),
            }),
        }
    }

    pub fn snapshot(&self) -> Job {
        self.state.lock().job.clone()
    }

    pub fn summary(&self) -> JobSummary {
        JobSummary::from(&self.state.lock().job)
    }

    pub fn publish(&self, event: Event) {
        let mut state = self.state.lock();
        state.job.events.push(event.clone());
        state.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.state.lock();
        for event in &state.job.events {
            // Receiver is held right here, send cannot fail
            let _ = tx.send(event.clone());
        }
        if state.job.status == JobStatus::Running {
            state.subscribers.push(tx);
        }
        Subscription { rx }
    }

    pub fn subscriber_count(&self) -> usize {
        let mut state = self.state.lock();
        state.subscribers.retain(|tx| !tx.is_closed());
        state.subscribers.len()
    }

    /// Record the pipeline outcome and publish the `complete` event.
    fn finish(&self, result: CloneResult) {
        let status = if result.success {
            JobStatus::Completed
        } else {
            JobStatus::Failed
        };
        self.close(status, Event::complete(result.clone()), result);
    }

    /// The pipeline task died without producing a result.
    fn abort(&self, message: String) {
        let result = CloneResult::failed(message.clone());
        let terminal = Event::error_with_result(message, result.clone());
        self.close(JobStatus::Failed, terminal, result);
    }

    fn close(&self, status: JobStatus, terminal: Event, result: CloneResult) {
        let mut state = self.state.lock();
        if state.job.status != JobStatus::Running {
            return;
        }
        state.job.status = status;
        state.job.end_time = Some(Utc::now());
        state.job.result = Some(result);
        state.job.events.push(terminal.clone());
        for tx in state.subscribers.drain(..) {
            let _ = tx.send(terminal.clone());
        }
    }
}

impl EventSink for JobHandle {
    fn emit(&self, event: Event) {
        self.publish(event);
    }
}

/// Events for one observer: history first, then live events. Ends once the
/// job has finished and everything has been delivered.
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<Event>,
}

impl Subscription {
    pub async fn recv(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    pub fn into_stream(self) -> UnboundedReceiverStream<Event> {
        UnboundedReceiverStream::new(self.rx)
    }
}

/// Owns every job of the process. Jobs are kept in memory only.
pub struct JobManager {
    jobs: DashMap<Uuid, Arc<JobHandle>>,
    cloner: Arc<WebsiteCloner>,
}

impl JobManager {
    pub fn new(cloner: Arc<WebsiteCloner>) -> Self {
        Self {
            jobs: DashMap::new(),
            cloner,
        }
    }

    /// Validate `input` and start a clone job in the background.
    ///
    /// Invalid input is rejected before a job exists.
    pub fn submit(&self, input: &str) -> Result<Uuid, CloneError> {
        let url = normalize(input)?.to_string();
        let job_id = Uuid::new_v4();
        let handle = Arc::new(JobHandle::new(job_id, url.clone()));
        self.jobs.insert(job_id, Arc::clone(&handle));
        info!("Started clone job {} for {}", job_id, url);

        let cloner = Arc::clone(&self.cloner);
        tokio::spawn(async move {
            let pipeline = tokio::spawn({
                let handle = Arc::clone(&handle);
                async move { cloner.clone_url(&url, &*handle).await }
            });

            match pipeline.await {
                Ok(result) => {
                    debug!("Clone job {} finished, success={}", job_id, result.success);
                    handle.finish(result);
                }
                Err(e) => {
                    error!("Clone job {} crashed: {}", job_id, e);
                    handle.abort(format!("Clone failed unexpectedly: {}", e));
                }
            }
        });

        Ok(job_id)
    }

    pub fn get(&self, job_id: &Uuid) -> Option<Job> {
        self.jobs.get(job_id).map(|handle| handle.snapshot())
    }

    /// All jobs, oldest first
    pub fn list(&self) -> Vec<JobSummary> {
        let mut jobs: Vec<JobSummary> = self.jobs.iter().map(|entry| entry.summary()).collect();
        jobs.sort_by_key(|job| job.start_time);
        jobs
    }

    pub fn subscribe(&self, job_id: &Uuid) -> Option<Subscription> {
        self.jobs.get(job_id).map(|handle| handle.subscribe())
    }

    pub fn subscriber_count(&self, job_id: &Uuid) -> Option<usize> {
        self.jobs.get(job_id).map(|handle| handle.subscriber_count())
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}
