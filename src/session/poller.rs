use std::fmt;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::{AbortHandle, JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::api::{BootstrapJob, BootstrapSubmission, JobHandle, JobId, JobStatus, SharedApi};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollOptions {
    pub interval: Duration,
    // Attach a user-facing completion message to the finished event
    pub notify: bool,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self { interval: Duration::from_millis(2000), notify: true }
    }
}

/// Completion message for a terminal job.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JobNotice {
    Completed { succeeded: u32 },
    PartialFailure { succeeded: u32, failed: u32 },
    Failed { message: String },
    Skipped { reason: String },
}

impl JobNotice {
    fn for_outcome(status: JobStatus, succeeded: u32, failed: u32, message: Option<&str>) -> Self {
        match status {
            JobStatus::Failed => JobNotice::Failed {
                message: message
                    .map(str::trim)
                    .filter(|m| !m.is_empty())
                    .unwrap_or("graph build failed")
                    .to_string(),
            },
            JobStatus::Skipped => JobNotice::Skipped { reason: message.unwrap_or_default().to_string() },
            _ if failed > 0 || status == JobStatus::PartialFailed => JobNotice::PartialFailure { succeeded, failed },
            _ => JobNotice::Completed { succeeded },
        }
    }

    /// Failures that still produced a graph are not hard errors.
    pub fn is_error(&self) -> bool { matches!(self, JobNotice::Failed { .. }) }
}

impl fmt::Display for JobNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobNotice::Completed { succeeded } => write!(f, "graph build finished ({} sources)", succeeded),
            JobNotice::PartialFailure { failed, .. } => write!(f, "graph build finished; {} sources failed", failed),
            JobNotice::Failed { message } => f.write_str(message),
            JobNotice::Skipped { .. } => f.write_str("graph build skipped"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JobEvent {
    Finished {
        job_id: Option<JobId>,
        status: JobStatus,
        succeeded: u32,
        failed: u32,
        polls: u32,
        notice: Option<JobNotice>,
    },
    PollFailed {
        job_id: Option<JobId>,
        error: String,
        polls: u32,
    },
}

impl JobEvent {
    pub fn job_id(&self) -> Option<JobId> {
        match self {
            JobEvent::Finished { job_id, .. } | JobEvent::PollFailed { job_id, .. } => *job_id,
        }
    }

    pub fn polls(&self) -> u32 {
        match self {
            JobEvent::Finished { polls, .. } | JobEvent::PollFailed { polls, .. } => *polls,
        }
    }
}

/// How a poller task ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollExit {
    Finished,
    Failed,
    Cancelled,
}

struct ActivePoller {
    job_id: Option<JobId>,
    cancel: CancellationToken,
    task: AbortHandle,
}

/// Holds at most one running poller. Starting a new job cancels the previous one, and dropping the
/// slot cancels whatever is still running.
pub struct PollerSlot {
    api: SharedApi,
    events: mpsc::UnboundedSender<JobEvent>,
    active: Option<ActivePoller>,
}

impl PollerSlot {
    pub fn new(api: SharedApi) -> (Self, mpsc::UnboundedReceiver<JobEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { api, events: tx, active: None }, rx)
    }

    pub fn start(&mut self, submission: BootstrapSubmission, options: PollOptions) -> JoinHandle<PollExit> {
        self.cancel();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run(
            self.api.clone(),
            submission.clone(),
            options,
            cancel.clone(),
            self.events.clone(),
        ));
        self.active = Some(ActivePoller { job_id: submission.job_id, cancel, task: task.abort_handle() });
        task
    }

    pub fn cancel(&mut self) {
        if let Some(prev) = self.active.take() {
            if !prev.task.is_finished() {
                log::debug!("cancelling poller for job {:?}", prev.job_id);
            }
            prev.cancel.cancel();
        }
    }

    pub fn active_job(&self) -> Option<JobId> {
        self.active.as_ref().filter(|a| !a.task.is_finished()).and_then(|a| a.job_id)
    }

    pub fn is_running(&self) -> bool {
        self.active.as_ref().is_some_and(|a| !a.task.is_finished())
    }
}

impl Drop for PollerSlot {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn finished(job: &BootstrapJob, polls: u32, notify: bool) -> JobEvent {
    JobEvent::Finished {
        job_id: Some(job.job_id),
        status: job.status,
        succeeded: job.succeeded_count,
        failed: job.failed_count,
        polls,
        notice: notify.then(|| {
            JobNotice::for_outcome(job.status, job.succeeded_count, job.failed_count, job.error_message.as_deref())
        }),
    }
}

fn emit(events: &mpsc::UnboundedSender<JobEvent>, cancel: &CancellationToken, event: JobEvent) {
    if cancel.is_cancelled() {
        return;
    }
    if events.send(event).is_err() {
        log::debug!("job event dropped, no receiver");
    }
}

async fn run(
    api: SharedApi,
    submission: BootstrapSubmission,
    options: PollOptions,
    cancel: CancellationToken,
    events: mpsc::UnboundedSender<JobEvent>,
) -> PollExit {
    if cancel.is_cancelled() {
        return PollExit::Cancelled;
    }
    if submission.status.is_terminal() || submission.job_id.is_none() {
        if !submission.status.is_terminal() {
            let error = format!("server reported status '{}' without a job id", submission.status);
            log::warn!("graph build submission: {}", error);
            emit(&events, &cancel, JobEvent::PollFailed { job_id: None, error, polls: 0 });
            return PollExit::Failed;
        }
        let status = submission.status;
        let notice = options.notify.then(|| {
            JobNotice::for_outcome(status, submission.source_count, submission.failed_count, Some(submission.reason.as_str()))
        });
        log::info!("graph build already {} at submission (job {:?})", status, submission.job_id);
        emit(
            &events,
            &cancel,
            JobEvent::Finished {
                job_id: submission.job_id,
                status,
                succeeded: submission.source_count,
                failed: submission.failed_count,
                polls: 0,
                notice,
            },
        );
        return PollExit::Finished;
    }

    let Some(handle) = submission.handle() else {
        let error = "submission did not name a workspace".to_string();
        emit(&events, &cancel, JobEvent::PollFailed { job_id: submission.job_id, error, polls: 0 });
        return PollExit::Failed;
    };
    poll_until_terminal(api, handle, options, cancel, events).await
}

async fn poll_until_terminal(
    api: SharedApi,
    handle: JobHandle,
    options: PollOptions,
    cancel: CancellationToken,
    events: mpsc::UnboundedSender<JobEvent>,
) -> PollExit {
    let mut polls: u32 = 0;
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return PollExit::Cancelled,
            _ = tokio::time::sleep(options.interval) => {}
        }
        polls += 1;
        log::debug!("polling job {} (poll {})", handle.job_id, polls);
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return PollExit::Cancelled,
            r = api.bootstrap_status(handle) => r,
        };
        match outcome {
            Err(e) => {
                let error = format!("{e:#}");
                log::warn!("polling job {} failed: {}", handle.job_id, error);
                emit(&events, &cancel, JobEvent::PollFailed { job_id: Some(handle.job_id), error, polls });
                return PollExit::Failed;
            }
            Ok(job) if job.status.is_terminal() => {
                log::info!(
                    "job {} finished: {} ({} ok, {} failed, {} polls)",
                    handle.job_id,
                    job.status,
                    job.succeeded_count,
                    job.failed_count,
                    polls
                );
                emit(&events, &cancel, finished(&job, polls, options.notify));
                return PollExit::Finished;
            }
            Ok(job) => log::debug!("job {} still {}", handle.job_id, job.status),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notice_wording_follows_status() {
        assert_eq!(
            JobNotice::for_outcome(JobStatus::Done, 4, 0, None).to_string(),
            "graph build finished (4 sources)"
        );
        let partial = JobNotice::for_outcome(JobStatus::Done, 3, 2, None);
        assert_eq!(partial.to_string(), "graph build finished; 2 sources failed");
        assert!(!partial.is_error());
        let failed = JobNotice::for_outcome(JobStatus::Failed, 0, 5, Some("embedding service down"));
        assert_eq!(failed.to_string(), "embedding service down");
        assert!(failed.is_error());
        assert_eq!(JobNotice::for_outcome(JobStatus::Skipped, 0, 0, None).to_string(), "graph build skipped");
    }
}
