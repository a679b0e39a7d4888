//! Scheduler (spec §4.7): a name-keyed table of periodic jobs, each firing a
//! one-shot Turn-engine run on its own interval, with at most one in-flight
//! run per job and stale-result discarding across replace/remove.
//!
//! No source in the example pack runs a recurring job loop the way this
//! needs to; the closest grounding is the teacher's `Client::auto_execute_loop`
//! for "build state, run the Turn loop, read back the result" — ticking
//! itself is plain `tokio::time::interval`, since the job model here is a
//! fixed-period interval rather than a cron expression (see DESIGN.md).
//!
//! Orphaning uses a per-job generation counter (`epoch`) rather than
//! cancelling the in-flight task: replacing or removing a job lets its
//! current run finish, but the result is compared against the job's epoch
//! at completion time and dropped silently if it no longer matches.

use crate::message::Message;
use crate::state::{AgentState, RunConfig, Status};
use crate::turn::{run_loop, TurnOptions};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tracing::{debug, warn};

pub type ResultCallback = Arc<dyn Fn(JobResult) + Send + Sync>;

/// A job definition as the caller supplies it to `start`/`add_job`.
#[derive(Clone)]
pub struct JobSpec {
    pub name: String,
    pub period_ms: u64,
    pub prompt: String,
    pub config: RunConfig,
    pub on_result: Option<ResultCallback>,
}

/// Outcome of one job run, handed to `on_result`.
#[derive(Debug, Clone)]
pub struct JobResult {
    pub name: String,
    pub status: Status,
    pub text: String,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Read-only snapshot for `list_jobs`.
#[derive(Debug, Clone)]
pub struct JobSnapshot {
    pub name: String,
    pub period_ms: u64,
    pub last_started_at: Option<DateTime<Utc>>,
    pub running: bool,
}

struct JobEntry {
    spec: JobSpec,
    epoch: u64,
    running: Option<u64>,
    last_started_at: Option<DateTime<Utc>>,
    timer_handle: tokio::task::AbortHandle,
}

type JobTable = Arc<StdMutex<HashMap<String, JobEntry>>>;

/// Owns the job table. Cheap to clone; clones share the same jobs.
#[derive(Clone)]
pub struct Scheduler {
    jobs: JobTable,
    next_epoch: Arc<AtomicU64>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Scheduler { jobs: Arc::new(StdMutex::new(HashMap::new())), next_epoch: Arc::new(AtomicU64::new(1)) }
    }

    /// Builds a scheduler and installs a timer for every job in `jobs`.
    pub fn start(jobs: Vec<JobSpec>) -> Self {
        let scheduler = Scheduler::new();
        for job in jobs {
            scheduler.add_job(job);
        }
        scheduler
    }

    pub fn list_jobs(&self) -> Vec<JobSnapshot> {
        let jobs = self.jobs.lock().unwrap();
        jobs.values()
            .map(|e| JobSnapshot {
                name: e.spec.name.clone(),
                period_ms: e.spec.period_ms,
                last_started_at: e.last_started_at,
                running: e.running.is_some(),
            })
            .collect()
    }

    /// Inserts a new job or replaces an existing one. On replace, the old
    /// timer is cancelled and a fresh epoch is assigned, so any run already
    /// in flight under the old definition becomes orphaned — its result is
    /// computed but silently discarded rather than delivered.
    pub fn add_job(&self, spec: JobSpec) {
        let epoch = self.next_epoch.fetch_add(1, Ordering::SeqCst);
        let timer_handle = install_timer(self.jobs.clone(), spec.name.clone(), spec.period_ms);

        let mut jobs = self.jobs.lock().unwrap();
        if let Some(old) = jobs.remove(&spec.name) {
            old.timer_handle.abort();
        }
        jobs.insert(
            spec.name.clone(),
            JobEntry { spec, epoch, running: None, last_started_at: None, timer_handle },
        );
    }

    /// Cancels the timer and drops the job entry. A run already in flight
    /// keeps running to completion but its result is orphaned.
    pub fn remove_job(&self, name: &str) -> crate::Result<()> {
        let mut jobs = self.jobs.lock().unwrap();
        let entry = jobs.remove(name).ok_or_else(|| crate::Error::not_found(name))?;
        entry.timer_handle.abort();
        Ok(())
    }

    /// Runs `name` immediately, bypassing its timer. Fails with
    /// `AlreadyRunning` if a run is already in flight for this job,
    /// `NotFound` if no such job is registered.
    pub fn trigger(&self, name: &str) -> crate::Result<()> {
        let epoch = {
            let mut jobs = self.jobs.lock().unwrap();
            let entry = jobs.get_mut(name).ok_or_else(|| crate::Error::not_found(name))?;
            if entry.running.is_some() {
                return Err(crate::Error::AlreadyRunning(name.to_string()));
            }
            entry.running = Some(entry.epoch);
            entry.epoch
        };
        tokio::spawn(run_job_once(self.jobs.clone(), name.to_string(), epoch));
        Ok(())
    }
}

/// Installs the periodic timer for one job. The immediate first tick
/// `tokio::time::interval` fires on construction is consumed and discarded
/// so a newly added job waits a full period before its first run, rather
/// than firing instantly.
fn install_timer(jobs: JobTable, name: String, period_ms: u64) -> tokio::task::AbortHandle {
    let handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(period_ms.max(1)));
        interval.tick().await;
        loop {
            interval.tick().await;

            let to_run = {
                let mut guard = jobs.lock().unwrap();
                match guard.get_mut(&name) {
                    None => return,
                    Some(entry) => {
                        if entry.running.is_some() {
                            debug!(job = %name, "tick skipped: previous run still in flight");
                            None
                        } else {
                            entry.running = Some(entry.epoch);
                            Some(entry.epoch)
                        }
                    }
                }
            };

            if let Some(epoch) = to_run {
                tokio::spawn(run_job_once(jobs.clone(), name.clone(), epoch));
            }
        }
    });
    handle.abort_handle()
}

/// Runs one job invocation: builds fresh agent state from the job's config,
/// seeds it with the job prompt, runs the Turn engine to completion, then
/// reconciles the result against the job table — delivering `on_result`
/// only if the job still exists and its epoch is unchanged.
async fn run_job_once(jobs: JobTable, name: String, epoch: u64) {
    let spec = {
        let guard = jobs.lock().unwrap();
        match guard.get(&name) {
            Some(entry) if entry.epoch == epoch => entry.spec.clone(),
            _ => return,
        }
    };

    let started_at = Utc::now();
    let mut state = AgentState::new(spec.config.clone());
    state.messages.push(Message::user(spec.prompt.clone()));
    let _ = run_loop(&mut state, TurnOptions::default()).await;
    let finished_at = Utc::now();

    let result = JobResult {
        name: name.clone(),
        status: state.status,
        text: state.messages.last().map(|m| m.text()).unwrap_or_default(),
        error: state.last_error.clone(),
        started_at,
        finished_at,
    };

    let callback = {
        let mut guard = jobs.lock().unwrap();
        match guard.get_mut(&name) {
            Some(entry) if entry.epoch == epoch => {
                entry.running = None;
                entry.last_started_at = Some(started_at);
                spec.on_result.clone()
            }
            _ => {
                warn!(job = %name, "discarding result from an orphaned run");
                return;
            }
        }
    };

    if let Some(cb) = callback {
        cb(result);
    }
}
