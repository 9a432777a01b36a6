//! Query execution contract.
//!
//! Compiled SQL is handed to a [`QueryExecutor`] together with its
//! destination table; [`wait_on_jobs`] polls the submitted jobs with
//! exponential backoff. [`SqlFileExecutor`] is the local executor: it writes
//! each query to disk instead of running it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::ast::TableRef;
use crate::config::WaitConfig;
use crate::error::{DeidError, DeidResult};

/// What happens when the destination table already holds data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WriteDisposition {
    #[serde(rename = "WRITE_TRUNCATE")]
    WriteTruncate,
    #[serde(rename = "WRITE_APPEND")]
    WriteAppend,
    /// Fail unless the destination is empty.
    #[default]
    #[serde(rename = "WRITE_EMPTY")]
    WriteEmpty,
}

impl WriteDisposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteDisposition::WriteTruncate => "WRITE_TRUNCATE",
            WriteDisposition::WriteAppend => "WRITE_APPEND",
            WriteDisposition::WriteEmpty => "WRITE_EMPTY",
        }
    }
}

impl std::fmt::Display for WriteDisposition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for WriteDisposition {
    type Err = DeidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "WRITE_TRUNCATE" | "TRUNCATE" => Ok(WriteDisposition::WriteTruncate),
            "WRITE_APPEND" | "APPEND" => Ok(WriteDisposition::WriteAppend),
            "WRITE_EMPTY" | "EMPTY" => Ok(WriteDisposition::WriteEmpty),
            other => Err(DeidError::Config(format!("unknown write disposition '{}'", other))),
        }
    }
}

/// Where a compiled query's result goes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    pub table: TableRef,
    pub write_disposition: WriteDisposition,
}

impl Destination {
    pub fn new(table: TableRef, write_disposition: WriteDisposition) -> Self {
        Self {
            table,
            write_disposition,
        }
    }
}

/// A submitted job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobHandle {
    pub id: String,
    pub destination: Destination,
    pub submitted_at: DateTime<Utc>,
}

impl JobHandle {
    pub fn new(destination: Destination) -> Self {
        let submitted_at = Utc::now();
        let id = format!(
            "deid_{}_{}",
            destination.table.table,
            submitted_at.format("%Y%m%d%H%M%S%6f")
        );
        Self {
            id,
            destination,
            submitted_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Pending,
    Running,
    Done,
    /// Finished with the engine's error messages.
    Failed(Vec<String>),
    /// The executor gave up on the job; its query is abandoned.
    Cancelled,
}

impl JobState {
    pub fn is_finished(&self) -> bool {
        !matches!(self, JobState::Pending | JobState::Running)
    }
}

/// A query engine that runs compiled SQL.
#[allow(async_fn_in_trait)]
pub trait QueryExecutor {
    async fn submit(&self, sql: &str, destination: &Destination) -> DeidResult<JobHandle>;

    async fn state(&self, job: &JobHandle) -> DeidResult<JobState>;
}

/// Poll schedule for [`wait_on_jobs`]: 1s first, then `2^i` seconds capped
/// at `max_poll_interval`, for `retry_count` rounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub retry_count: u32,
    pub max_poll_interval: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::from(&WaitConfig::default())
    }
}

impl From<&WaitConfig> for Backoff {
    fn from(config: &WaitConfig) -> Self {
        Self {
            retry_count: config.retry_count,
            max_poll_interval: config.max_poll_interval(),
        }
    }
}

impl Backoff {
    pub fn intervals(&self) -> impl Iterator<Item = Duration> + '_ {
        (0..self.retry_count).map(|round| {
            if round == 0 {
                return Duration::from_secs(1).min(self.max_poll_interval);
            }
            let seconds = 2u64.saturating_pow(round - 1);
            Duration::from_secs(seconds).min(self.max_poll_interval)
        })
    }
}

/// Wait until every job finishes.
///
/// A failed job surfaces as [`DeidError::Execution`], a cancelled one as
/// [`DeidError::Abandoned`]; jobs still running once the schedule is spent
/// surface as [`DeidError::JobTimeout`].
pub async fn wait_on_jobs<E: QueryExecutor>(
    executor: &E,
    jobs: &[JobHandle],
    backoff: &Backoff,
) -> DeidResult<()> {
    let mut pending: Vec<&JobHandle> = jobs.iter().collect();

    for interval in backoff.intervals() {
        if pending.is_empty() {
            return Ok(());
        }
        tracing::debug!(
            "Waiting {:?} for completion of job(s): {}",
            interval,
            pending.iter().map(|j| j.id.as_str()).collect::<Vec<_>>().join(", ")
        );
        tokio::time::sleep(interval).await;

        let mut still_pending = Vec::with_capacity(pending.len());
        for job in pending {
            match executor.state(job).await? {
                JobState::Done => tracing::info!(job = %job.id, table = %job.destination.table, "job done"),
                JobState::Failed(messages) => {
                    return Err(DeidError::Execution {
                        job: job.id.clone(),
                        messages,
                    });
                }
                JobState::Cancelled => {
                    return Err(DeidError::Abandoned { job: job.id.clone() });
                }
                JobState::Pending | JobState::Running => still_pending.push(job),
            }
        }
        pending = still_pending;
    }

    if pending.is_empty() {
        return Ok(());
    }
    let jobs: Vec<String> = pending.iter().map(|j| j.id.clone()).collect();
    tracing::warn!("Job(s) failed to complete: {}", jobs.join(", "));
    Err(DeidError::JobTimeout { jobs })
}

/// Job record written next to each query file.
#[derive(Debug, Serialize)]
struct JobRecord {
    job: JobHandle,
    sql_path: PathBuf,
    state: JobState,
}

/// Writes each compiled query to `<output_dir>/<dataset>/<table>.sql`.
///
/// Jobs complete immediately. `WRITE_EMPTY` fails when the file already
/// exists, `WRITE_APPEND` appends, `WRITE_TRUNCATE` replaces.
#[derive(Debug)]
pub struct SqlFileExecutor {
    output_dir: PathBuf,
    states: Mutex<HashMap<String, JobState>>,
    submitted: AtomicU64,
}

impl SqlFileExecutor {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            states: Mutex::new(HashMap::new()),
            submitted: AtomicU64::new(0),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn sql_path(&self, table: &TableRef) -> PathBuf {
        self.output_dir
            .join(table.dataset_or_empty())
            .join(format!("{}.sql", table.table))
    }

    async fn write(&self, sql: &str, destination: &Destination, path: &Path) -> DeidResult<JobState> {
        let exists = tokio::fs::try_exists(path).await?;

        let state = match destination.write_disposition {
            WriteDisposition::WriteEmpty if exists => JobState::Failed(vec![format!(
                "{} already exists and write disposition is {}",
                destination.table, destination.write_disposition
            )]),
            WriteDisposition::WriteAppend if exists => {
                let mut text = tokio::fs::read_to_string(path).await?;
                text.push_str(";\n");
                text.push_str(sql);
                tokio::fs::write(path, text).await?;
                JobState::Done
            }
            _ => {
                tokio::fs::write(path, sql).await?;
                JobState::Done
            }
        };
        Ok(state)
    }
}

impl QueryExecutor for SqlFileExecutor {
    async fn submit(&self, sql: &str, destination: &Destination) -> DeidResult<JobHandle> {
        let mut job = JobHandle::new(destination.clone());
        job.id = format!("{}_{}", job.id, self.submitted.fetch_add(1, Ordering::Relaxed));
        let path = self.sql_path(&destination.table);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let state = self.write(sql, destination, &path).await?;

        let record = JobRecord {
            job: job.clone(),
            sql_path: path.clone(),
            state: state.clone(),
        };
        tokio::fs::write(path.with_extension("job.json"), serde_json::to_vec_pretty(&record)?).await?;

        tracing::info!(job = %job.id, path = %path.display(), state = ?state, "query written");
        self.states.lock().await.insert(job.id.clone(), state);
        Ok(job)
    }

    async fn state(&self, job: &JobHandle) -> DeidResult<JobState> {
        Ok(self
            .states
            .lock()
            .await
            .get(&job.id)
            .cloned()
            .unwrap_or(JobState::Cancelled))
    }
}
