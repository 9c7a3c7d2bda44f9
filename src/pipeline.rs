//! Streams a SELECT through an `Extractor`, one row at a time.
//!
//! One connection holds the server-side cursor for the whole run; extractors
//! write through the pool. Row failures are counted and skipped. Losing the
//! database, on the cursor or while writing, ends the run early.

use std::io::Write;
use std::time::{Duration, Instant};

use futures::{Stream, StreamExt};
use sqlx::{postgres::PgRow, FromRow};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::extract::{int_column, ExtractError, Extractor};
use crate::progress::{self, ProgressDisplay, ProgressMode, ProgressState};
use crate::util::db::Db;

#[derive(Debug, Clone, Copy)]
pub struct PipelineOptions {
    pub progress_mode: ProgressMode,
    /// Render every Nth row (min 1).
    pub report_every: u64,
    /// Emit a tracing event every Nth row; 0 disables. Ignored in in-place mode.
    pub log_every: u64,
}

impl PipelineOptions {
    /// Periodic log events are off in in-place mode. Lines written to a
    /// shared terminal between two reports would be overwritten by the
    /// cursor rewind.
    pub fn effective_log_every(&self) -> u64 {
        match self.progress_mode {
            ProgressMode::InPlace => 0,
            ProgressMode::Append | ProgressMode::Off => self.log_every,
        }
    }
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            progress_mode: ProgressMode::InPlace,
            report_every: 1,
            log_every: 1000,
        }
    }
}

/// Totals of one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub rows: u64,
    pub failed_rows: u64,
    pub entities: u64,
    /// Completed count including rows done by earlier runs.
    pub completed: i64,
    pub last_row_id: Option<i64>,
    pub elapsed: Duration,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(
        "connection failure after {completed} completed rows (last row id {last_row_id:?}) running `{query}`"
    )]
    Connection {
        query: String,
        completed: i64,
        last_row_id: Option<i64>,
        #[source]
        source: sqlx::Error,
    },
}

impl PipelineError {
    /// CLI flags that resume the run where it stopped.
    pub fn resume_hint(&self) -> String {
        match self {
            PipelineError::Connection {
                completed,
                last_row_id,
                ..
            } => match last_row_id {
                Some(id) => format!("--starting-complete {completed} --after-id {id}"),
                None => format!("--starting-complete {completed}"),
            },
        }
    }
}

pub struct UpdatePipeline<W> {
    display: ProgressDisplay<W>,
    options: PipelineOptions,
}

impl<W: Write> UpdatePipeline<W> {
    pub fn new(out: W, options: PipelineOptions) -> Self {
        Self {
            display: ProgressDisplay::new(out, options.progress_mode),
            options,
        }
    }

    pub fn into_writer(self) -> W {
        self.display.into_inner()
    }

    /// Run `query` once and feed every row to `extractor`.
    ///
    /// `starting_complete` and `total_expected` only drive the progress
    /// math; skipping already migrated rows is the query's job.
    pub async fn run<E: Extractor>(
        &mut self,
        db: &Db,
        query: &str,
        starting_complete: i64,
        total_expected: Option<i64>,
        extractor: &E,
    ) -> Result<RunSummary, PipelineError> {
        let mut conn = db
            .pool
            .acquire()
            .await
            .map_err(|source| PipelineError::Connection {
                query: query.to_string(),
                completed: starting_complete,
                last_row_id: None,
                source,
            })?;
        info!(
            query,
            starting_complete,
            total_expected = ?total_expected,
            "update pipeline: starting"
        );

        let rows = sqlx::query(query)
            .persistent(false)
            .fetch(&mut *conn)
            .map(|res| res.map(|row| decode_row::<E::Row>(&row)));

        self.drive(query, rows, starting_complete, total_expected, extractor)
            .await
    }

    /// The row loop over an already opened result stream.
    ///
    /// Outer `Err` items are cursor failures and end the run; inner `Err`
    /// items are rows that could not be decoded.
    pub async fn drive<E, S>(
        &mut self,
        query: &str,
        rows: S,
        starting_complete: i64,
        total_expected: Option<i64>,
        extractor: &E,
    ) -> Result<RunSummary, PipelineError>
    where
        E: Extractor,
        S: Stream<Item = Result<Result<E::Row, ExtractError>, sqlx::Error>>,
    {
        let started = Instant::now();
        let report_every = self.options.report_every.max(1);
        let log_every = self.options.effective_log_every();
        let label = extractor.item_label().to_string();
        let mut state = ProgressState::new(starting_complete, total_expected);
        let mut summary = RunSummary {
            completed: starting_complete,
            ..RunSummary::default()
        };
        let mut current_id = None;
        let mut rendered_rows = 0;

        futures::pin_mut!(rows);
        while let Some(item) = rows.next().await {
            let decoded = match item {
                Ok(decoded) => decoded,
                Err(source) => return Err(connection_lost(query, &state, &summary, source)),
            };

            let call_started = Instant::now();
            let outcome = match decoded {
                Ok(row) => extractor.extract_and_persist(&row).await,
                Err(e) => Err(e),
            };
            let elapsed = call_started.elapsed();

            // A row whose writes hit a dead database is not completed.
            current_id = match outcome {
                Ok(extracted) => {
                    summary.entities += extracted.entities as u64;
                    Some(extracted.row_id)
                }
                Err(ExtractError::Connection { row_id, source }) => {
                    warn!(row_id, "update pipeline: row not persisted, database unreachable");
                    return Err(connection_lost(query, &state, &summary, source));
                }
                Err(err) => {
                    summary.failed_rows += 1;
                    warn!(
                        row_id = ?err.row_id(),
                        error = ?err,
                        "update pipeline: row failed; counted as zero entities"
                    );
                    err.row_id()
                }
            };
            state = state.record(elapsed);
            summary.rows += 1;
            if current_id.is_some() {
                summary.last_row_id = current_id;
            }

            if summary.rows % report_every == 0 {
                self.render(&state, &label, current_id);
                rendered_rows = summary.rows;
            }
            if log_every > 0 && summary.rows % log_every == 0 {
                info!(
                    completed = state.current_complete,
                    rows = summary.rows,
                    failed = summary.failed_rows,
                    entities = summary.entities,
                    last_row_id = ?summary.last_row_id,
                    "update pipeline: progress"
                );
            }
        }
        if rendered_rows != summary.rows {
            self.render(&state, &label, current_id);
        }

        summary.completed = state.current_complete;
        summary.elapsed = started.elapsed();
        info!(
            rows = summary.rows,
            failed = summary.failed_rows,
            entities = summary.entities,
            completed = summary.completed,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "update pipeline: result set exhausted"
        );
        Ok(summary)
    }

    fn render(&mut self, state: &ProgressState, label: &str, current_id: Option<i64>) {
        if let Some(report) = progress::report(state, label, current_id) {
            if let Err(e) = self.display.render(&report) {
                warn!(error = %e, "update pipeline: progress display write failed");
            }
        }
    }
}

fn connection_lost(
    query: &str,
    state: &ProgressState,
    summary: &RunSummary,
    source: sqlx::Error,
) -> PipelineError {
    error!(
        query,
        completed = state.current_complete,
        last_row_id = ?summary.last_row_id,
        error = %source,
        "update pipeline: connection failure; stopping run"
    );
    PipelineError::Connection {
        query: query.to_string(),
        completed: state.current_complete,
        last_row_id: summary.last_row_id,
        source,
    }
}

fn decode_row<R>(row: &PgRow) -> Result<R, ExtractError>
where
    R: for<'r> FromRow<'r, PgRow>,
{
    R::from_row(row).map_err(|source| ExtractError::Decode {
        row_id: int_column(row, "id").ok().flatten(),
        source,
    })
}
