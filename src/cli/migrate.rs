use std::io::{self, IsTerminal, Stdout};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{error, info};

use crate::extract::{CharacterExtractor, CreditExtractor, Extractor};
use crate::model::CreditRole;
use crate::pipeline::{PipelineOptions, RunSummary, UpdatePipeline};
use crate::progress::ProgressMode;
use crate::store::{MemoryStore, MemoryStoreSummary, PgStore};
use crate::util::db::Db;
use crate::util::env as env_util;

pub const DEFAULT_MAX_CONNECTIONS: u32 = 4;
pub const DEFAULT_LOG_EVERY: u64 = 1000;

const PREFLIGHT_KEYS: &[&str] = &[
    "DATABASE_URL",
    "DB_URL",
    "DB_HOST",
    "DB_PORT",
    "DB_USERNAME",
    "DB_PASSWORD",
    "DB_DATABASE",
    "DB_SSLMODE",
    "MIGRATE_MAX_CONNS",
    "MIGRATE_REPORT_EVERY",
    "MIGRATE_LOG_EVERY",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationKind {
    Characters,
    Credits,
}

impl MigrationKind {
    /// Source query over `gcd_story`, ascending by id from `after_id`.
    pub fn default_query(&self, after_id: i64) -> String {
        match self {
            MigrationKind::Characters => format!(
                r#"
        SELECT s.id::BIGINT AS id, s.characters, se.publisher_id::BIGINT AS publisher_id
        FROM gcd_story s
          JOIN gcd_issue i ON i.id = s.issue_id
          JOIN gcd_series se ON se.id = i.series_id
        WHERE s.id > {after_id}
          AND s.characters IS NOT NULL AND s.characters <> ''
        ORDER BY s.id
    "#
            ),
            MigrationKind::Credits => format!(
                r#"
        SELECT s.id::BIGINT AS id, s.script, s.pencils, s.inks, s.colors, s.letters, s.editing
        FROM gcd_story s
        WHERE s.id > {after_id}
        ORDER BY s.id
    "#
            ),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MigrateConfig {
    /// Optional override for the Postgres connection string.
    pub database_url: Option<String>,
    /// Custom source query; replaces the default one (and `after_id`).
    pub query: Option<String>,
    pub after_id: i64,
    pub starting_complete: i64,
    pub total: Option<i64>,
    /// Count the query's rows first when `total` is not given.
    pub count: bool,
    /// Read from the database but write into memory only.
    pub dry_run: bool,
    pub progress: Option<ProgressMode>,
    pub report_every: Option<u64>,
    pub log_every: Option<u64>,
    pub max_connections: Option<u32>,
    /// Credit roles to extract; empty means all.
    pub roles: Vec<CreditRole>,
}

impl MigrateConfig {
    fn pipeline_options(&self) -> PipelineOptions {
        let progress_mode = self.progress.unwrap_or_else(|| {
            if io::stdout().is_terminal() {
                ProgressMode::InPlace
            } else {
                ProgressMode::Append
            }
        });
        PipelineOptions {
            progress_mode,
            report_every: self
                .report_every
                .unwrap_or_else(|| env_util::env_parse("MIGRATE_REPORT_EVERY", 1))
                .max(1),
            log_every: self
                .log_every
                .unwrap_or_else(|| env_util::env_parse("MIGRATE_LOG_EVERY", DEFAULT_LOG_EVERY)),
        }
    }

    fn credit_roles(&self) -> Vec<CreditRole> {
        if self.roles.is_empty() {
            CreditRole::ALL.to_vec()
        } else {
            self.roles.clone()
        }
    }
}

/// Printed to stdout as JSON once the run ends.
#[derive(Debug, Serialize)]
pub struct MigrateOutcome {
    pub kind: MigrationKind,
    pub dry_run: bool,
    pub rows: u64,
    pub failed_rows: u64,
    pub entities: u64,
    pub completed: i64,
    pub total_expected: Option<i64>,
    pub last_row_id: Option<i64>,
    pub elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_store: Option<MemoryStoreSummary>,
}

impl MigrateOutcome {
    fn new(
        kind: MigrationKind,
        cfg: &MigrateConfig,
        total_expected: Option<i64>,
        summary: &RunSummary,
        memory_store: Option<MemoryStoreSummary>,
    ) -> Self {
        Self {
            kind,
            dry_run: cfg.dry_run,
            rows: summary.rows,
            failed_rows: summary.failed_rows,
            entities: summary.entities,
            completed: summary.completed,
            total_expected,
            last_row_id: summary.last_row_id,
            elapsed_ms: summary.elapsed.as_millis() as u64,
            memory_store,
        }
    }
}

pub async fn run(kind: MigrationKind, cfg: MigrateConfig) -> Result<()> {
    env_util::init_env();
    env_util::preflight_check("comics-migrate", &[], PREFLIGHT_KEYS)?;

    let database_url = if let Some(url) = cfg.database_url.clone() {
        url
    } else {
        env_util::db_url()?
    };
    let max_connections = cfg
        .max_connections
        .unwrap_or_else(|| env_util::env_parse("MIGRATE_MAX_CONNS", DEFAULT_MAX_CONNECTIONS));
    let db = Db::connect(&database_url, max_connections)
        .await
        .with_context(|| {
            format!(
                "connecting to {}",
                env_util::redact_database_url(&database_url)
            )
        })?;

    let query = match &cfg.query {
        Some(q) => q.clone(),
        None => kind.default_query(cfg.after_id),
    };
    let total_expected = match cfg.total {
        Some(total) => Some(total),
        None if cfg.count => {
            let total = db
                .count_query_rows(&query)
                .await
                .context("counting source rows")?;
            info!(total, "source rows counted");
            Some(total)
        }
        None => None,
    };

    let mut pipeline = UpdatePipeline::new(io::stdout(), cfg.pipeline_options());
    let outcome = match (kind, cfg.dry_run) {
        (MigrationKind::Characters, false) => {
            let extractor = CharacterExtractor::new(PgStore::new(db.clone()));
            let summary =
                execute(&mut pipeline, &db, &query, &cfg, total_expected, &extractor).await?;
            MigrateOutcome::new(kind, &cfg, total_expected, &summary, None)
        }
        (MigrationKind::Characters, true) => {
            let extractor = CharacterExtractor::new(MemoryStore::new());
            let summary =
                execute(&mut pipeline, &db, &query, &cfg, total_expected, &extractor).await?;
            let store = extractor.store().summary();
            MigrateOutcome::new(kind, &cfg, total_expected, &summary, Some(store))
        }
        (MigrationKind::Credits, false) => {
            let extractor =
                CreditExtractor::with_roles(PgStore::new(db.clone()), cfg.credit_roles());
            let summary =
                execute(&mut pipeline, &db, &query, &cfg, total_expected, &extractor).await?;
            MigrateOutcome::new(kind, &cfg, total_expected, &summary, None)
        }
        (MigrationKind::Credits, true) => {
            let extractor = CreditExtractor::with_roles(MemoryStore::new(), cfg.credit_roles());
            let summary =
                execute(&mut pipeline, &db, &query, &cfg, total_expected, &extractor).await?;
            let store = extractor.store().summary();
            MigrateOutcome::new(kind, &cfg, total_expected, &summary, Some(store))
        }
    };

    println!("{}", serde_json::to_string_pretty(&outcome)?);
    info!(kind = ?kind, failed_rows = outcome.failed_rows, "comics-migrate done");
    Ok(())
}

async fn execute<E: Extractor>(
    pipeline: &mut UpdatePipeline<Stdout>,
    db: &Db,
    query: &str,
    cfg: &MigrateConfig,
    total_expected: Option<i64>,
    extractor: &E,
) -> Result<RunSummary> {
    match pipeline
        .run(db, query, cfg.starting_complete, total_expected, extractor)
        .await
    {
        Ok(summary) => Ok(summary),
        Err(err) => {
            let hint = err.resume_hint();
            if cfg.query.is_some() {
                // --after-id only filters the default query.
                error!(resume = %hint, "custom query: resume by restricting it past the last row id");
            } else {
                error!(resume = %hint, "rerun with these flags to resume");
            }
            Err(anyhow::Error::new(err).context(format!("migration stopped; resume with {hint}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_queries_resume_after_id_in_ascending_order() {
        for kind in [MigrationKind::Characters, MigrationKind::Credits] {
            let q = kind.default_query(1234);
            assert!(q.contains("WHERE s.id > 1234"));
            assert!(q.trim_end().ends_with("ORDER BY s.id"));
            assert!(q.contains("s.id::BIGINT AS id"));
        }
        assert!(MigrationKind::Characters
            .default_query(0)
            .contains("publisher_id::BIGINT AS publisher_id"));
        assert!(MigrationKind::Credits.default_query(0).contains("s.editing"));
    }

    #[test]
    fn explicit_flags_override_env_defaults() {
        let cfg = MigrateConfig {
            progress: Some(ProgressMode::Off),
            report_every: Some(0),
            log_every: Some(50),
            ..MigrateConfig::default()
        };
        let options = cfg.pipeline_options();
        assert_eq!(options.progress_mode, ProgressMode::Off);
        assert_eq!(options.report_every, 1);
        assert_eq!(options.log_every, 50);
    }

    #[test]
    fn empty_role_filter_means_every_role() {
        let cfg = MigrateConfig::default();
        assert_eq!(cfg.credit_roles(), CreditRole::ALL.to_vec());

        let cfg = MigrateConfig {
            roles: vec![CreditRole::Inks],
            ..MigrateConfig::default()
        };
        assert_eq!(cfg.credit_roles(), vec![CreditRole::Inks]);
    }

    #[test]
    fn live_outcome_omits_memory_summary() {
        let summary = RunSummary {
            rows: 3,
            completed: 3,
            ..RunSummary::default()
        };
        let live = MigrateOutcome::new(
            MigrationKind::Credits,
            &MigrateConfig::default(),
            Some(3),
            &summary,
            None,
        );
        let json = serde_json::to_value(&live).unwrap();
        assert_eq!(json["kind"], "credits");
        assert!(json.get("memory_store").is_none());
    }
}
