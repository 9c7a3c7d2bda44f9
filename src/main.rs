use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use comics_migrate::cli::migrate::{self, MigrateConfig, MigrationKind};
use comics_migrate::cli::parse::{self, ParseConfig, ParseKind};
use comics_migrate::logging;
use comics_migrate::model::CreditRole;
use comics_migrate::progress::ProgressMode;
use comics_migrate::util::env as env_util;

#[derive(Parser, Debug)]
#[command(
    name = "comics-migrate",
    version,
    about = "Migrate free-text story columns into structured tables"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
#[command(rename_all = "kebab-case")]
enum Commands {
    /// Parse `characters` into characters and appearances
    Characters {
        #[command(flatten)]
        run: RunArgs,
    },
    /// Parse the credit columns into creators and story credits
    Credits {
        #[command(flatten)]
        run: RunArgs,
        /// Comma-separated credit roles to extract (default: all)
        #[arg(long, value_delimiter = ',')]
        roles: Vec<CreditRole>,
    },
    /// Parse a single text value and print the result as JSON
    Parse {
        #[arg(long, value_enum)]
        kind: ParseKind,
        /// Credit role for `--kind credits`
        #[arg(long, default_value = "script")]
        role: CreditRole,
        text: String,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Optional override for the database URL
    #[arg(long)]
    db_url: Option<String>,
    /// Custom source query (must return the extractor's columns, ascending by id)
    #[arg(long)]
    query: Option<String>,
    /// Resume the default query after this story id
    #[arg(long, default_value_t = 0)]
    after_id: i64,
    /// Rows completed by earlier runs
    #[arg(long, default_value_t = 0)]
    starting_complete: i64,
    /// Expected total rows, for percent and ETA
    #[arg(long)]
    total: Option<i64>,
    /// Count the source rows first when --total is absent
    #[arg(long, default_value_t = false)]
    count: bool,
    /// Read the source but keep all writes in memory
    #[arg(long, default_value_t = false)]
    dry_run: bool,
    /// Progress display (default: in-place on a terminal, append otherwise)
    #[arg(long, value_enum)]
    progress: Option<ProgressMode>,
    /// Render progress every N rows (env MIGRATE_REPORT_EVERY, default 1)
    #[arg(long)]
    report_every: Option<u64>,
    /// Log a progress event every N rows, 0 disables (env MIGRATE_LOG_EVERY, default 1000)
    #[arg(long)]
    log_every: Option<u64>,
    /// Pool size, at least 2 (env MIGRATE_MAX_CONNS, default 4)
    #[arg(long)]
    max_connections: Option<u32>,
}

impl RunArgs {
    fn into_config(self, roles: Vec<CreditRole>) -> MigrateConfig {
        MigrateConfig {
            database_url: self.db_url,
            query: self.query,
            after_id: self.after_id,
            starting_complete: self.starting_complete,
            total: self.total,
            count: self.count,
            dry_run: self.dry_run,
            progress: self.progress,
            report_every: self.report_every,
            log_every: self.log_every,
            max_connections: self.max_connections,
            roles,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init_tracing("info,sqlx=warn")?;
    let cli = Cli::parse();

    match cli.command {
        Commands::Characters { run } => {
            env_util::bootstrap_cli("comics-migrate characters");
            migrate::run(MigrationKind::Characters, run.into_config(Vec::new())).await
        }
        Commands::Credits { run, roles } => {
            env_util::bootstrap_cli("comics-migrate credits");
            migrate::run(MigrationKind::Credits, run.into_config(roles)).await
        }
        Commands::Parse { kind, role, text } => parse::run(ParseConfig { kind, role, text }),
    }
}
