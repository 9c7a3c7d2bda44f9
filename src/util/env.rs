//! Environment helpers: centralized dotenv loading and ergonomic getters.
//! Call `init_env()` once early in each binary (or rely on lazy Once).
use std::str::FromStr;
use std::sync::Once;
use tracing::{info, warn};

static INIT: Once = Once::new();

/// Load .env exactly once. Safe to call many times.
///
/// Looks in the working directory first, then next to the crate manifest.
pub fn init_env() {
    INIT.call_once(|| {
        if dotenv::dotenv().is_ok() {
            return;
        }
        let candidate = format!("{}/.env", env!("CARGO_MANIFEST_DIR"));
        let _ = dotenv::from_filename(candidate);
    });
}

/// Common bootstrap for the CLI: load env and note which DSN source applies.
pub fn bootstrap_cli(bin_name: &str) {
    init_env();
    match dsn_source() {
        Some(source) => info!(target = "bootstrap", bin = bin_name, source, "database DSN source"),
        None => warn!(
            target = "bootstrap",
            bin = bin_name,
            "no database DSN configured; set DATABASE_URL or DB_HOST/DB_USERNAME"
        ),
    }
}

/// Get optional env var (None if unset or empty).
pub fn env_opt(key: &str) -> Option<String> {
    init_env();
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

/// Get parsed value with default fallback.
pub fn env_parse<T>(key: &str, default: T) -> T
where
    T: FromStr + Clone,
{
    init_env();
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse::<T>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Boolean flag; accepts 1/true/on/yes (case-insensitive) as true.
pub fn env_flag(key: &str, default: bool) -> bool {
    init_env();
    match std::env::var(key) {
        Ok(raw) => {
            let v = raw.trim().to_ascii_lowercase();
            matches!(v.as_str(), "1" | "true" | "on" | "yes")
        }
        Err(_) => default,
    }
}

fn dsn_source() -> Option<&'static str> {
    if env_opt("DATABASE_URL").is_some() {
        Some("DATABASE_URL")
    } else if env_opt("DB_URL").is_some() {
        Some("DB_URL")
    } else if env_opt("DB_HOST").is_some() && env_opt("DB_USERNAME").is_some() {
        Some("DB_*")
    } else {
        None
    }
}

/// Database URL: explicit DSN first, then one composed from DB_* parts.
pub fn db_url() -> anyhow::Result<String> {
    init_env();
    for k in ["DATABASE_URL", "DB_URL"] {
        if let Some(v) = env_opt(k) {
            return Ok(v.trim().to_string());
        }
    }
    if let Some(dsn) = build_dsn_from_db_vars() {
        return Ok(dsn);
    }
    Err(anyhow::anyhow!("no database URL env vars set"))
}

fn build_dsn_from_db_vars() -> Option<String> {
    let host = env_opt("DB_HOST")?;
    let user = env_opt("DB_USERNAME")?;
    let password = env_opt("DB_PASSWORD");
    let database = env_opt("DB_DATABASE").unwrap_or_else(|| "postgres".into());
    let port = env_opt("DB_PORT").unwrap_or_else(|| "5432".into());
    let ssl_mode = env_opt("DB_SSLMODE").unwrap_or_else(|| "prefer".into());
    compose_dsn(&host, port.trim().parse().unwrap_or(5432), &user, password.as_deref(), &database, &ssl_mode)
}

/// Build a postgres DSN with user/password percent-encoded via `url::Url`.
pub fn compose_dsn(
    host: &str,
    port: u16,
    user: &str,
    password: Option<&str>,
    database: &str,
    ssl_mode: &str,
) -> Option<String> {
    let mut out = url::Url::parse("postgresql://localhost").ok()?;
    out.set_username(user).ok()?;
    if let Some(pass) = password {
        out.set_password(Some(pass)).ok()?;
    }

    let host_trimmed = host.trim().trim_matches(|c| c == '[' || c == ']');
    if host_trimmed.contains(':') {
        out.set_host(Some(&format!("[{host_trimmed}]"))).ok()?;
    } else {
        out.set_host(Some(host_trimmed)).ok()?;
    }
    out.set_port(Some(port)).ok()?;
    out.set_path(&format!("/{database}"));
    if ssl_mode != "disable" {
        out.query_pairs_mut().append_pair("sslmode", ssl_mode);
    }
    Some(out.to_string())
}

/// Replace credentials in a postgres DSN; anything unparseable is hidden.
pub fn redact_database_url(raw: &str) -> String {
    let trimmed = raw.trim();
    match url::Url::parse(trimmed) {
        Ok(mut u) if matches!(u.scheme(), "postgres" | "postgresql") => {
            if !u.username().is_empty() {
                let _ = u.set_username("***");
            }
            if u.password().is_some() {
                let _ = u.set_password(Some("***"));
            }
            u.to_string()
        }
        _ => "***".to_string(),
    }
}

fn redact_value(key: &str, val: &str) -> String {
    let k = key.to_ascii_uppercase();
    if k.contains("PASSWORD") || k.contains("SECRET") || k.contains("TOKEN") {
        return "***".to_string();
    }
    let val_trim = val.trim();
    if k.contains("URL") || k.contains("DSN") || val_trim.starts_with("postgres") {
        return redact_database_url(val_trim);
    }
    val_trim.to_string()
}

/// Log a consolidated, redacted snapshot of configuration.
/// Returns error if any required key is missing.
pub fn preflight_check(title: &str, required: &[&str], also_log: &[&str]) -> anyhow::Result<()> {
    init_env();
    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|k| env_opt(k).is_none())
        .collect();
    let snapshot: Vec<(String, String)> = also_log
        .iter()
        .filter_map(|&k| env_opt(k).map(|v| (k.to_string(), redact_value(k, &v))))
        .collect();
    info!(target = "preflight", title, snapshot = ?snapshot, "configuration snapshot");
    if !missing.is_empty() {
        return Err(anyhow::anyhow!("missing required env: {:?}", missing));
    }
    Ok(())
}
