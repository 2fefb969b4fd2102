pub mod models {
    pub mod school;
}

pub mod config;
pub mod db {
    pub mod models;
}
pub mod error;
pub mod schema;
pub mod server;
pub mod services {
    pub mod attendance;
    pub mod courses;
    pub mod grid;
    pub mod groups;
    pub mod placement;
    pub mod rooms;
    pub mod schedule;
    pub mod seed;
    pub mod specialty;
    pub mod substitutions;
}
#[cfg(test)]
mod test_support;

use crate::config::Config;
use crate::server::AppState;
use crate::services::{groups, placement, schedule, seed};
use diesel::PgConnection;
use diesel::prelude::*;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use log::{error, info};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug)]
struct LoadedEnvFile {
    path: PathBuf,
    explicit: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Serve,
    Seed,
    GenerateSchedule,
    ResetGroupLimits,
}

impl Command {
    fn parse(name: &str) -> Option<Command> {
        match name {
            "serve" => Some(Command::Serve),
            "seed" => Some(Command::Seed),
            "generate-schedule" => Some(Command::GenerateSchedule),
            "reset-group-limits" => Some(Command::ResetGroupLimits),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Command::Serve => "serve",
            Command::Seed => "seed",
            Command::GenerateSchedule => "generate-schedule",
            Command::ResetGroupLimits => "reset-group-limits",
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
struct CliArgs {
    env_file: Option<PathBuf>,
    command: Command,
}

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

fn apply_database_migrations(conn: &mut PgConnection) -> Result<(), String> {
    match conn.run_pending_migrations(MIGRATIONS) {
        Ok(applied) => {
            if applied.is_empty() {
                info!("Database schema is up to date; no migrations were applied");
            } else {
                let names = applied.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(", ");
                info!("Applied {} database migration(s): {}", applied.len(), names);
            }
            Ok(())
        }
        Err(e) => Err(format!("Applying database migrations failed: {}", e)),
    }
}

fn generator_rng(cfg: &Config) -> SmallRng {
    match cfg.generator_seed {
        Some(seed) => {
            info!("Generator seeded with GENERATOR_SEED={}", seed);
            SmallRng::seed_from_u64(seed)
        }
        None => SmallRng::from_os_rng(),
    }
}

fn run(command: Command) -> Result<(), String> {
    // 1) Load config
    let cfg = Config::from_env()?;
    info!(
        "Config loaded (command={}, bind_addr={}, generator_seed={}, default_max_students={})",
        command.name(),
        cfg.bind_addr,
        cfg.generator_seed
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".to_string()),
        cfg.default_max_students
    );

    // 2) Connect DB
    let mut conn = PgConnection::establish(&cfg.database_url).map_err(|e| format!("DB connection failed: {}", e))?;
    info!("Connected to database");

    // 3) Apply pending database migrations
    apply_database_migrations(&mut conn)?;

    // 4) Dispatch
    match command {
        Command::Serve => {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .map_err(|e| format!("Starting async runtime failed: {}", e))?;
            let bind_addr = cfg.bind_addr.clone();
            let state = Arc::new(AppState::new(conn, cfg));
            runtime.block_on(server::serve(state, &bind_addr))?;
        }
        Command::Seed => {
            let mut rng = generator_rng(&cfg);
            let report = seed::run(&mut conn, cfg.default_max_students, &mut rng)
                .map_err(|e| format!("Seeding failed: {}", e))?;
            info!(
                "Seed complete (courses={}, groups={}, rooms={}, schedule rows={}, skipped groups={})",
                report.courses,
                report.groups,
                report.rooms,
                report.generation.rows_created,
                report.generation.groups_skipped
            );
        }
        Command::GenerateSchedule => {
            let deactivated = conn
                .transaction(schedule::deactivate_all)
                .map_err(|e| format!("Deactivating current timetable failed: {}", e))?;
            info!("Deactivated {} active schedule row(s)", deactivated);
            let mut rng = generator_rng(&cfg);
            let report = placement::run(&mut conn, &mut rng).map_err(|e| format!("Generation failed: {}", e))?;
            info!(
                "Timetable generated (groups={}, rows={}, dropped cells={})",
                report.groups_scheduled, report.rows_created, report.cells_dropped
            );
        }
        Command::ResetGroupLimits => {
            let updated = conn
                .transaction(|conn| groups::reset_limits(conn, cfg.default_max_students))
                .map_err(|e| format!("Resetting group limits failed: {}", e))?;
            info!(
                "Set max_students={} on {} group(s)",
                cfg.default_max_students, updated
            );
        }
    }

    Ok(())
}

fn parse_cli(mut args: impl Iterator<Item = OsString>) -> Result<CliArgs, String> {
    let mut env_file: Option<PathBuf> = None;
    let mut command: Option<Command> = None;

    while let Some(arg) = args.next() {
        match arg.to_str() {
            Some("--env-file") => {
                if env_file.is_some() {
                    return Err("`--env-file` provided more than once".to_string());
                }
                let value = args
                    .next()
                    .ok_or_else(|| "`--env-file` requires a path argument".to_string())?;
                env_file = Some(PathBuf::from(value));
            }
            Some(s) if s.starts_with("--env-file=") => {
                if env_file.is_some() {
                    return Err("`--env-file` provided more than once".to_string());
                }
                let path_str = &s["--env-file=".len()..];
                if path_str.is_empty() {
                    return Err("`--env-file` requires a path argument".to_string());
                }
                env_file = Some(PathBuf::from(path_str));
            }
            Some("--") => break,
            Some(other) => match Command::parse(other) {
                Some(_) if command.is_some() => return Err(format!("more than one command given: {}", other)),
                Some(c) => command = Some(c),
                None => return Err(format!("unrecognised argument: {}", other)),
            },
            None => return Err("argument contains invalid UTF-8".to_string()),
        }
    }

    Ok(CliArgs {
        env_file,
        command: command.unwrap_or(Command::Serve),
    })
}

fn configure_env(env_file: Option<PathBuf>) -> Result<Option<LoadedEnvFile>, String> {
    if let Some(path) = env_file {
        if !path.is_file() {
            return Err(format!("env file not found: {}", path.display()));
        }
        load_env_file(&path)?;
        Ok(Some(LoadedEnvFile { path, explicit: true }))
    } else {
        let cwd = std::env::current_dir().map_err(|e| format!("unable to read current directory: {}", e))?;
        let default_path = cwd.join(".env");
        if default_path.is_file() {
            load_env_file(&default_path)?;
            Ok(Some(LoadedEnvFile {
                path: default_path,
                explicit: false,
            }))
        } else {
            Ok(None)
        }
    }
}

fn load_env_file(path: &Path) -> Result<(), String> {
    use std::fs::File;
    use std::io::{BufRead, BufReader};

    let file = File::open(path).map_err(|e| format!("failed to open {}: {}", path.display(), e))?;
    let reader = BufReader::new(file);

    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| format!("failed to read {} at line {}: {}", path.display(), index + 1, e))?;
        match parse_env_assignment(&line) {
            Ok(Some((key, value))) => {
                // Values already present in the process environment win.
                if std::env::var_os(&key).is_none() {
                    // Updating process-level environment variables is unsafe on some targets.
                    unsafe {
                        std::env::set_var(key, value);
                    }
                }
            }
            Ok(None) => {}
            Err(e) => {
                return Err(format!("{}:{}: {}", path.display(), index + 1, e));
            }
        }
    }

    Ok(())
}

fn parse_env_assignment(line: &str) -> Result<Option<(String, String)>, String> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }

    let without_export = trimmed
        .strip_prefix("export ")
        .map(|s| s.trim_start())
        .unwrap_or(trimmed);

    let (key, value_part) = without_export
        .split_once('=')
        .ok_or_else(|| "missing '=' in assignment".to_string())?;
    let key = key.trim();

    if key.is_empty() {
        return Err("environment variable name cannot be empty".to_string());
    }
    if key.chars().any(|c| c.is_whitespace()) {
        return Err(format!("environment variable name contains whitespace: {}", key));
    }

    let value = parse_env_value(value_part)?;
    Ok(Some((key.to_string(), value)))
}

fn parse_env_value(raw: &str) -> Result<String, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(String::new());
    }

    if let Some(rest) = trimmed.strip_prefix('"') {
        parse_quoted(rest, '"', true)
    } else if let Some(rest) = trimmed.strip_prefix('\'') {
        parse_quoted(rest, '\'', false)
    } else {
        let value = trimmed.split('#').next().unwrap_or_default().trim_end();
        Ok(value.to_string())
    }
}

/// Read a quoted value up to `quote`. Backslash escapes apply only to
/// double-quoted values.
fn parse_quoted(input: &str, quote: char, escapes: bool) -> Result<String, String> {
    let mut result = String::new();
    let mut chars = input.chars();
    let mut escape = false;

    while let Some(ch) = chars.next() {
        if escape {
            result.push(match ch {
                'n' => '\n',
                'r' => '\r',
                't' => '\t',
                other => other,
            });
            escape = false;
            continue;
        }
        if escapes && ch == '\\' {
            escape = true;
        } else if ch == quote {
            let remainder = chars.as_str().trim();
            return if remainder.is_empty() || remainder.starts_with('#') {
                Ok(result)
            } else {
                Err(format!("unexpected characters after closing {} quote", quote))
            };
        } else {
            result.push(ch);
        }
    }

    if escape {
        Err("unterminated escape sequence in quoted value".to_string())
    } else {
        Err(format!("unterminated {}-quoted value", quote))
    }
}

fn main() {
    let cli = match parse_cli(std::env::args_os().skip(1)) {
        Ok(cli) => cli,
        Err(err) => {
            eprintln!("fatal: {}", err);
            eprintln!("usage: campus-schedule [--env-file PATH] [serve|seed|generate-schedule|reset-group-limits]");
            std::process::exit(2);
        }
    };
    let loaded_env = match configure_env(cli.env_file) {
        Ok(info) => info,
        Err(err) => {
            eprintln!("fatal: {}", err);
            std::process::exit(1);
        }
    };

    // Init logging after environment so RUST_LOG from .env is respected.
    let default_filter = env_logger::Env::default().default_filter_or("info");
    env_logger::Builder::from_env(default_filter)
        .format_timestamp_secs()
        .init();

    if let Some(info) = loaded_env.as_ref() {
        let origin = if info.explicit { "CLI-specified" } else { "default" };
        info!("Environment loaded from {} .env file: {}", origin, info.path.display());
    }

    info!(
        "campus-schedule {} (git {}) starting",
        env!("CARGO_PKG_VERSION"),
        env!("BUILD_TIME_GIT_HASH")
    );
    if let Err(e) = run(cli.command) {
        error!("fatal: {}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> Result<CliArgs, String> {
        parse_cli(args.iter().map(OsString::from))
    }

    #[test]
    fn command_defaults_to_serve() {
        let parsed = cli(&[]).unwrap();
        assert_eq!(parsed.command, Command::Serve);
        assert_eq!(parsed.env_file, None);
    }

    #[test]
    fn env_file_and_command_in_any_order() {
        let a = cli(&["--env-file", "prod.env", "seed"]).unwrap();
        let b = cli(&["seed", "--env-file=prod.env"]).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.command, Command::Seed);
        assert_eq!(a.env_file, Some(PathBuf::from("prod.env")));
    }

    #[test]
    fn bad_arguments_are_rejected() {
        assert!(cli(&["seed", "serve"]).is_err());
        assert!(cli(&["--env-file"]).is_err());
        assert!(cli(&["--env-file="]).is_err());
        assert!(cli(&["--env-file", "a", "--env-file", "b"]).is_err());
        assert!(cli(&["migrate"]).is_err());
    }

    #[test]
    fn every_command_name_round_trips() {
        for c in [
            Command::Serve,
            Command::Seed,
            Command::GenerateSchedule,
            Command::ResetGroupLimits,
        ] {
            assert_eq!(Command::parse(c.name()), Some(c));
        }
    }

    #[test]
    fn env_assignments_parse() {
        assert_eq!(parse_env_assignment("# comment").unwrap(), None);
        assert_eq!(parse_env_assignment("   ").unwrap(), None);
        assert_eq!(
            parse_env_assignment("export BIND_ADDR=0.0.0.0:80 # public").unwrap(),
            Some(("BIND_ADDR".to_string(), "0.0.0.0:80".to_string()))
        );
        assert_eq!(
            parse_env_assignment(r#"DATABASE_URL="postgres://a\"b""#).unwrap(),
            Some(("DATABASE_URL".to_string(), "postgres://a\"b".to_string()))
        );
        assert_eq!(
            parse_env_assignment(r"SEED='a\n#b'").unwrap(),
            Some(("SEED".to_string(), r"a\n#b".to_string()))
        );
        assert!(parse_env_assignment("NO_EQUALS").is_err());
        assert!(parse_env_assignment("BAD KEY=1").is_err());
        assert!(parse_env_assignment("X=\"open").is_err());
        assert!(parse_env_assignment("X='a' trailing").is_err());
    }
}
