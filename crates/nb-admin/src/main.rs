//! nb-admin: operator commands against the NB database.
//!
//! Applies migrations, manages account credentials and runs ad-hoc
//! parameterized SQL through the same executor the data layer uses.

mod config;

use std::io::{self, Write};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use nb_db::record::{insert, update};
use nb_db::rusqlite::types::Value;
use nb_db::{
    applied_migrations, create_pool, run_migrations, Db, DbError, DbPool, ExecutorSettings,
    MigrationError, NamedRow, PoolError, TransactionMode,
};
use nb_models::User;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "nb-admin",
    version,
    about = "Administer the NB annotation database"
)]
struct Cli {
    /// Configuration file (TOML); missing file means defaults
    #[arg(long, global = true, env = "NB_CONFIG_PATH", default_value = "nb.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Apply pending schema migrations
    Migrate,
    /// Create an account
    CreateUser(CreateUserArgs),
    /// Replace the password of an account
    SetPassword(PasswordArgs),
    /// Verify a password; exits non-zero on mismatch
    CheckPassword(CheckPasswordArgs),
    /// Run one parameterized statement and print the rows as JSON
    Query(QueryArgs),
    /// List entity tables with their row counts
    Tables,
}

#[derive(Args, Debug)]
struct CreateUserArgs {
    /// Email address (unique)
    #[arg(long)]
    email: String,

    #[arg(long)]
    first: Option<String>,

    #[arg(long)]
    last: Option<String>,

    /// Initial password
    #[arg(long, env = "NB_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Mark the account confirmed
    #[arg(long)]
    valid: bool,
}

#[derive(Args, Debug)]
struct PasswordArgs {
    #[arg(long)]
    email: String,

    #[arg(long, env = "NB_PASSWORD", hide_env_values = true)]
    password: String,
}

#[derive(Args, Debug)]
struct CheckPasswordArgs {
    #[command(flatten)]
    account: PasswordArgs,

    /// Re-hash a password that only matches the legacy digest
    #[arg(long)]
    upgrade: bool,
}

#[derive(Args, Debug)]
struct QueryArgs {
    /// SQL with `?` placeholders
    sql: String,

    /// Arguments bound in order; integers and decimals bind as numbers
    args: Vec<String>,
}

/// Errors that end an nb-admin run.
#[derive(Debug, Error)]
enum AdminError {
    #[error(transparent)]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error(transparent)]
    Database(#[from] DbError),

    #[error(transparent)]
    Migration(#[from] MigrationError),

    #[error("no account with email {0}")]
    UnknownUser(String),

    #[error("failed to encode output: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),
}

/// How a command ended when it did not fail outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Done,
    Rejected,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(Outcome::Done) => ExitCode::SUCCESS,
        Ok(Outcome::Rejected) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            eprintln!("nb-admin: {e}");
            ExitCode::from(2)
        }
    }
}

fn run(cli: Cli) -> Result<Outcome, AdminError> {
    let config = config::load_config(&cli.config)?;

    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("warn"));
    if config.logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .init();
    }

    tracing::info!(
        path = %cli.config,
        db = %config.database.path,
        engine = %config.database.engine,
        "resolved configuration"
    );

    let pool = create_pool(&config.database.path, config.database.runtime_settings())?;
    let settings = config.database.executor_settings();
    execute(&pool, &settings, cli.command, &mut io::stdout().lock())
}

/// Runs one command, writing its report to `out`.
///
/// Work done through the executor is committed before returning.
fn execute(
    pool: &DbPool,
    settings: &ExecutorSettings,
    command: Commands,
    out: &mut impl Write,
) -> Result<Outcome, AdminError> {
    let mut settings = settings.clone();
    if let Commands::Migrate = command {
        // Migrations open their own transaction.
        settings.transaction_mode = TransactionMode::Autocommit;
    }

    let mut db = Db::new(pool.clone(), settings);
    let outcome = match command {
        Commands::Migrate => migrate(&mut db, out)?,
        Commands::CreateUser(args) => create_user(&mut db, args, out)?,
        Commands::SetPassword(args) => set_password(&mut db, args, out)?,
        Commands::CheckPassword(args) => check_password(&mut db, args, out)?,
        Commands::Query(args) => query(&mut db, args, out)?,
        Commands::Tables => tables(&mut db, out)?,
    };
    db.commit()?;
    Ok(outcome)
}

fn migrate(db: &mut Db, out: &mut impl Write) -> Result<Outcome, AdminError> {
    let applied = run_migrations(db.connection()?)?;
    if applied > 0 {
        tracing::info!(count = applied, "applied database migrations");
    }
    writeln!(out, "applied {applied} migration(s)")?;
    for name in applied_migrations(db.connection()?)? {
        writeln!(out, "  {name}")?;
    }
    Ok(Outcome::Done)
}

fn find_user(db: &mut Db, email: &str) -> Result<User, AdminError> {
    User::find_by_email(db, email)?.ok_or_else(|| AdminError::UnknownUser(email.to_string()))
}

fn create_user(db: &mut Db, args: CreateUserArgs, out: &mut impl Write) -> Result<Outcome, AdminError> {
    let mut user = User::new(&args.email, args.first.as_deref(), args.last.as_deref());
    user.valid = args.valid;
    if let Some(password) = &args.password {
        user.set_password(password);
    }
    let id = insert(db, &mut user)?;
    tracing::info!(user = id.get(), "created account");
    writeln!(out, "created {user}")?;
    Ok(Outcome::Done)
}

fn set_password(db: &mut Db, args: PasswordArgs, out: &mut impl Write) -> Result<Outcome, AdminError> {
    let mut user = find_user(db, &args.email)?;
    user.set_password(&args.password);
    update(db, &user)?;
    writeln!(out, "password updated for {user}")?;
    Ok(Outcome::Done)
}

fn check_password(
    db: &mut Db,
    args: CheckPasswordArgs,
    out: &mut impl Write,
) -> Result<Outcome, AdminError> {
    let mut user = find_user(db, &args.account.email)?;
    let password = &args.account.password;

    if user.authenticate(password) {
        writeln!(out, "ok")?;
        return Ok(Outcome::Done);
    }
    if user.authenticate_legacy(password) {
        if args.upgrade && user.upgrade_legacy_password(password) {
            update(db, &user)?;
            writeln!(out, "ok (legacy digest upgraded)")?;
        } else {
            writeln!(out, "ok (legacy digest)")?;
        }
        return Ok(Outcome::Done);
    }
    writeln!(out, "mismatch")?;
    Ok(Outcome::Rejected)
}

fn query(db: &mut Db, args: QueryArgs, out: &mut impl Write) -> Result<Outcome, AdminError> {
    let values: Vec<Value> = args.args.iter().map(|a| parse_arg(a)).collect();
    let params: Vec<&dyn nb_db::rusqlite::ToSql> =
        values.iter().map(|v| v as &dyn nb_db::rusqlite::ToSql).collect();

    let mut cursor = db.execute(&args.sql, &params)?;
    if cursor.columns().is_empty() {
        let report = serde_json::json!({ "rows_affected": cursor.rows_affected() });
        writeln!(out, "{report}")?;
        return Ok(Outcome::Done);
    }

    let columns = cursor.columns().to_vec();
    let names: Vec<(&str, Option<&str>)> = columns.iter().map(|c| (c.as_str(), None)).collect();
    let mut rows = Vec::new();
    Db::get_rows_by_name(&mut cursor, &names, &mut rows)?;

    let json: Vec<serde_json::Value> = rows.into_iter().map(row_to_json).collect();
    writeln!(out, "{}", serde_json::to_string_pretty(&json)?)?;
    Ok(Outcome::Done)
}

fn tables(db: &mut Db, out: &mut impl Write) -> Result<Outcome, AdminError> {
    let names = db.get_rows(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name LIKE 'base\\_%' ESCAPE '\\' ORDER BY name",
        &[],
    )?;
    for row in names {
        let Some(Value::Text(name)) = row.into_iter().next() else {
            continue;
        };
        let count = match db.get_val(&format!("SELECT COUNT(*) FROM {name}"), &[])? {
            Some(Value::Integer(n)) => n,
            _ => 0,
        };
        writeln!(out, "{name}\t{count}")?;
    }
    Ok(Outcome::Done)
}

/// Binds integers and finite decimals as numbers, anything else as text.
fn parse_arg(arg: &str) -> Value {
    if let Ok(n) = arg.parse::<i64>() {
        return Value::Integer(n);
    }
    match arg.parse::<f64>() {
        Ok(x) if x.is_finite() && arg.contains('.') => Value::Real(x),
        _ => Value::Text(arg.to_string()),
    }
}

fn value_to_json(value: Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Integer(n) => n.into(),
        Value::Real(x) => serde_json::Number::from_f64(x)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::Text(s) => s.into(),
        Value::Blob(b) => hex::encode(b).into(),
    }
}

fn row_to_json(row: NamedRow) -> serde_json::Value {
    row.into_iter()
        .map(|(k, v)| (k, value_to_json(v)))
        .collect::<serde_json::Map<_, _>>()
        .into()
}
