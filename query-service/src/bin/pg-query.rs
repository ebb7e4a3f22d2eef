//! Command-line tool that runs a SELECT and prints the result as a table.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use common::config::{load_dotenv, AppConfig, DatabaseRole, ServerParams, DEFAULT_PARAMS_FILE};
use common::models::QueryRequest;
use query_service::{render_table, QueryService, SqlSource};

#[derive(Parser)]
#[command(
    name = "pg-query",
    version,
    about = "Query postgres and print the result. Wrap a sql statement in double quotes."
)]
struct Cli {
    /// Password for postgres
    #[arg(long)]
    pw: String,

    /// Select statement, or path to a .sql file containing one
    #[arg(long)]
    sql: String,

    /// Path to the server params file
    #[arg(short = 'C', long, env = "PG_PARAMS_FILE", default_value = DEFAULT_PARAMS_FILE)]
    config: PathBuf,

    /// Params key naming the database to query
    #[arg(long, default_value = "dev_db")]
    role: DatabaseRole,

    /// Print at most this many rows
    #[arg(long)]
    limit: Option<u32>,
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let params = ServerParams::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?
        .with_password(cli.pw);
    let sql = SqlSource::parse(&cli.sql).load()?;

    let service = QueryService::new(AppConfig::from_params(params));
    let request = QueryRequest {
        sql,
        role: Some(cli.role.to_string()),
        limit: cli.limit,
    };
    let result = service.execute(&request).await?;
    println!("{}", render_table(&result));
    if result.truncated {
        eprintln!("(showing first {} rows)", result.row_count);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    load_dotenv();
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    run(Cli::parse()).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pw_and_sql_required() {
        assert!(Cli::try_parse_from(["pg-query", "--sql", "SELECT 1"]).is_err());
        assert!(Cli::try_parse_from(["pg-query", "--pw", "secret"]).is_err());
    }

    #[test]
    fn test_defaults_to_dev_db() {
        let cli = Cli::try_parse_from(["pg-query", "--pw", "secret", "--sql", "report.sql"]).unwrap();
        assert_eq!(cli.role, DatabaseRole::Dev);
        assert!(cli.limit.is_none());
        assert_eq!(SqlSource::parse(&cli.sql), SqlSource::File(PathBuf::from("report.sql")));
    }
}
