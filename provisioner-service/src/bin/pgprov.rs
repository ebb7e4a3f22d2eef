//! Command-line tool that idempotently creates, drops and checks PostgreSQL objects.

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};

use common::config::{load_dotenv, AppConfig, DatabaseRole, ServerParams, DEFAULT_PARAMS_FILE};
use common::models::{ColumnDef, ResourceRef};
use provisioner_service::introspect::Inspector;
use provisioner_service::{PgConnector, Provisioner};

#[derive(Parser)]
#[command(name = "pgprov", version, about = "Idempotent PostgreSQL database/schema/table provisioning")]
struct Cli {
    /// Path to the server params file
    #[arg(global = true, short = 'C', long, env = "PG_PARAMS_FILE", default_value = DEFAULT_PARAMS_FILE)]
    config: PathBuf,

    /// Password, overrides the `pw` key of the params file
    #[arg(global = true, long, env = "PG_PASSWORD", hide_env_values = true)]
    pw: Option<String>,

    /// Params key naming the database to connect to (`db` or `dev_db`)
    #[arg(global = true, long, default_value = "db")]
    role: DatabaseRole,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the object unless it already exists
    Create {
        #[command(flatten)]
        target: Target,
        /// Column for a new table, as `name:type[:null|notnull]`; repeatable
        #[arg(long = "column")]
        columns: Vec<ColumnDef>,
    },
    /// Drop the object if it exists (tables are dropped with CASCADE)
    Drop {
        #[command(flatten)]
        target: Target,
    },
    /// Print whether the object exists
    Exists {
        #[command(flatten)]
        target: Target,
    },
    /// List catalog contents
    List {
        what: Listing,
    },
}

#[derive(clap::Args)]
struct Target {
    kind: Kind,
    name: String,
    /// Schema owning the table
    #[arg(long)]
    schema: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum Kind {
    Database,
    Schema,
    Table,
}

#[derive(Clone, Copy, ValueEnum)]
enum Listing {
    Databases,
    Schemas,
    Tables,
    Users,
}

impl Target {
    fn resource(&self) -> anyhow::Result<ResourceRef> {
        let resource = match self.kind {
            Kind::Database => ResourceRef::database(&self.name),
            Kind::Schema => ResourceRef::schema(&self.name),
            Kind::Table => match &self.schema {
                Some(schema) => ResourceRef::table(schema, &self.name),
                None => bail!("a table needs --schema"),
            },
        };
        if self.schema.is_some() && !matches!(self.kind, Kind::Table) {
            bail!("--schema only applies to tables");
        }
        Ok(resource)
    }
}

fn init_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut params = ServerParams::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    if let Some(pw) = cli.pw {
        params = params.with_password(pw);
    }
    let config = AppConfig::from_params(params);
    let connector = PgConnector::new(&config, cli.role)?;

    match cli.command {
        Command::Create { target, columns } => {
            let resource = target.resource()?;
            let outcome = Provisioner::new(connector)
                .ensure_exists_with(&resource, &columns)
                .await?;
            println!("{}: {}", resource, outcome);
        }
        Command::Drop { target } => {
            let resource = target.resource()?;
            let outcome = Provisioner::new(connector).ensure_absent(&resource).await?;
            println!("{}: {}", resource, outcome);
        }
        Command::Exists { target } => {
            let resource = target.resource()?;
            let exists = Provisioner::new(connector).exists(&resource).await?;
            println!("{}", exists);
        }
        Command::List { what } => {
            let inspector = Inspector::new(&connector);
            match what {
                Listing::Databases => {
                    for db in inspector.list_databases().await? {
                        let tables = db
                            .tables_count
                            .map(|n| n.to_string())
                            .unwrap_or_else(|| "-".to_string());
                        let size = db
                            .size_mb
                            .map(|mb| format!("{:.2} MB", mb))
                            .unwrap_or_else(|| "-".to_string());
                        println!("{}\t{}\t{}", db.name, tables, size);
                    }
                }
                Listing::Schemas => {
                    for schema in inspector.list_schemas().await? {
                        println!("{}\t{}", schema.name, schema.owner);
                    }
                }
                Listing::Tables => {
                    for table in inspector.list_tables().await? {
                        println!("{}.{}", table.schema, table.name);
                    }
                }
                Listing::Users => {
                    for user in inspector.list_users().await? {
                        println!(
                            "{}\tsuperuser={}\tcreatedb={}",
                            user.name, user.superuser, user.create_db
                        );
                    }
                }
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();
    init_logging();
    run(Cli::parse()).await
}
