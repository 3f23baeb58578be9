use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser, Debug)]
#[command(name = "tessera", version, about = "Role-restricted natural language SQL gateway")]
struct Cli {
    /// Configuration file
    #[arg(long, short, global = true, env = "TESSERA_CONFIG", default_value = "tessera.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP server.
    Serve {
        /// Override `server.bind`
        #[arg(long)]
        bind: Option<String>,
    },

    /// Validate the configuration and catalog without serving.
    Check,

    /// Print the effective policy of a user on a data source.
    Policy {
        #[arg(long)]
        datasource: i64,
        #[arg(long)]
        user: String,
    },

    /// Print the virtual schema DDL a user's prompts would contain.
    Schema {
        #[arg(long)]
        datasource: i64,
        #[arg(long)]
        user: String,
    },

    /// Rewrite a statement against a user's virtual schema.
    Rewrite {
        #[arg(long)]
        datasource: i64,
        #[arg(long)]
        user: String,
        #[arg(long)]
        sql: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.cmd {
        Command::Serve { bind } => commands::serve::run(&cli.config, bind).await?,
        Command::Check => {
            tessera_server::init_tracing("warn");
            if !commands::check::run(&cli.config)? {
                std::process::exit(1);
            }
        }
        Command::Policy { datasource, user } => {
            tessera_server::init_tracing("warn");
            commands::policy::run(&cli.config, datasource, &user).await?
        }
        Command::Schema { datasource, user } => {
            tessera_server::init_tracing("warn");
            commands::schema::run(&cli.config, datasource, &user).await?
        }
        Command::Rewrite {
            datasource,
            user,
            sql,
        } => {
            tessera_server::init_tracing("warn");
            commands::rewrite::run(&cli.config, datasource, &user, &sql).await?
        }
    }

    Ok(())
}
