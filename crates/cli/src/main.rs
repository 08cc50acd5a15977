use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use readshelf_kernel::settings::Settings;

#[derive(Parser, Debug)]
#[command(name = "readshelf", about = "Book recommendation API server")]
struct Cli {
    /// Directory holding base.toml and the per-environment overlays
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    /// Environment name (local, staging, production)
    #[arg(long, global = true)]
    env: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server until Ctrl-C
    Serve {
        /// Override server.host
        #[arg(long)]
        host: Option<String>,

        /// Override server.port
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Print the effective configuration as JSON, secrets omitted
    Config,
    /// Print the merged OpenAPI document
    Openapi,
}

fn load_settings(cli: &Cli) -> anyhow::Result<Settings> {
    let settings = match (&cli.config_dir, &cli.env) {
        (None, None) => Settings::load(),
        (dir, env) => {
            let dir = match dir {
                Some(dir) => dir.clone(),
                None => std::env::current_dir()
                    .context("unable to resolve current directory")?
                    .join("config"),
            };
            let env = env
                .clone()
                .or_else(|| std::env::var("READSHELF_ENV").ok())
                .unwrap_or_else(|| "local".to_string());
            Settings::load_from(&dir, &env)
        }
    };
    settings.context("failed to load readshelf settings")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut settings = load_settings(&cli)?;

    match cli.command {
        Command::Serve { host, port } => {
            if let Some(host) = host {
                settings.server.host = host;
            }
            if let Some(port) = port {
                settings.server.port = port;
            }
            readshelf_telemetry::init(&settings.telemetry)?;
            tracing::info!(env = ?settings.environment, port = settings.server.port, "starting readshelf");
            readshelf_app::run(settings).await
        }
        Command::Config => {
            println!("{}", serde_json::to_string_pretty(&settings)?);
            Ok(())
        }
        Command::Openapi => {
            let services = readshelf_app::Services::from_settings(&settings).await?;
            let registry = readshelf_app::build_registry(&services)?;
            let document = readshelf_http::router::merged_openapi(&registry);
            println!("{}", serde_json::to_string_pretty(&document)?);
            Ok(())
        }
    }
}
