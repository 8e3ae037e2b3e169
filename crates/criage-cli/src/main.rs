//! criage CLI

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use criage_cli::cmd::{self, Session};
use criage_cli::{Cli, Commands, ConfigCommands, RepoCommands};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let session = Session::new(cli.quiet);

    match cli.command {
        Commands::Install {
            package,
            global,
            version,
            force,
            dev,
            arch,
            os,
        } => {
            let opts = cmd::install::InstallArgs {
                global,
                version,
                force,
                dev,
                arch,
                os,
            };
            cmd::install::install(&session, &package, opts).await
        }
        Commands::Uninstall {
            package,
            global,
            purge,
        } => cmd::remove::uninstall(&session, &package, global, purge).await,
        Commands::Update { package, global } => {
            cmd::update::update(&session, package.as_deref(), global).await
        }
        Commands::Search { query } => cmd::search::search(&session, &query).await,
        Commands::List { global, outdated } => cmd::list::list(&session, global, outdated).await,
        Commands::Info { package, global } => cmd::info::info(&session, &package, global),
        Commands::Create {
            name,
            author,
            description,
        } => cmd::package::create(&session, &name, &author, &description),
        Commands::Build {
            output,
            format,
            level,
        } => cmd::package::build(&session, output, format, level).await,
        Commands::Publish { registry, token } => {
            cmd::package::publish(&session, registry, token).await
        }
        Commands::Metadata { archive } => cmd::package::metadata(&session, &archive).await,
        Commands::Config { command } => match command {
            ConfigCommands::Get { key } => cmd::config::get(&key),
            ConfigCommands::Set { key, value } => cmd::config::set(&key, &value),
            ConfigCommands::List => cmd::config::list(),
        },
        Commands::Repo { command } => match command {
            RepoCommands::Info { repository } => {
                cmd::repo::info(&session, repository.as_deref()).await
            }
            RepoCommands::Stats { repository } => {
                cmd::repo::stats(&session, repository.as_deref()).await
            }
            RepoCommands::Refresh { repository, token } => {
                cmd::repo::refresh(&session, repository.as_deref(), token.as_deref()).await
            }
            RepoCommands::Packages {
                repository,
                page,
                limit,
            } => cmd::repo::packages(&session, repository.as_deref(), page, limit).await,
        },
    }
}
