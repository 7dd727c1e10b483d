use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use plugrack_core::{default_user_layout, DataLayout};

mod dispatch;
mod render;

#[cfg(test)]
mod tests;

#[derive(Parser, Debug)]
#[command(name = "plugrack")]
#[command(about = "Profile-based plugin manager", long_about = None)]
struct Cli {
    /// Data directory holding the lock manifest, clones and transaction log.
    #[arg(long)]
    data_dir: Option<PathBuf>,
    /// Root of the flat install tree.
    #[arg(long)]
    install_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List tracked repositories and profiles.
    List,
    /// Track a repository in the lock manifest.
    Add {
        repo: String,
        /// Treat a bare name as a local-only source.
        #[arg(long)]
        local: bool,
    },
    /// Stop tracking a repository.
    Rm { repo: String },
    /// Manage profiles.
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },
    /// Roll the lock manifest forward to the latest schema version.
    Migrate,
    /// Show what the next build would rebuild and why.
    Plan,
    /// Show the state of the data directory.
    Status,
}

#[derive(Subcommand, Debug)]
enum ProfileAction {
    /// List profiles, marking the current one.
    List,
    /// Print the current profile name.
    Get,
    /// Switch the current profile.
    Set { name: String },
    /// Create an empty profile.
    New { name: String },
    /// Remove a profile (not the current one).
    Rm { name: String },
    /// Add a tracked repository to a profile.
    AddRepo { name: String, repo: String },
    /// Remove a repository from a profile.
    RmRepo { name: String, repo: String },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let layout = resolve_layout(&cli)?;

    match cli.command {
        Commands::List => dispatch::cmd_list(&layout),
        Commands::Add { repo, local } => dispatch::cmd_add(&layout, &repo, local),
        Commands::Rm { repo } => dispatch::cmd_rm(&layout, &repo),
        Commands::Profile { action } => match action {
            ProfileAction::List => dispatch::cmd_profile_list(&layout),
            ProfileAction::Get => dispatch::cmd_profile_get(&layout),
            ProfileAction::Set { name } => dispatch::cmd_profile_set(&layout, &name),
            ProfileAction::New { name } => dispatch::cmd_profile_new(&layout, &name),
            ProfileAction::Rm { name } => dispatch::cmd_profile_rm(&layout, &name),
            ProfileAction::AddRepo { name, repo } => {
                dispatch::cmd_profile_add_repo(&layout, &name, &repo)
            }
            ProfileAction::RmRepo { name, repo } => {
                dispatch::cmd_profile_rm_repo(&layout, &name, &repo)
            }
        },
        Commands::Migrate => dispatch::cmd_migrate(&layout),
        Commands::Plan => dispatch::cmd_plan(&layout),
        Commands::Status => dispatch::cmd_status(&layout),
    }
}

fn resolve_layout(cli: &Cli) -> Result<DataLayout> {
    match (&cli.data_dir, &cli.install_dir) {
        (Some(data), Some(install)) => Ok(DataLayout::new(data, install)),
        (Some(data), None) => Ok(DataLayout::new(data, data.join("install"))),
        (None, Some(install)) => {
            let default = default_user_layout()?;
            Ok(DataLayout::new(default.data_root(), install))
        }
        (None, None) => default_user_layout(),
    }
}
