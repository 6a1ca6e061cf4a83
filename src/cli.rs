use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "gitsnap",
    version,
    about = "Collect Git hosting data into quarterly snapshots"
)]
pub struct Cli {
    /// Suppress the progress spinner
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the configured repositories
    Repos,

    /// Collect repositories and write one snapshot each
    Collect {
        /// Repositories as owner/repo
        repos: Vec<String>,

        /// Collect every configured repository
        #[arg(long, conflicts_with = "repos")]
        all: bool,

        /// Quarter partition (defaults to the first configured quarter)
        #[arg(long)]
        quarter: Option<String>,
    },

    /// List snapshots of a repository, newest first
    List {
        repo: String,

        #[arg(long)]
        quarter: Option<String>,
    },

    /// Print the snapshot summary of a repository as JSON
    Summary {
        repo: String,

        #[arg(long)]
        quarter: Option<String>,
    },

    /// Show commit and pull request figures of one snapshot
    Show {
        snapshot_id: String,

        #[arg(long)]
        quarter: Option<String>,

        /// First day included (YYYY-MM-DD)
        #[arg(long)]
        from: Option<String>,

        /// Last day included (YYYY-MM-DD)
        #[arg(long)]
        to: Option<String>,
    },

    /// Delete a snapshot
    Delete {
        snapshot_id: String,

        #[arg(long)]
        quarter: Option<String>,
    },
}
