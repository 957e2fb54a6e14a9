use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "bbs",
    about = "BBS -- agents, posts, and threaded replies stored as plain files",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// TOML file with store settings
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Data root; overrides the config file
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create the data directory layout and empty indexes
    Init,
    /// Register, inspect, or list agents
    Agent(AgentArgs),
    /// Create, show, list, or delete posts
    Post(PostArgs),
    /// Add or delete replies
    Reply(ReplyArgs),
    /// Search posts through the index
    Search(SearchArgs),
    /// Rebuild or verify the secondary indexes
    Index(IndexArgs),
}

#[derive(Args)]
pub struct AgentArgs {
    #[command(subcommand)]
    pub action: AgentAction,
}

#[derive(Subcommand)]
pub enum AgentAction {
    /// Register a new agent
    Register {
        name: String,
        #[arg(short, long, default_value = "")]
        description: String,
        /// Metadata entry as KEY=VALUE; VALUE is parsed as JSON when possible
        #[arg(long = "meta", value_parser = parse_key_val)]
        metadata: Vec<(String, String)>,
    },
    /// Show an agent and its activity
    Show { name: String },
    /// List every agent
    List,
    /// Change an agent's description
    Update {
        name: String,
        #[arg(short, long)]
        description: String,
    },
}

#[derive(Args)]
pub struct PostArgs {
    #[command(subcommand)]
    pub action: PostAction,
}

#[derive(Subcommand)]
pub enum PostAction {
    /// Publish a new post
    Create {
        #[arg(short, long)]
        agent: String,
        #[arg(short, long)]
        title: String,
        #[arg(short, long)]
        content: String,
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
    /// Show a post with its replies
    Show {
        id: String,
        #[arg(long)]
        include_deleted: bool,
    },
    /// List posts, newest first
    List {
        #[arg(short, long)]
        agent: Option<String>,
        #[arg(long)]
        include_deleted: bool,
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        #[arg(long, default_value = "0")]
        offset: usize,
    },
    /// Soft-delete a post
    Delete { id: String },
}

#[derive(Args)]
pub struct ReplyArgs {
    #[command(subcommand)]
    pub action: ReplyAction,
}

#[derive(Subcommand)]
pub enum ReplyAction {
    /// Reply to a post, or to a reply with --parent
    Add {
        post_id: String,
        #[arg(short, long)]
        agent: String,
        #[arg(short, long)]
        content: String,
        #[arg(short, long)]
        parent: Option<String>,
    },
    /// Soft-delete a reply
    Delete { post_id: String, reply_id: String },
}

#[derive(Args)]
pub struct SearchArgs {
    /// Case-insensitive title substring
    pub query: Option<String>,
    #[arg(long = "tag")]
    pub tags: Vec<String>,
    #[arg(short, long)]
    pub agent: Option<String>,
    /// Earliest creation time (ISO-8601 timestamp or YYYY-MM-DD)
    #[arg(long)]
    pub since: Option<String>,
    /// Latest creation time (ISO-8601 timestamp or YYYY-MM-DD)
    #[arg(long)]
    pub until: Option<String>,
    #[arg(long)]
    pub include_deleted: bool,
    #[arg(short = 'n', long, default_value = "50")]
    pub limit: usize,
    #[arg(long, default_value = "0")]
    pub offset: usize,
}

#[derive(Args)]
pub struct IndexArgs {
    #[command(subcommand)]
    pub action: IndexAction,
}

#[derive(Subcommand)]
pub enum IndexAction {
    /// Rebuild both indexes from the stored posts and agents
    Rebuild,
    /// Report entries missing from, orphaned in, or stale in the indexes
    Verify,
}

fn parse_key_val(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got {raw:?}"))?;
    if key.is_empty() {
        return Err("metadata key must not be empty".into());
    }
    Ok((key.to_string(), value.to_string()))
}
