use std::collections::BTreeMap;

use anyhow::{bail, Context};
use chrono::{DateTime, NaiveDate, Utc};
use colored::Colorize;
use serde::Serialize;
use serde_json::Value;

use bbs_sdk::{
    Agent, AgentName, Board, NewAgent, NewPost, NewReply, Post, PostFilter, PostSummary, Reply,
    SearchQuery, StoreConfig, Thread,
};
use bbs_types::{timestamp, ReplyMetadata};

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli)?;
    let board = Board::open(&config)
        .with_context(|| format!("opening store at {}", config.data_root.display()))?;
    let out = Output { format: cli.format };

    match cli.command {
        Command::Init => cmd_init(&board, &out),
        Command::Agent(args) => cmd_agent(&board, &out, args.action),
        Command::Post(args) => cmd_post(&board, &out, args.action),
        Command::Reply(args) => cmd_reply(&board, &out, args.action),
        Command::Search(args) => cmd_search(&board, &out, args),
        Command::Index(args) => cmd_index(&board, &out, args.action),
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<StoreConfig> {
    let mut config = match &cli.config {
        Some(path) => StoreConfig::load(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => StoreConfig::default(),
    };
    if let Some(dir) = &cli.data_dir {
        config.data_root = dir.clone();
    }
    Ok(config)
}

struct Output {
    format: OutputFormat,
}

impl Output {
    fn json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    fn emit<T: Serialize>(&self, value: &T) -> anyhow::Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }
}

#[derive(Serialize)]
struct ReplyOut {
    #[serde(flatten)]
    metadata: ReplyMetadata,
    content: String,
}

impl From<&Reply> for ReplyOut {
    fn from(reply: &Reply) -> Self {
        Self {
            metadata: reply.metadata(),
            content: reply.content.clone(),
        }
    }
}

// ---- init ----

fn cmd_init(board: &Board, out: &Output) -> anyhow::Result<()> {
    if out.json() {
        return out.emit(&serde_json::json!({ "root": board.root() }));
    }
    println!(
        "{} Initialized BBS store in {}",
        "✓".green().bold(),
        board.root().display().to_string().bold()
    );
    Ok(())
}

// ---- agents ----

fn cmd_agent(board: &Board, out: &Output, action: AgentAction) -> anyhow::Result<()> {
    match action {
        AgentAction::Register {
            name,
            description,
            metadata,
        } => {
            let mut request = NewAgent::new(name, description);
            for (key, raw) in metadata {
                let value = serde_json::from_str(&raw).unwrap_or(Value::String(raw));
                request = request.with_metadata(key, value);
            }
            let agent = board.register_agent(request)?;
            if out.json() {
                return out.emit(&agent.profile());
            }
            println!("{} Registered agent {}", "✓".green().bold(), agent.name.to_string().yellow());
            Ok(())
        }
        AgentAction::Show { name } => {
            let agent = board.agent(&name)?;
            let stats = board.agent_stats(&name)?;
            if out.json() {
                return out.emit(&serde_json::json!({
                    "profile": agent.profile(),
                    "stats": stats,
                }));
            }
            print_agent(&agent);
            println!("  Posts:   {}", stats.post_count.to_string().bold());
            println!("  Replies: {}", stats.reply_count.to_string().bold());
            Ok(())
        }
        AgentAction::List => {
            let agents = board.list_agents()?;
            if out.json() {
                let profiles: Vec<_> = agents.iter().map(Agent::profile).collect();
                return out.emit(&profiles);
            }
            if agents.is_empty() {
                println!("No agents registered.");
            }
            for agent in &agents {
                println!("{}  {}", agent.name.to_string().yellow(), agent.description.dimmed());
            }
            Ok(())
        }
        AgentAction::Update { name, description } => {
            let agent = board.update_agent(&name, Some(description), None)?;
            if out.json() {
                return out.emit(&agent.profile());
            }
            println!("{} Updated agent {}", "✓".green().bold(), agent.name.to_string().yellow());
            Ok(())
        }
    }
}

fn print_agent(agent: &Agent) {
    println!("Agent {}", agent.name.to_string().yellow().bold());
    println!("  Description: {}", agent.description);
    println!("  Registered:  {}", timestamp::format(&agent.created_at).dimmed());
    for (key, value) in &agent.metadata {
        println!("  {key}: {value}");
    }
}

// ---- posts ----

fn cmd_post(board: &Board, out: &Output, action: PostAction) -> anyhow::Result<()> {
    match action {
        PostAction::Create {
            agent,
            title,
            content,
            tags,
        } => {
            let post = board.create_post(NewPost::new(agent, title, content).with_tags(tags))?;
            if out.json() {
                return out.emit(&PostSummary::from(&post));
            }
            println!("{} Created post {}", "✓".green().bold(), post.id.to_string().yellow());
            Ok(())
        }
        PostAction::Show {
            id,
            include_deleted,
        } => {
            let post = board.post(&id, include_deleted)?;
            let thread = Thread::from(&post);
            if out.json() {
                return out.emit(&thread);
            }
            print_thread(&thread);
            Ok(())
        }
        PostAction::List {
            agent,
            include_deleted,
            limit,
            offset,
        } => {
            let filter = PostFilter {
                agent_name: agent.map(AgentName::new).transpose()?,
                include_deleted,
                limit,
                offset,
            };
            let posts = board.browse(&filter)?;
            print_posts(out, &posts)
        }
        PostAction::Delete { id } => {
            let post = board.delete_post(&id)?;
            if out.json() {
                return out.emit(&PostSummary::from(&post));
            }
            println!("{} Deleted post {}", "✓".green().bold(), post.id.to_string().yellow());
            Ok(())
        }
    }
}

fn print_posts(out: &Output, posts: &[Post]) -> anyhow::Result<()> {
    let summaries: Vec<PostSummary> = posts.iter().map(PostSummary::from).collect();
    if out.json() {
        return out.emit(&summaries);
    }
    if summaries.is_empty() {
        println!("No posts.");
    }
    for s in &summaries {
        let marker = if s.deleted { " (deleted)".red().to_string() } else { String::new() };
        println!(
            "{}  {}  by {}  [{}]  {} replies{}",
            s.post_id.yellow(),
            s.title.bold(),
            s.agent_name.cyan(),
            s.tags.join(", "),
            s.reply_count,
            marker
        );
    }
    Ok(())
}

fn print_thread(thread: &Thread) {
    let meta = &thread.metadata;
    println!("{}  {}", meta.post_id.to_string().yellow(), meta.title.bold());
    println!(
        "  by {} at {}",
        meta.agent_name.to_string().cyan(),
        timestamp::format(&meta.created_at).dimmed()
    );
    if !meta.tags.is_empty() {
        println!("  tags: {}", meta.tags.values().join(", "));
    }
    if meta.deleted {
        println!("  {}", "deleted".red());
    }
    println!();
    println!("{}", thread.content);
    for reply in &thread.replies {
        let indent = "  ".repeat(reply.depth);
        let deleted = if reply.metadata.deleted { " (deleted)" } else { "" };
        println!();
        println!(
            "{indent}{} {}{}",
            reply.metadata.agent_name.to_string().cyan(),
            reply.metadata.reply_id.to_string().dimmed(),
            deleted.red()
        );
        for line in reply.content.lines() {
            println!("{indent}  {line}");
        }
    }
}

// ---- replies ----

fn cmd_reply(board: &Board, out: &Output, action: ReplyAction) -> anyhow::Result<()> {
    match action {
        ReplyAction::Add {
            post_id,
            agent,
            content,
            parent,
        } => {
            let mut request = NewReply::new(agent, content);
            if let Some(parent) = parent {
                request = request.under(parent);
            }
            let reply = board.add_reply(&post_id, request)?;
            if out.json() {
                return out.emit(&ReplyOut::from(&reply));
            }
            println!("{} Added reply {}", "✓".green().bold(), reply.id.to_string().yellow());
            Ok(())
        }
        ReplyAction::Delete { post_id, reply_id } => {
            let reply = board.delete_reply(&post_id, &reply_id)?;
            if out.json() {
                return out.emit(&ReplyOut::from(&reply));
            }
            println!("{} Deleted reply {}", "✓".green().bold(), reply.id.to_string().yellow());
            Ok(())
        }
    }
}

// ---- search ----

fn cmd_search(board: &Board, out: &Output, args: SearchArgs) -> anyhow::Result<()> {
    let query = SearchQuery {
        query: args.query,
        tags: args.tags,
        agent_name: args.agent.map(AgentName::new).transpose()?,
        start: args.since.as_deref().map(parse_bound).transpose()?,
        end: args.until.as_deref().map(parse_bound).transpose()?,
        include_deleted: args.include_deleted,
        limit: args.limit,
        offset: args.offset,
    };
    let posts = board.search(&query)?;
    print_posts(out, &posts)
}

fn parse_bound(raw: &str) -> anyhow::Result<DateTime<Utc>> {
    if let Ok(ts) = timestamp::parse(raw) {
        return Ok(ts);
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .with_context(|| format!("invalid date or timestamp {raw:?}"))?;
    match date.and_hms_opt(0, 0, 0) {
        Some(midnight) => Ok(midnight.and_utc()),
        None => bail!("invalid date {raw:?}"),
    }
}

// ---- index ----

fn cmd_index(board: &Board, out: &Output, action: IndexAction) -> anyhow::Result<()> {
    match action {
        IndexAction::Rebuild => {
            let report = board.rebuild_indexes()?;
            if out.json() {
                return out.emit(&report);
            }
            println!("{} Indexes rebuilt", "✓".green().bold());
            println!("  Posts:  {}", report.posts.to_string().bold());
            println!("  Agents: {}", report.agents.to_string().bold());
            Ok(())
        }
        IndexAction::Verify => {
            let drift = board.drift()?;
            if out.json() {
                out.emit(&drift)?;
            } else if drift.is_clean() {
                println!("{} Indexes match the store", "✓".green().bold());
            } else {
                let sections = BTreeMap::from([("agents", &drift.agents), ("posts", &drift.posts)]);
                for (name, keys) in sections {
                    for (label, ids) in [
                        ("missing", &keys.missing),
                        ("orphaned", &keys.orphaned),
                        ("stale", &keys.stale),
                    ] {
                        for id in ids {
                            println!("{} {name} {label}: {id}", "✗".red());
                        }
                    }
                }
            }
            if !drift.is_clean() {
                bail!("index drift detected; run `bbs index rebuild`");
            }
            Ok(())
        }
    }
}
