//! swarmwatch CLI — operator interface to the agent telemetry watcher.

use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use swarmwatch::config::{Config, Tuning};
use swarmwatch::ingest::EventBuffer;
use swarmwatch::model::{Event, FilterCriteria, TimeWindow};
use swarmwatch::poll::PollClient;
use swarmwatch::stream::{StreamClient, StreamConfig};
use swarmwatch::telemetry::init_logging;
use swarmwatch::watch::Watcher;
use swarmwatch::{export, filter, stats};

#[derive(Parser)]
#[command(name = "swarmwatch", about = "Watch and analyze agent telemetry streams")]
struct Cli {
    /// TOML tuning file overriding scheduler/stream defaults
    #[arg(long, global = true)]
    tuning: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the live watcher
    Watch {
        /// Stream endpoint (overrides SWARMWATCH_STREAM_URL)
        #[arg(long)]
        url: Option<String>,
        /// Collaborator API base (overrides SWARMWATCH_API_URL)
        #[arg(long)]
        api: Option<String>,
    },
    /// Fetch recent history and print per-agent statistics
    Stats {
        /// Relative time window ("15m", "1h", "24h", "7d", "all")
        #[arg(long, default_value = "all")]
        window: String,
        /// Maximum events to fetch
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Fetch recent history, filter it, and export
    Export {
        #[arg(long, value_enum, default_value = "csv")]
        format: ExportFormat,
        /// Relative time window ("15m", "1h", "24h", "7d", "all")
        #[arg(long, default_value = "all")]
        window: String,
        /// Exact-match derived project
        #[arg(long)]
        project: Option<String>,
        /// Exact-match emitting app
        #[arg(long)]
        app: Option<String>,
        /// Exact-match session id
        #[arg(long)]
        session: Option<String>,
        /// Event types to keep (repeatable)
        #[arg(long = "event-type")]
        event_types: Vec<String>,
        /// Derived agents to keep (repeatable)
        #[arg(long = "agent")]
        agents: Vec<String>,
        /// Free-text search over summary, session id, and payload
        #[arg(long)]
        search: Option<String>,
        /// Treat the search string as a regex
        #[arg(long)]
        regex: bool,
        /// Maximum events to fetch
        #[arg(long)]
        limit: Option<usize>,
        /// Write here instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ExportFormat {
    Csv,
    Json,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = Config::from_env();
    let tuning = match cli.tuning {
        Some(ref path) => Tuning::load(path)?,
        None => Tuning::default(),
    };

    match cli.command {
        Command::Watch { url, api } => cmd_watch(config, tuning, url, api).await,
        Command::Stats { window, limit } => cmd_stats(config, tuning, window, limit).await,
        Command::Export {
            format,
            window,
            project,
            app,
            session,
            event_types,
            agents,
            search,
            regex,
            limit,
            out,
        } => {
            let mut criteria = FilterCriteria::new()
                .window(window.parse::<TimeWindow>()?)
                .regex(regex);
            criteria.project = project;
            criteria.app = app;
            criteria.session_id = session;
            criteria.search = search;
            criteria.event_types = event_types.into_iter().collect();
            criteria.agents = agents.into_iter().collect();
            cmd_export(config, tuning, format, criteria, limit, out).await
        }
    }
}

async fn cmd_watch(
    config: Config,
    tuning: Tuning,
    url: Option<String>,
    api: Option<String>,
) -> anyhow::Result<()> {
    init_logging(&config.log_level)?;

    let mut stream_config = StreamConfig::new(url.unwrap_or(config.stream_url));
    stream_config.reconnect_delay = tuning.reconnect_delay();

    let stream = StreamClient::spawn(stream_config);
    let poll = PollClient::new(api.unwrap_or(config.api_url));
    let mut watcher = Watcher::new(stream, poll, &tuning);

    let shutdown = watcher.shutdown_handle();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        shutdown.notify_one();
    });

    watcher.run().await?;
    Ok(())
}

/// Fetch history through the same intake path the watcher uses, so
/// validation and dedup apply.
async fn fetch_history(config: &Config, tuning: &Tuning, limit: Option<usize>) -> Vec<Event> {
    let poll = PollClient::new(config.api_url.clone());
    let limit = limit.unwrap_or(tuning.backfill_limit);

    let mut buffer = EventBuffer::new(tuning.buffer_capacity);
    match poll.recent_events(limit).await {
        Ok(mut events) => {
            events.reverse();
            for wire in events {
                buffer.ingest(wire);
            }
        }
        Err(e) => eprintln!("warning: could not fetch history: {e}"),
    }
    buffer.iter().cloned().collect()
}

async fn cmd_stats(
    config: Config,
    tuning: Tuning,
    window: String,
    limit: Option<usize>,
) -> anyhow::Result<()> {
    let window: TimeWindow = window.parse()?;
    let events = fetch_history(&config, &tuning, limit).await;

    let now = chrono::Utc::now();
    let filtered = filter::apply(&events, &FilterCriteria::new().window(window), now);
    let summary = stats::aggregate(&filtered, now);

    if summary.agents.is_empty() {
        println!("No events in window.");
        return Ok(());
    }

    print_agent_table(&summary.agents);

    let counts: Vec<String> = summary
        .activity
        .iter()
        .map(|b| b.count.to_string())
        .collect();
    println!("\nActivity (last {} min): {}", summary.activity.len(), counts.join(" "));

    Ok(())
}

fn print_agent_table(agents: &BTreeMap<String, stats::AgentStats>) {
    println!(
        "{:<16}  {:<6}  {:<6}  {:<7}  {:<8}  TOP TOOL",
        "AGENT", "TASKS", "OK", "RATE", "AVG_MS"
    );
    println!("{}", "-".repeat(72));

    for (agent, s) in agents {
        let avg_ms = if s.execution_times_ms.is_empty() {
            0
        } else {
            s.execution_times_ms.iter().sum::<i64>() / s.execution_times_ms.len() as i64
        };
        let top_tool = s
            .tool_usage
            .iter()
            .max_by_key(|(_, n)| **n)
            .map(|(tool, n)| format!("{tool} ({n})"))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<16}  {:<6}  {:<6}  {:<7}  {:<8}  {}",
            agent,
            s.total_tasks,
            s.successful_tasks,
            format!("{:.1}%", s.success_rate),
            avg_ms,
            top_tool
        );
    }

    println!("\n{} agent(s)", agents.len());
}

async fn cmd_export(
    config: Config,
    tuning: Tuning,
    format: ExportFormat,
    criteria: FilterCriteria,
    limit: Option<usize>,
    out: Option<PathBuf>,
) -> anyhow::Result<()> {
    let events = fetch_history(&config, &tuning, limit).await;
    let filtered = filter::apply(&events, &criteria, chrono::Utc::now());

    let rendered = match format {
        ExportFormat::Csv => export::to_csv(&filtered)?,
        ExportFormat::Json => export::to_json(&filtered)?,
    };

    match out {
        Some(path) => {
            std::fs::write(&path, rendered)?;
            eprintln!("wrote {} event(s) to {}", filtered.len(), path.display());
        }
        None => print!("{rendered}"),
    }

    Ok(())
}
