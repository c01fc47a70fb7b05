use std::io::Write;
use std::sync::Arc;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

use insights::{
    chat::{ChatSession, TurnOutcome},
    classify::{format_percent, ClassifyForm},
    config::Config,
    error::DynErr,
    health,
    metrics::MetricsRegistry,
    reports::{format_count, DatePreset, FilterPanel, ReportsPanel},
    schema::{ChatRole, DateRange, Source},
    ApiClient, LogNotifier,
};

#[derive(Parser)]
#[command(name = "insights", about = "Terminal client for the support insights backend")]
struct Cli {
    /// Backend base URL, including the API prefix
    #[arg(long, env = "INSIGHTS_API_URL")]
    api_url: Option<String>,

    /// Print client metrics in Prometheus text format before exiting
    #[arg(long)]
    print_metrics: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Talk to the chatbot; reads turns from stdin when no message is given
    Chat {
        message: Vec<String>,
        /// Read replies as an event stream
        #[arg(long)]
        stream: bool,
    },
    /// Classify a single message
    Classify {
        message: Vec<String>,
        /// Print the raw result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show message metrics for a filter
    Metrics {
        /// Category to include; repeat for several
        #[arg(long = "category")]
        categories: Vec<String>,
        #[arg(long, default_value = "any")]
        source: Source,
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(long)]
        end: Option<NaiveDate>,
        /// Use the last N days instead of start/end (7 or 30)
        #[arg(long, value_parser = parse_preset)]
        last: Option<DatePreset>,
    },
    /// List the categories known to the backend
    Categories,
    /// Check the backend health route
    Health,
}

fn parse_preset(value: &str) -> Result<DatePreset, String> {
    match value {
        "7" => Ok(DatePreset::Last7Days),
        "30" => Ok(DatePreset::Last30Days),
        other => Err(format!("unsupported preset: {other} (use 7 or 30)")),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), DynErr> {
    dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let mut cfg = Config::from_env();
    if let Some(url) = cli.api_url {
        cfg = cfg.with_api_url(url);
    }

    let metrics_registry = MetricsRegistry::new();
    let api = ApiClient::new(&cfg, Arc::new(LogNotifier))?;
    info!(api_url = %api.base_url(), "Using backend");

    match cli.command {
        Command::Chat { message, stream } => run_chat(&api, message.join(" "), stream).await?,
        Command::Classify { message, json } => run_classify(&api, message.join(" "), json).await,
        Command::Metrics { categories, source, start, end, last } => {
            let mut filters = FilterPanel::new();
            filters.set_categories(categories);
            filters.set_source(source);
            if let Some(preset) = last {
                filters.apply_preset(preset);
            } else {
                let current = filters.date_range();
                filters.set_date_range(DateRange::new(
                    start.unwrap_or(current.start),
                    end.unwrap_or(current.end),
                ));
            }
            run_metrics(&api, &filters).await;
        }
        Command::Categories => {
            let mut filters = FilterPanel::new();
            filters.load_categories(&api).await;
            for category in filters.available_categories() {
                println!("{category}");
            }
        }
        Command::Health => {
            let status = health::overall_health(&api).await;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
    }

    if cli.print_metrics {
        print!("{}", metrics_registry.gather_metrics());
    }

    Ok(())
}

async fn chat_turn(api: &ApiClient, session: &mut ChatSession, stream: bool) -> TurnOutcome {
    if stream {
        let outcome = session
            .send_streaming(api, |chunk| {
                print!("{chunk}");
                let _ = std::io::stdout().flush();
            })
            .await;
        println!();
        outcome
    } else {
        let outcome = session.send(api).await;
        if outcome == TurnOutcome::Answered {
            if let Some(reply) = session.transcript().last().filter(|m| m.role == ChatRole::Assistant) {
                println!("{}", reply.content);
            }
        }
        outcome
    }
}

fn print_context(session: &ChatSession, last_shown: &mut Option<String>) {
    let current = session.context().map(String::from);
    if current != *last_shown {
        if let Some(context) = &current {
            println!("[Context: {context}]");
        }
        *last_shown = current;
    }
}

async fn run_chat(api: &ApiClient, message: String, stream: bool) -> Result<(), DynErr> {
    let mut session = ChatSession::new();
    let mut shown_context = None;

    if !message.trim().is_empty() {
        session.set_input(message);
        chat_turn(api, &mut session, stream).await;
        print_context(&session, &mut shown_context);
        return Ok(());
    }

    println!("Start a conversation with the support insights chatbot. Empty line or Ctrl-D to quit.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        if line.trim().is_empty() {
            break;
        }

        session.set_input(line);
        chat_turn(api, &mut session, stream).await;
        print_context(&session, &mut shown_context);
    }

    info!(turns = session.transcript().len(), "Chat session ended");
    Ok(())
}

async fn run_classify(api: &ApiClient, message: String, json: bool) {
    let mut form = ClassifyForm::new();
    form.set_input(message);
    if !form.submit(api).await {
        eprintln!("Nothing to classify");
        return;
    }

    let Some(result) = form.result() else {
        return;
    };

    if json {
        println!("{}", result.to_pretty_json());
        return;
    }

    println!("Predicted category: {} [{}]", result.category, result.badge_color());
    if let Some(label) = result.confidence_label() {
        println!("{label}");
    }
    for entry in result.ranked_probabilities() {
        println!("  {:<16} {:>6}%", entry.category, format_percent(entry.percent));
    }
}

async fn run_metrics(api: &ApiClient, filters: &FilterPanel) {
    let mut panel = ReportsPanel::new();
    panel.run(api, &filters.filters()).await;
    let metrics = panel.metrics();

    println!("Total messages: {}", format_count(metrics.total_messages));
    println!("Unique users:   {}", format_count(metrics.unique_users));

    if !metrics.spike_alerts.is_empty() {
        println!("\nSpike alerts:");
        for alert in &metrics.spike_alerts {
            println!("  {}  {}", alert.date, alert.message);
        }
    }

    if !metrics.daily_counts.is_empty() {
        let names = metrics.category_names();
        println!("\nDaily message count:");
        for (row, (date, count)) in metrics.stacked_rows().iter().zip(metrics.daily_series()) {
            let breakdown = names
                .iter()
                .zip(&row.values)
                .filter(|(_, v)| **v > 0)
                .map(|(name, v)| format!("{name}={v}"))
                .collect::<Vec<_>>()
                .join(" ");
            println!("  {date}  {:>6}  {breakdown}", format_count(count));
        }
    }
}
