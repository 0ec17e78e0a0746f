//! Run the verified-article flow from the command line.
//!
//! Run with: cargo run --bin reflect-flow -- run --topic "Rust async"

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use reflect_flow::{
    article::{self, ArticleState},
    config::Config,
    metrics,
    sinks::{FileSink, StdoutSink},
    workflow::{Flow, Outcome},
};

#[derive(Parser)]
#[command(author, version, about = "Research, write and verify an article", long_about = None)]
struct Cli {
    /// Log level (debug, info, warn, error); RUST_LOG takes precedence
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the flow once
    Run {
        /// Topic to write about
        #[arg(short, long)]
        topic: Option<String>,

        /// Editor rejections tolerated before giving up
        #[arg(short, long)]
        max_retries: Option<u32>,

        /// Where to write the accepted article
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// LLM provider (mock, openai, anthropic)
        #[arg(short, long)]
        provider: Option<String>,

        /// Print Prometheus metrics after the run
        #[arg(long)]
        metrics: bool,
    },

    /// Print the flow wiring as a Mermaid chart
    Plot,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = Config::load()?;

    match cli.command {
        Commands::Run {
            topic,
            max_retries,
            output,
            provider,
            metrics: print_metrics,
        } => {
            if let Some(topic) = topic {
                config.flow.topic = topic;
            }
            if let Some(max_retries) = max_retries {
                config.flow.max_retries = max_retries;
            }
            if let Some(output) = output {
                config.output.article_path = output;
            }
            if let Some(provider) = provider {
                config.llm.provider = provider.to_lowercase();
            }
            config.validate()?;
            info!(
                topic = %config.flow.topic,
                max_retries = config.flow.max_retries,
                provider = %config.llm.provider,
                "Loaded configuration"
            );

            run(&config).await?;

            if print_metrics {
                println!("{}", metrics::gather_metrics()?);
            }
        }
        Commands::Plot => {
            let definition = article::build_flow(
                &config.flow,
                Arc::new(FileSink::new(&config.output.article_path)),
                Arc::new(StdoutSink::new("report")),
            )?;
            println!("{}", definition.plot());
        }
    }

    Ok(())
}

async fn run(config: &Config) -> Result<()> {
    let definition = Arc::new(article::build_flow(
        &config.flow,
        Arc::new(FileSink::new(&config.output.article_path)),
        Arc::new(StdoutSink::new("report").with_header("verification failed")),
    )?);
    let collaborators = article::crews::build_collaborators(&config.llm)?;
    let context = article::run_context(&config.flow.topic, collaborators);

    let mut flow = Flow::<ArticleState>::new(definition, context);
    let report = flow.kickoff().await?;

    println!("status: {}", report.status);
    println!("events: {}", report.events.join(" -> "));
    println!("retries: {}", report.state.retry_count);
    if report.reached(article::ArticleRoute::Completed.event()) {
        println!(
            "article written to {}:\n\n{}",
            config.output.article_path.display(),
            report.state.article
        );
    }
    Ok(())
}
