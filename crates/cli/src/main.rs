//! ERP assistant terminal front-end.
//!
//! Usage:
//!   erpmind
//!   erpmind --config erpmind.toml
//!   erpmind --department accounts --seed 7
//!
//! # Environment Variables
//!
//! - `TOGETHER_API_KEY` / `OPENAI_API_KEY` - model and embedding credentials
//! - `RUST_LOG` - log filter (default: `info,erpmind=debug`)

mod config;

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Context as _;
use erpmind_agents::DepartmentAgent;
use erpmind_common::{Department, Oracle};
use erpmind_llm::{LlmOracle, build_llm_client};
use erpmind_memory::{ContextStore, build_embedder};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::AppConfig;

const HELP: &str = "\
Commands:
  :dept <name>   switch department (sales, inventory, accounts, hr, management)
  :save          save the current department's context
  :clear         forget the current department's context
  :stats         show context size
  :ops           list the current department's operations
  :quit          save every context and exit
Anything else is sent to the current department's agent.";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,erpmind=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args: Vec<String> = std::env::args().collect();
    let mut config_path: Option<String> = None;
    let mut department = Department::Sales;
    let mut seed: Option<u64> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                config_path = args.get(i + 1).cloned();
                i += 1;
            }
            "--department" | "-d" => {
                let name = args.get(i + 1).context("--department needs a value")?;
                department = name.parse()?;
                i += 1;
            }
            "--seed" => {
                let value = args.get(i + 1).context("--seed needs a value")?;
                seed = Some(value.parse().context("Invalid seed")?);
                i += 1;
            }
            "--help" | "-h" => {
                println!("ERP assistant");
                println!();
                println!("Usage: erpmind [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --config <FILE>        Path to a TOML config file");
                println!("  -d, --department <NAME>    Starting department (default: sales)");
                println!("      --seed <N>             Seed for the synthetic ERP data");
                println!("  -h, --help                 Show this help message");
                println!();
                println!("{HELP}");
                return Ok(());
            }
            other => warn!(argument = other, "Ignoring unknown argument"),
        }
        i += 1;
    }

    let mut config = match &config_path {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::default(),
    };
    if let Some(seed) = seed {
        config.agent.seed = seed;
    }

    let llm = build_llm_client(&config.llm)?;
    let embedder = build_embedder(&config.embedding)?;
    if embedder.dimension() != config.embedding.dimension {
        anyhow::bail!(
            "Embedding model produces {} dimensions but {} are configured",
            embedder.dimension(),
            config.embedding.dimension
        );
    }
    let oracle: Arc<dyn Oracle> = Arc::new(LlmOracle::new(Arc::clone(&llm)));
    let catalog = erpmind_erp::seeded_catalog(config.agent.seed);
    let settings = config.agent_settings();

    let mut agents = BTreeMap::new();
    for dept in Department::ALL {
        let store = ContextStore::new(config.context_config(), Arc::clone(&embedder));
        let agent = DepartmentAgent::new(
            dept,
            &catalog,
            Arc::clone(&llm),
            Arc::clone(&oracle),
            store,
            settings.clone(),
        )
        .await;
        agents.insert(dept, agent);
    }
    info!(
        model = llm.model_name(),
        operations = catalog.len(),
        seed = config.agent.seed,
        "ERP assistant ready"
    );

    println!("ERP assistant. Type :help for commands.");
    let mut stdout = tokio::io::stdout();
    repl(BufReader::new(tokio::io::stdin()), &mut stdout, &agents, department).await;

    for (dept, agent) in &agents {
        if let Err(e) = agent.save_context().await {
            warn!(department = %dept, error = %e, "Failed to save context on exit");
        }
    }
    info!("Contexts saved, goodbye");
    Ok(())
}

/// Run commands until `:quit`, end of input or a terminal I/O error.
///
/// Returns nothing so the caller always reaches the save step.
async fn repl<R, W>(
    input: R,
    output: &mut W,
    agents: &BTreeMap<Department, DepartmentAgent>,
    mut department: Department,
) where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    loop {
        let prompt = format!("[{department}] > ");
        if let Err(e) = write_out(output, &prompt).await {
            warn!(error = %e, "Failed to write prompt");
            break;
        }

        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "Failed to read input");
                break;
            }
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
        let reply = match command {
            ":quit" | ":exit" => break,
            ":help" => format!("{HELP}\n"),
            ":dept" => match rest.parse::<Department>() {
                Ok(dept) => {
                    department = dept;
                    format!("Switched to {department}.\n")
                }
                Err(e) => format!("{e}\n"),
            },
            _ => match agents.get(&department) {
                Some(agent) => execute(agent, command, line).await,
                None => format!("No agent for {department}.\n"),
            },
        };
        if let Err(e) = write_out(output, &reply).await {
            warn!(error = %e, "Failed to write reply");
            break;
        }
    }
}

async fn execute(agent: &DepartmentAgent, command: &str, line: &str) -> String {
    match command {
        ":save" => match agent.save_context().await {
            Ok(()) => "✅ Context saved successfully\n".to_string(),
            Err(e) => format!("⚠️ Save failed: {e}\n"),
        },
        ":clear" => {
            agent.clear_context().await;
            "🧹 Context cleared. All historical data removed.\n".to_string()
        }
        ":stats" => {
            let stats = agent.stats().await;
            format!(
                "entries: {}, vectors: {}, dimensions: {}\n",
                stats.entries, stats.vectors, stats.dimensions
            )
        }
        ":ops" => {
            let mut out = String::new();
            for op in agent.operations() {
                let params: Vec<String> = op.params().iter().map(|p| p.signature()).collect();
                out.push_str(&format!(
                    "  {}({}): {}\n",
                    op.name(),
                    params.join(", "),
                    op.description()
                ));
            }
            out
        }
        _ => {
            let reply = agent.run(line).await;
            let mut out = String::new();
            if !reply.context.is_empty() {
                out.push_str(&format!(
                    "(using {} prior interaction(s))\n",
                    reply.context.len()
                ));
            }
            out.push_str(&reply.text);
            out.push_str("\n\n");
            out
        }
    }
}

async fn write_out<W: AsyncWrite + Unpin>(output: &mut W, text: &str) -> std::io::Result<()> {
    output.write_all(text.as_bytes()).await?;
    output.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    struct ClosedTerminal;

    impl AsyncWrite for ClosedTerminal {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &[u8],
        ) -> Poll<std::io::Result<usize>> {
            Poll::Ready(Err(std::io::ErrorKind::BrokenPipe.into()))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn unreadable_input_ends_the_session() {
        let input: &[u8] = b"hello\n\xff\xfe\n:dept hr\n";
        let mut output = Vec::new();
        repl(input, &mut output, &BTreeMap::new(), Department::Sales).await;

        let shown = String::from_utf8(output).unwrap();
        assert!(shown.contains("No agent for Sales."));
        assert!(!shown.contains("Switched"));
    }

    #[tokio::test]
    async fn closed_terminal_ends_the_session() {
        let mut input: &[u8] = b":dept hr\n";
        repl(&mut input, &mut ClosedTerminal, &BTreeMap::new(), Department::Sales).await;
        assert_eq!(input.len(), 9);
    }

    #[tokio::test]
    async fn quit_stops_reading() {
        let input: &[u8] = b":dept hr\n:quit\n:dept sales\n";
        let mut output = Vec::new();
        repl(input, &mut output, &BTreeMap::new(), Department::Sales).await;

        let shown = String::from_utf8(output).unwrap();
        assert_eq!(shown.matches("Switched").count(), 1);
        assert!(shown.contains("Switched to HR."));
        assert!(shown.ends_with("[HR] > "));
    }
}
