//! `vidq console` – interactive session against the real collaborators.

use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use vidq_core::adapters;
use vidq_core::agent::{Agent, Inbound, Sender};
use vidq_core::config::VidqConfig;

use crate::cli::console_host::ConsoleHost;

/// Input line that picks a menu entry: `#N`.
pub fn parse_pick(line: &str) -> Option<usize> {
    line.strip_prefix('#')?.trim().parse().ok()
}

/// Reads messages from stdin until EOF, then waits for all jobs to finish.
pub async fn run_console(cfg: &VidqConfig, user_id: i64, chat_id: i64, out_dir: PathBuf) -> Result<()> {
    let host = Arc::new(ConsoleHost::new(out_dir, cfg.audit_dir.clone()));
    let agent = Agent::assemble(cfg, host.clone(), adapters::process_services(cfg).await);
    let sender = Sender {
        user_id,
        chat_id,
        handle: std::env::var("USER").ok(),
        name: "console".to_string(),
    };
    tracing::info!(user_id, chat_id, "console session started");
    println!("Send a link or a search query; #N picks an entry of the last menu.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut callbacks = 0u64;
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let inbound = match parse_pick(line) {
            Some(n) => match host.pick(n) {
                Some((surface, choice)) => {
                    callbacks += 1;
                    Inbound::Callback {
                        from: sender.clone(),
                        callback_id: format!("console-{callbacks}"),
                        surface,
                        data: choice.data,
                    }
                }
                None => {
                    println!("No menu entry #{n}.");
                    continue;
                }
            },
            None => Inbound::Text {
                from: sender.clone(),
                text: line.to_string(),
            },
        };
        agent.handle(inbound).await;
    }

    tracing::debug!("end of input, waiting for running jobs");
    agent.scheduler().wait_idle().await;
    tracing::info!("console session finished");
    Ok(())
}
