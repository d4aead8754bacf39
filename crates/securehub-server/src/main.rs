use std::net::SocketAddr;

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

use securehub_core::attachment::AttachmentParent;
use securehub_server::config::{Command, ServerConfig};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::parse();
    let service = securehub_server::build_service(&config).await?;

    match config.command() {
        Command::Serve => {
            let addr = SocketAddr::new(config.bind.parse()?, config.port);
            let listener = TcpListener::bind(addr).await?;
            info!("securehub-server listening on http://{addr}");
            securehub_server::serve(listener, service).await?;
        }
        Command::Reap => {
            let report = service.reaper().sweep(Utc::now()).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::List {
            request_id,
            comment,
        } => {
            let parent = match comment {
                Some(comment_id) => AttachmentParent::comment(request_id, comment_id),
                None => AttachmentParent::request(request_id),
            };
            let records = service.list_attachments(&parent).await?;
            if records.is_empty() {
                eprintln!("No attachments on {parent}.");
            } else {
                println!("{:<38} {:<8} {:>10} {:<28} NAME", "ID", "STATE", "SIZE", "CREATED");
                for record in records {
                    println!(
                        "{:<38} {:<8} {:>10} {:<28} {}",
                        record.id,
                        record.state.as_str(),
                        record.file_size,
                        record.created_at.to_rfc3339(),
                        record.file_name,
                    );
                }
            }
        }
    }

    Ok(())
}
