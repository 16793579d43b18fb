mod analyze;
mod classify;
mod db;
mod error;
mod health;
mod ingest;
mod models;
mod source;
mod tools;

use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use tracing::error;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_writer(std::io::stderr)
        .init();

    let db_path = get_db_path()?;
    let mut db = db::Database::open(&db_path)
        .with_context(|| format!("Failed to open database at {}", db_path.display()))?;
    let mut handler = tools::ToolHandler::new(&mut db);

    // One JSON request per line on stdin, one JSON reply per line on stdout.
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout().lock();
    for line in stdin.lock().lines() {
        let line = line.context("Failed to read request line")?;
        if line.trim().is_empty() {
            continue;
        }
        let reply = match serde_json::from_str::<tools::ToolRequest>(&line) {
            Ok(request) => handler.dispatch(&request),
            Err(e) => {
                error!(error = %e, "malformed request line");
                tools::ToolReply::err(format!("malformed request: {e}"))
            }
        };
        serde_json::to_writer(&mut stdout, &reply)?;
        writeln!(stdout)?;
    }

    Ok(())
}

fn get_db_path() -> Result<std::path::PathBuf> {
    let proj_dirs = directories::ProjectDirs::from("com", "spendlog", "Spendlog")
        .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
    let data_dir = proj_dirs.data_dir();
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;
    Ok(data_dir.join("spendlog.db"))
}
