//! mantic - structural code search for AI coding agents
//!
//! Ranks files by structural relevance without reading their contents,
//! keeping latency flat on very large repositories.

mod cli;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use cli::{Cli, Commands, SessionCommands};
use mantic::output::render;
use mantic::pipeline::{run_search, SearchRequest};
use mantic::session::{boost_candidates, SessionStore};

fn main() {
    if let Err(err) = run() {
        eprintln!("mantic: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let root = PathBuf::from(cli.path.clone().unwrap_or_else(|| ".".to_string()));

    match &cli.command {
        Some(Commands::Server) => {
            mantic::mcp::run()?;
        }
        Some(Commands::Session { action }) => {
            run_session_command(&root, action)?;
        }
        None => {
            let query = cli.query.join(" ");
            let mut request = SearchRequest::new(&query, &root);
            request.filter = cli.type_filter();
            request.include_generated = cli.include_generated;
            request.impact = cli.impact;
            request.session = cli.session.clone();

            let response = run_search(&request)?;
            render(&response, cli.output_format(), cli.quiet)?;
        }
    }

    Ok(())
}

fn run_session_command(root: &PathBuf, action: &SessionCommands) -> Result<()> {
    let store = SessionStore::new(root);

    match action {
        SessionCommands::Start { name, intent } => {
            let session = store.start(name.as_deref(), intent.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&session.meta)?);
        }
        SessionCommands::List => {
            let sessions = store.list()?;
            let metas: Vec<_> = sessions.iter().map(|s| &s.meta).collect();
            println!("{}", serde_json::to_string_pretty(&metas)?);
        }
        SessionCommands::Info { id } => {
            let session = store.load_required(id)?;
            let payload = serde_json::json!({
                "session": session,
                "boostCandidates": boost_candidates(&session),
            });
            println!("{}", serde_json::to_string_pretty(&payload)?);
        }
        SessionCommands::End { id } => {
            let mut session = match id {
                Some(id) => store.load_required(id)?,
                None => store
                    .list()?
                    .into_iter()
                    .find(|s| s.meta.status == "active")
                    .ok_or_else(|| anyhow::anyhow!("no active session to end"))?,
            };
            store.end(&mut session)?;
            println!("{}", serde_json::to_string_pretty(&session.meta)?);
        }
    }

    Ok(())
}
