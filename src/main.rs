use anyhow::{bail, Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod knowledge;
mod mcp;
mod render;
mod tools;
mod utils;

use config::{CliOverrides, Settings};
use knowledge::session::KnowledgeBase;
use knowledge::store::Store;
use mcp::server::McpServer;
use mcp::transport::StdioTransport;

/// Prints a formatted box with the given lines
/// Empty strings create empty lines, other strings are centered within the box
fn print_box(lines: &[&str]) {
    const BOX_WIDTH: usize = 60;
    const CONTENT_WIDTH: usize = BOX_WIDTH - 4;

    eprintln!("\n\x1b[36m╔{}╗", "═".repeat(BOX_WIDTH - 2));

    for line in lines {
        if line.is_empty() {
            eprintln!("║{}║", " ".repeat(BOX_WIDTH - 2));
            continue;
        }

        let visible_len = strip_ansi_codes(line).chars().count();
        if visible_len < CONTENT_WIDTH {
            let total_padding = CONTENT_WIDTH - visible_len;
            let left_padding = total_padding / 2;
            let right_padding = total_padding - left_padding;

            eprintln!(
                "║  {}{}{}\x1b[36m║",
                " ".repeat(left_padding),
                line,
                " ".repeat(right_padding)
            );
        } else {
            eprintln!("║  {}\x1b[36m  ║", line);
        }
    }

    eprintln!("╚{}╝\x1b[0m\n", "═".repeat(BOX_WIDTH - 2));
}

/// Strips ANSI escape codes to calculate visible text length
fn strip_ansi_codes(text: &str) -> String {
    let mut result = String::new();
    let mut chars = text.chars();

    while let Some(ch) = chars.next() {
        if ch == '\x1b' {
            if chars.next() == Some('[') {
                for c in chars.by_ref() {
                    if c.is_ascii_alphabetic() {
                        break;
                    }
                }
            }
        } else {
            result.push(ch);
        }
    }

    result
}

fn cli() -> Command {
    Command::new("kb-search")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Ask questions about your own text and PDF files")
        .author("Ivan Mezentsev")
        .long_about(
            "Keeps a small knowledge base of .txt and .pdf files, ranks them by keyword\n\
            relevance against a question and asks Google Gemini to answer from the\n\
            best excerpts. The same operations are available as MCP tools via `serve`.",
        )
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("api-key")
                .long("api-key")
                .value_name("KEY")
                .global(true)
                .help("Google Generative Language API key (overrides GOOGLE_API_KEY)")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("model")
                .long("model")
                .short('m')
                .value_name("MODEL")
                .global(true)
                .help("Gemini model name (default: gemini-2.5-flash)")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("data-dir")
                .long("data-dir")
                .value_name("DIR")
                .global(true)
                .help("Directory holding documents.json and settings.json")
                .value_parser(clap::value_parser!(PathBuf))
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("quiet")
                .long("quiet")
                .short('q')
                .global(true)
                .help("Only log errors")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("no-color")
                .long("no-color")
                .global(true)
                .help("Disable colored output")
                .action(ArgAction::SetTrue),
        )
        .subcommand(
            Command::new("add")
                .about("Add .txt or .pdf files (up to 10MB each)")
                .arg(
                    Arg::new("files")
                        .value_name("FILE")
                        .required(true)
                        .num_args(1..)
                        .value_parser(clap::value_parser!(PathBuf)),
                ),
        )
        .subcommand(Command::new("list").about("List stored documents"))
        .subcommand(
            Command::new("remove")
                .about("Remove a document by id")
                .arg(Arg::new("id").value_name("ID").required_unless_present("all"))
                .arg(
                    Arg::new("all")
                        .long("all")
                        .help("Remove every document")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("find")
                .about("Show the most relevant excerpts for a query without calling the model")
                .arg(query_arg()),
        )
        .subcommand(
            Command::new("ask")
                .about("Answer a question from the stored documents")
                .arg(query_arg())
                .arg(
                    Arg::new("output")
                        .long("output")
                        .short('o')
                        .value_name("FILE")
                        .help("Also write the question and answer to FILE")
                        .value_parser(clap::value_parser!(PathBuf))
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("save")
                        .long("save")
                        .help("Also write the question and answer to answer_<timestamp>.txt")
                        .conflicts_with("output")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("config")
                .about("Manage stored settings")
                .subcommand_required(true)
                .subcommand(
                    Command::new("set-key")
                        .about("Store the Google API key")
                        .arg(Arg::new("key").value_name("KEY").required(true)),
                )
                .subcommand(
                    Command::new("set-model")
                        .about("Store the default Gemini model")
                        .arg(Arg::new("model-name").value_name("MODEL").required(true)),
                )
                .subcommand(Command::new("show").about("Show effective settings")),
        )
        .subcommand(Command::new("serve").about("Run as an MCP server on stdio"))
}

fn query_arg() -> Arg {
    Arg::new("query")
        .value_name("QUERY")
        .required(true)
        .num_args(1..)
        .help("Free-text question; multiple words are joined with spaces")
}

fn joined_query(matches: &ArgMatches) -> String {
    matches
        .get_many::<String>("query")
        .map(|words| words.cloned().collect::<Vec<_>>().join(" "))
        .unwrap_or_default()
}

fn init_tracing(quiet: bool) {
    // stdout carries answers and JSON-RPC, so logs go to stderr
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(log_filter(quiet))
        .init();
}

fn log_filter(quiet: bool) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if quiet { "error" } else { "info" }))
}

#[tokio::main]
async fn main() {
    let matches = cli().get_matches();
    let quiet = matches.get_flag("quiet");
    init_tracing(quiet);

    if let Err(e) = run(&matches, quiet).await {
        error!("{:#}", e);
        process::exit(1);
    }
}

async fn run(matches: &ArgMatches, quiet: bool) -> Result<()> {
    let overrides = CliOverrides {
        api_key: matches.get_one::<String>("api-key").cloned(),
        model: matches.get_one::<String>("model").cloned(),
        data_dir: matches.get_one::<PathBuf>("data-dir").cloned(),
    };
    let color = !matches.get_flag("no-color")
        && std::env::var_os("NO_COLOR").is_none()
        && std::io::stdout().is_terminal();

    let dir = config::data_dir(&overrides);
    let store = Store::open(&dir)
        .with_context(|| format!("failed to open data directory {}", dir.display()))?;
    let settings = Settings::resolve(&overrides, store.settings());

    match matches.subcommand() {
        Some(("config", sub)) => return run_config(sub, store, &settings),
        Some(("serve", _)) => return run_server(store, &settings, quiet).await,
        _ => {}
    }

    let mut kb = KnowledgeBase::new(store, &settings).context("failed to create Gemini client")?;

    match matches.subcommand() {
        Some(("add", sub)) => {
            let files: Vec<PathBuf> = sub
                .get_many::<PathBuf>("files")
                .map(|v| v.cloned().collect())
                .unwrap_or_default();
            let outcomes = kb.add_files(&files);
            let mut failed = 0;
            for outcome in &outcomes {
                match &outcome.result {
                    Ok(doc) => {
                        info!("File \"{}\" uploaded successfully", doc.name);
                        println!("{}  {}", doc.id, doc.summary_line());
                    }
                    Err(e) => {
                        warn!("{}: {}", outcome.path.display(), e);
                        failed += 1;
                    }
                }
            }
            if failed > 0 {
                bail!("{} of {} file(s) could not be added", failed, outcomes.len());
            }
        }
        Some(("list", _)) => {
            let documents = kb.documents();
            if documents.is_empty() {
                println!("No documents uploaded yet");
            }
            for doc in documents {
                println!("{}  {}", doc.id, doc.summary_line());
            }
        }
        Some(("remove", sub)) => {
            if sub.get_flag("all") {
                let count = kb.store_mut().clear()?;
                info!("Removed {} document(s)", count);
            } else if let Some(id) = sub.get_one::<String>("id") {
                let doc = kb.remove(id)?;
                info!("Document removed: {}", doc.name);
            }
        }
        Some(("find", sub)) => {
            let excerpts = kb.find(&joined_query(sub))?;
            print!("{}", render::render_excerpts(&excerpts, color));
        }
        Some(("ask", sub)) => {
            let answer = match kb.ask(&joined_query(sub)).await {
                Ok(answer) => answer,
                Err(e @ knowledge::session::QueryError::Generation(_)) => {
                    error!("Error processing your query. Please try again.");
                    return Err(e.into());
                }
                Err(e) => return Err(e.into()),
            };
            print!("{}", render::render_answer(&answer, color));

            let export_path = if sub.get_flag("save") {
                Some(PathBuf::from(render::default_export_name(answer.answered_at)))
            } else {
                sub.get_one::<PathBuf>("output").cloned()
            };
            if let Some(path) = export_path {
                std::fs::write(&path, render::export_text(&answer))
                    .with_context(|| format!("failed to write {}", path.display()))?;
                info!("Answer downloaded to {}", path.display());
            }
        }
        _ => unreachable!("subcommand_required is set"),
    }

    Ok(())
}

fn run_config(matches: &ArgMatches, mut store: Store, settings: &Settings) -> Result<()> {
    match matches.subcommand() {
        Some(("set-key", sub)) => {
            let key = sub.get_one::<String>("key").map(String::as_str).unwrap_or("");
            store.set_api_key(key)?;
            info!("API key saved successfully!");
        }
        Some(("set-model", sub)) => {
            let model = sub
                .get_one::<String>("model-name")
                .map(String::as_str)
                .unwrap_or("");
            store.set_model(model)?;
            info!("Model changed to {}", model.trim());
        }
        Some(("show", _)) => {
            println!("data dir: {}", store.dir().display());
            println!(
                "api key:  {}",
                settings
                    .api_key
                    .as_deref()
                    .map(config::mask_key)
                    .unwrap_or_else(|| "(not set)".to_string())
            );
            println!("model:    {}", settings.model);
            println!("endpoint: {}", settings.endpoint);
            println!("documents: {}", store.documents().len());
        }
        _ => unreachable!("subcommand_required is set"),
    }
    Ok(())
}

async fn run_server(store: Store, settings: &Settings, quiet: bool) -> Result<()> {
    match &settings.api_key {
        Some(_) => info!("Gemini answering enabled with model {}", settings.model),
        None => warn!("Google API key not found - ask-documents tool will be disabled"),
    }

    if !quiet {
        print_box(&[
            "",
            "\x1b[1m\x1b[31m kb-search: Document Q&A Server \x1b[0m",
            "",
            "\x1b[0m Ask your text and PDF files, answered by Gemini \x1b[0m",
            "",
        ]);
    }

    let kb = KnowledgeBase::new(store, settings).context("failed to create Gemini client")?;
    info!("Starting MCP server...");
    let mut server = McpServer::new(kb);
    let mut transport = StdioTransport::stdio();
    server.serve(&mut transport).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        cli().debug_assert();
    }

    #[test]
    fn query_words_are_joined() {
        let matches = cli().get_matches_from(["kb-search", "ask", "what", "is", "rust"]);
        let (_, sub) = matches.subcommand().unwrap();
        assert_eq!(joined_query(sub), "what is rust");
    }

    #[test]
    fn global_flags_work_after_subcommand() {
        let matches =
            cli().get_matches_from(["kb-search", "list", "--data-dir", "/tmp/kb", "--quiet"]);
        assert!(matches.get_flag("quiet"));
        assert_eq!(
            matches.get_one::<PathBuf>("data-dir"),
            Some(&PathBuf::from("/tmp/kb"))
        );
    }

    #[test]
    fn set_model_value_does_not_clash_with_global_model() {
        let matches = cli().get_matches_from(["kb-search", "config", "set-model", "gemini-2.5-pro"]);
        let (_, config) = matches.subcommand().unwrap();
        let (_, sub) = config.subcommand().unwrap();
        assert_eq!(
            sub.get_one::<String>("model-name").map(String::as_str),
            Some("gemini-2.5-pro")
        );
    }

    #[test]
    fn log_filter_accepts_target_directives() {
        assert!("kb_search=debug".parse::<EnvFilter>().is_ok());
        assert!("kb_search=debug,gemini=trace".parse::<EnvFilter>().is_ok());
    }

    #[test]
    fn ansi_codes_are_stripped() {
        assert_eq!(strip_ansi_codes("\x1b[1m\x1b[31mhi\x1b[0m"), "hi");
    }
}
