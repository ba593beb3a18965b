//! Command-line front end: load text into a document, apply edits and print
//! both element trees as JSON.

use std::io::Read;

use anyhow::{bail, Context, Result};
use gapdoc::{Document, DocumentConfig, UndoManager};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

enum Command {
    Insert { offset: usize, text: String },
    Remove { offset: usize, length: usize },
    Undo,
}

struct Options {
    path: Option<String>,
    commands: Vec<Command>,
    text_only: bool,
}

fn print_help() {
    println!("gapdoc - document model inspector");
    println!();
    println!("Usage: gapdoc [FILE] [OPTIONS]");
    println!();
    println!("Reads FILE (or stdin when FILE is missing or '-'), builds a document");
    println!("and prints its default and bidi element trees as JSON.");
    println!();
    println!("Options:");
    println!("  --insert OFFSET TEXT   Insert TEXT at OFFSET");
    println!("  --remove OFFSET LEN    Remove LEN characters at OFFSET");
    println!("  --undo                 Undo the previous edit");
    println!("  --text                 Print the final text instead of the trees");
    println!("  --help                 Show this help");
    println!();
    println!("Edits run in the order given. Logging is controlled by RUST_LOG,");
    println!("configuration by the GAPDOC_* environment variables.");
}

fn parse_offset(value: Option<&String>, what: &str) -> Result<usize> {
    let value = value.with_context(|| format!("missing {}", what))?;
    value
        .parse()
        .with_context(|| format!("invalid {}: {:?}", what, value))
}

fn parse_args(args: &[String]) -> Result<Option<Options>> {
    let mut options = Options {
        path: None,
        commands: Vec::new(),
        text_only: false,
    };
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--help" | "-h" => return Ok(None),
            "--insert" => {
                let offset = parse_offset(iter.next(), "insert offset")?;
                let text = iter.next().context("missing insert text")?.clone();
                options.commands.push(Command::Insert { offset, text });
            }
            "--remove" => {
                let offset = parse_offset(iter.next(), "remove offset")?;
                let length = parse_offset(iter.next(), "remove length")?;
                options.commands.push(Command::Remove { offset, length });
            }
            "--undo" => options.commands.push(Command::Undo),
            "--text" => options.text_only = true,
            other if other.starts_with("--") => bail!("unknown option {}", other),
            path => {
                if options.path.is_some() {
                    bail!("more than one input file given");
                }
                options.path = Some(path.to_string());
            }
        }
    }
    Ok(Some(options))
}

fn read_input(path: Option<&str>) -> Result<String> {
    match path {
        None | Some("-") => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("reading stdin")?;
            Ok(text)
        }
        Some(path) => std::fs::read_to_string(path).with_context(|| format!("reading {}", path)),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gapdoc=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(options) = parse_args(&args)? else {
        print_help();
        return Ok(());
    };

    let config = DocumentConfig::from_env();
    let mut history = UndoManager::from_config(&config);
    let mut document = Document::with_config(config);

    let text = read_input(options.path.as_deref())?;
    if let Some(event) = document.insert_string(0, &text, None)? {
        history.add_edit(event);
    }
    tracing::info!("loaded {} characters", document.len());

    for command in options.commands {
        match command {
            Command::Insert { offset, text } => {
                if let Some(event) = document
                    .insert_string(offset, &text, None)
                    .with_context(|| format!("insert at {}", offset))?
                {
                    history.add_edit(event);
                }
            }
            Command::Remove { offset, length } => {
                if let Some(event) = document
                    .remove(offset, length)
                    .with_context(|| format!("remove {} at {}", length, offset))?
                {
                    history.add_edit(event);
                }
            }
            Command::Undo => history.undo(&mut document).context("undo")?,
        }
    }

    if options.text_only {
        print!("{}", document.text());
    } else {
        println!("{}", serde_json::to_string_pretty(&document.dump())?);
    }
    Ok(())
}
