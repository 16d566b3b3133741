//! Gazetteer curation shell
//!
//! An interactive command line for loading, searching, de-duplicating, and
//! saving gazetteer files.
//!
//! # Usage
//!
//! ```bash
//! # Start a session with a file preloaded
//! choros_cli --load data/moontown_names.json
//!
//! # Run a single command and exit
//! choros_cli --load strings.txt contents
//! ```

use clap::Parser;
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use choros::align::{AlignmentCriterion, SelfAligner};
use choros::index::Operator;
use choros::manager::Manager;
use choros::normalize::norm;

#[derive(Parser)]
#[command(name = "choros_cli")]
#[command(version = "0.1.0")]
#[command(about = "Interactive shell for curating gazetteers of geographic names")]
struct Cli {
    /// Gazetteer file to load on startup (.json or .txt)
    #[arg(short, long)]
    load: Option<String>,

    /// One-shot command to run instead of the interactive shell
    command: Vec<String>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut manager = Manager::new();

    if let Some(path) = &cli.load {
        match manager.load(path, None) {
            Ok(msg) => println!("{msg}"),
            Err(e) => {
                eprintln!("{}: {}", "error".red().bold(), e);
                return ExitCode::FAILURE;
            }
        }
    }

    if !cli.command.is_empty() {
        let parts: Vec<String> = cli.command.iter().map(|p| norm(p)).collect();
        return match dispatch(&mut manager, &parts) {
            Ok(Some(msg)) => {
                println!("{msg}");
                ExitCode::SUCCESS
            }
            Ok(None) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("{}: {}", "error".red().bold(), e);
                ExitCode::FAILURE
            }
        };
    }

    match interact(&mut manager) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn interact(manager: &mut Manager) -> anyhow::Result<()> {
    let mut editor = DefaultEditor::new()?;
    loop {
        match editor.readline("> ") {
            Ok(line) => {
                let line = norm(&line);
                if line.is_empty() {
                    continue;
                }
                editor.add_history_entry(&line)?;
                let parts: Vec<String> = line.split(' ').map(str::to_string).collect();
                match dispatch(manager, &parts) {
                    Ok(Some(msg)) => println!("{msg}"),
                    Ok(None) => break,
                    Err(e) => println!("{}: {}", "error".red().bold(), e),
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

/// Route one whitespace-split command to the manager. `Ok(None)` means
/// quit.
fn dispatch(manager: &mut Manager, parts: &[String]) -> choros::Result<Option<String>> {
    let verb = parts[0].to_lowercase();
    let args = &parts[1..];
    let msg = match verb.as_str() {
        "align" => {
            let mut fuzzy = false;
            let mut operator = Operator::And;
            for arg in args {
                if arg == "fuzzy" {
                    fuzzy = true;
                } else {
                    operator = arg.parse()?;
                }
            }
            let criterion = AlignmentCriterion::from_name("text", fuzzy)?;
            manager.align_self_with(SelfAligner::new(vec![criterion], operator))?
        }
        "contents" | "list" | "ls" => manager.contents()?,
        "drop" => manager.drop_gazetteer()?,
        "examine" => match parse_numbers(args) {
            Some(nums) if nums.len() == 1 => manager.examine(nums[0])?,
            _ => syntax_error("examine takes one context number"),
        },
        "find" => {
            if args.is_empty() {
                syntax_error("find takes one or more search terms")
            } else {
                manager.find(args.to_vec())?
            }
        }
        "help" => help_text(),
        "json" => manager.json()?,
        "len" => manager.len()?,
        "load" => match args {
            [path] => manager.load(path, None)?,
            [path, format] => manager.load(path, Some(format))?,
            _ => syntax_error("load takes a file path and an optional format"),
        },
        "merge" => match parse_numbers(args) {
            Some(nums) if nums.len() >= 2 => manager.merge(&nums)?,
            _ => syntax_error("merge takes two or more context numbers"),
        },
        "new" => {
            if args.is_empty() {
                syntax_error("new takes an object type and field:value arguments")
            } else {
                manager.new_entity(&args[0], &args[1..])?
            }
        }
        "promote" => match parse_numbers(args) {
            Some(nums) if !nums.is_empty() => manager.promote(&nums)?,
            _ => syntax_error("promote takes one or more context numbers"),
        },
        "remove" => match parse_numbers(args) {
            Some(nums) if nums.len() == 1 => manager.remove(nums[0])?,
            _ => syntax_error("remove takes one context number"),
        },
        "review" => manager.review_matches()?,
        "save" => match args {
            [path] => manager.save(path, None)?,
            [path, format] => manager.save(path, Some(format))?,
            _ => syntax_error("save takes a file path and an optional format"),
        },
        "str" => manager.text()?,
        "quit" | "exit" => return Ok(None),
        other => syntax_error(&format!("unknown command \"{other}\" (try \"help\")")),
    };
    Ok(Some(msg))
}

fn parse_numbers(args: &[String]) -> Option<Vec<usize>> {
    args.iter()
        .map(|a| a.parse::<usize>().ok())
        .collect::<Option<Vec<usize>>>()
        .filter(|nums| !nums.is_empty())
}

fn syntax_error(detail: &str) -> String {
    format!("syntax error: {detail}")
}

fn help_text() -> String {
    [
        "   align: Find duplicate candidates within the gazetteer.",
        "contents: List contents of the gazetteer (aliases: list, ls).",
        "    drop: Erase contents of the gazetteer from memory.",
        " examine: Show a single object in full (by context number).",
        "    find: Search the gazetteer for matching character strings.",
        "    help: List available commands.",
        "    json: List gazetteer contents in JSON format (see \"save\" to write to file).",
        "     len: Count number of objects in the gazetteer.",
        "    load: Load gazetteer content from file (json or txt).",
        "   merge: Merge two or more objects (by context numbers).",
        "     new: Create a new object (e.g. new name attested:Moontown).",
        " promote: Promote objects to Places (by context numbers).",
        "  remove: Remove a single object (by context number).",
        "  review: Show the next unreviewed alignment candidate.",
        "    save: Save the gazetteer to file (json or txt).",
        "     str: Show the gazetteer as plain text.",
        "    quit: Leave the shell (alias: exit).",
    ]
    .join("\n")
}
