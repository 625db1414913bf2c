mod test_runner;

use std::path::Path;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};
use tracing_subscriber::EnvFilter;

use propbag::class::ClassId;
use propbag::{Document, ParserOptions};
use resolver::{LoadError, ResolvedBag};

const SUBCOMMANDS: &[&str] = &["check", "dump", "tree", "test", "help"];

/// Global flags that consume the following argument.
const VALUE_FLAGS: &[&str] = &["--comment-marker", "--max-depth"];

#[derive(Parser)]
#[command(name = "propbag", version, about = "Property bag loader")]
struct Cli {
    /// Disable colored error output
    #[arg(long, global = true)]
    no_color: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Comment marker; everything after it on a line is ignored
    #[arg(long, global = true)]
    comment_marker: Option<String>,

    /// Maximum nesting depth
    #[arg(long, global = true)]
    max_depth: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse and resolve a file, reporting any errors
    Check(FileArgs),

    /// Print the resolved property bags
    Dump(DumpArgs),

    /// Print the declared classes as a tree
    Tree(FileArgs),

    /// Run .test.bag test files
    Test(TestArgs),
}

#[derive(clap::Args)]
struct FileArgs {
    /// Property bag source file
    file: String,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Toml,
    Json,
    Debug,
}

#[derive(clap::Args)]
struct DumpArgs {
    /// Property bag source file
    file: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "toml")]
    format: Format,

    /// Only print this class
    #[arg(long)]
    class: Option<String>,
}

#[derive(clap::Args)]
struct TestArgs {
    /// Path to a .test.bag file or directory containing them
    path: String,

    /// Run only tests in these categories (subfolder names). Repeatable.
    #[arg(short, long)]
    category: Vec<String>,

    /// List available categories and exit
    #[arg(long)]
    list_categories: bool,
}

fn main() {
    // `propbag file.bag` works like `propbag dump file.bag`.
    let mut args: Vec<String> = std::env::args().collect();
    if let Some(pos) = first_positional(&args) {
        if !SUBCOMMANDS.contains(&args[pos].as_str()) {
            args.insert(pos, "dump".to_string());
        }
    }

    let cli = Cli::parse_from(&args);
    init_logging(cli.verbose);

    let mut options = ParserOptions::default();
    if let Some(marker) = &cli.comment_marker {
        options.comment_marker = marker.clone();
    }
    if let Some(depth) = cli.max_depth {
        options.max_depth = depth;
    }

    match cli.command {
        Command::Check(file_args) => {
            let (bag, _) = load_or_exit(&file_args.file, &options, cli.no_color);
            eprintln!("ok: {} resolved {} class(es)", file_args.file, bag.len());
        }
        Command::Dump(dump_args) => {
            let (bag, _) = load_or_exit(&dump_args.file, &options, cli.no_color);
            do_dump(&bag, &dump_args);
        }
        Command::Tree(file_args) => {
            let (_, document) = load_or_exit(&file_args.file, &options, cli.no_color);
            print_tree(&document, &document.roots, 0);
        }
        Command::Test(test_args) => {
            let path = Path::new(&test_args.path);
            if test_args.list_categories {
                test_runner::list_categories(path);
                return;
            }
            let exit_code = test_runner::run_tests(path, cli.no_color, &test_args.category);
            process::exit(exit_code);
        }
    }
}

/// Index of the first argument that is neither a flag nor a flag's value.
fn first_positional(args: &[String]) -> Option<usize> {
    let mut i = 1;
    while i < args.len() {
        let arg = args[i].as_str();
        if VALUE_FLAGS.contains(&arg) {
            i += 2;
            continue;
        }
        if !arg.starts_with('-') {
            return Some(i);
        }
        i += 1;
    }
    None
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Read, parse and resolve `file`, rendering diagnostics and exiting on failure.
fn load_or_exit(file: &str, options: &ParserOptions, no_color: bool) -> (ResolvedBag, Document) {
    let color_choice = if no_color {
        ColorChoice::Never
    } else {
        ColorChoice::Auto
    };

    let source = match std::fs::read_to_string(file) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: cannot read '{}': {}", file, e);
            process::exit(1);
        }
    };

    let mut files = SimpleFiles::new();
    let file_id = files.add(file.to_string(), source.clone());

    let parser = propbag::parser::Parser::new(source, file_id).with_options(options.clone());
    let result = parser
        .parse()
        .map_err(LoadError::Parse)
        .and_then(|document| {
            let bag = resolver::resolve(&document)?;
            Ok((bag, document))
        });

    match result {
        Ok(loaded) => loaded,
        Err(error) => {
            tracing::info!(kind = %error.kind(), line = error.line(), "load failed");
            let writer = StandardStream::stderr(color_choice);
            let config = term::Config::default();
            for diagnostic in error.diagnostics(file_id) {
                let _ =
                    term::emit_to_write_style(&mut writer.lock(), &config, &files, &diagnostic);
            }
            process::exit(1);
        }
    }
}

fn do_dump(bag: &ResolvedBag, args: &DumpArgs) {
    if let Some(name) = &args.class {
        let Some(properties) = bag.get(name) else {
            eprintln!("error: no concrete class named '{}'", name);
            process::exit(1);
        };
        let rendered = match args.format {
            Format::Toml => toml::to_string(properties).map_err(|e| e.to_string()),
            Format::Json => serde_json::to_string_pretty(properties).map_err(|e| e.to_string()),
            Format::Debug => Ok(format!("{:#?}", properties)),
        };
        print_rendered(rendered);
        return;
    }

    let rendered = match args.format {
        Format::Toml => toml::to_string(bag).map_err(|e| e.to_string()),
        Format::Json => serde_json::to_string_pretty(bag).map_err(|e| e.to_string()),
        Format::Debug => Ok(format!("{:#?}", bag)),
    };
    print_rendered(rendered);
}

fn print_rendered(rendered: Result<String, String>) {
    match rendered {
        Ok(text) => println!("{}", text.trim_end()),
        Err(e) => {
            eprintln!("error: cannot serialize: {}", e);
            process::exit(1);
        }
    }
}

fn print_tree(document: &Document, ids: &[ClassId], indent: usize) {
    for &id in ids {
        let class = document.class(id);
        let pad = "  ".repeat(indent);
        let marker = if class.is_abstract { ":: " } else { "" };
        let name = if class.name.is_empty() {
            "(unnamed)"
        } else {
            class.name.as_str()
        };
        let bases: Vec<&str> = class.bases.iter().map(|b| b.name.as_str()).collect();
        if bases.is_empty() {
            println!("{}{}{}", pad, marker, name);
        } else {
            println!("{}{}{} :: {}", pad, marker, name, bases.join(", "));
        }
        print_tree(document, &class.children, indent + 1);
    }
}
