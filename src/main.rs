use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{bail, Context, Result};
use clap::Parser as ClapParser;
use clap::{Args, Subcommand};
use env_logger::Builder;
use log::{debug, info};

use bindexpr as bx;

use bx::builtins::MathFunctions;
use bx::{Engine, ExprError, Scope, TypeRef, Value};

#[derive(ClapParser, Debug)]
#[command(version, about = "Binding expression evaluator", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    commands: Commands,

    /// Enable logging to app.log
    #[arg(long, global = true)]
    log: bool,
}

/// Where the expression comes from: a file or the command line.
#[derive(Args, Debug)]
struct Source {
    /// File holding the expression
    filename: Option<PathBuf>,

    /// Expression text
    #[arg(short, long, conflicts_with = "filename")]
    expr: Option<String>,
}

#[derive(Args, Debug)]
struct Roots {
    /// JSON object whose top-level keys become roots
    #[arg(long)]
    roots: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Prints every lexeme of the expression
    Tokenize {
        #[command(flatten)]
        source: Source,

        /// Print lexemes as JSON
        #[arg(long)]
        json: bool,
    },

    /// Prints the parse tree in prefix form
    Parse {
        #[command(flatten)]
        source: Source,
    },

    /// Evaluates the expression and prints the result
    Evaluate {
        #[command(flatten)]
        source: Source,

        #[command(flatten)]
        roots: Roots,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Reports whether the expression is a writable path and its member type
    Inspect {
        #[command(flatten)]
        source: Source,

        #[command(flatten)]
        roots: Roots,
    },

    /// Writes a JSON value through the expression and prints the updated roots
    Set {
        #[command(flatten)]
        source: Source,

        #[command(flatten)]
        roots: Roots,

        /// JSON value to store
        #[arg(long)]
        value: String,
    },
}

/// Reads the contents of a file into a String
fn read_file(filename: &Path) -> Result<String> {
    info!("Reading file: {:?}", filename);
    let file = File::open(filename).context(format!("Failed to open file {:?}", filename))?;
    let mut reader = BufReader::new(file);
    let mut buf = String::new();

    let bytes = reader
        .read_to_string(&mut buf)
        .context(format!("Failed to read file {:?}", filename))?;

    info!("Read {} bytes from {:?}", bytes, filename);

    Ok(buf)
}

fn read_source(source: &Source) -> Result<String> {
    match (&source.expr, &source.filename) {
        (Some(expr), _) => Ok(expr.clone()),
        (None, Some(filename)) => Ok(read_file(filename)?.trim_end().to_string()),
        (None, None) => bail!("No expression provided, pass a file or --expr"),
    }
}

fn build_scope(engine: &Rc<Engine>, roots: &Roots) -> Result<Scope> {
    let mut scope = Scope::new(Rc::clone(engine));
    scope.add_static_root("Math", TypeRef::of::<MathFunctions>());

    if let Some(path) = &roots.roots {
        let file = File::open(path).context(format!("Failed to open roots file {:?}", path))?;
        let count = bx::json::roots_from_reader(&mut scope, BufReader::new(file))
            .context(format!("Failed to load roots from {:?}", path))?;
        info!("Registered {} roots from {:?}", count, path);
    }

    Ok(scope)
}

/// Exit code for an engine error: 65 for malformed input, 70 for evaluation failures.
fn fail(e: &ExprError) -> ! {
    debug!("Failure: {:?}", e);
    eprintln!("{}", e);

    if e.is_syntax() {
        std::process::exit(65);
    }
    std::process::exit(70);
}

fn print_roots(scope: &Scope) -> Result<()> {
    let mut document = serde_json::Map::new();

    for root in scope.roots().filter(|root| !root.is_static()) {
        document.insert(root.name().to_string(), bx::json::from_value(&root.value()));
    }

    println!("{}", serde_json::to_string_pretty(&document)?);
    Ok(())
}

fn init_logger() -> Result<()> {
    // Create or open the log file
    let log_file = File::create("app.log").context("Failed to create app.log")?;

    Builder::new()
        .format(|buf, record| {
            // Strip 'bindexpr::' from module path
            let module = record
                .module_path()
                .unwrap_or("<unnamed>")
                .strip_prefix("bindexpr::")
                .unwrap_or(record.module_path().unwrap_or("<unnamed>"));
            writeln!(
                buf,
                "[{}:{}] - {}",
                module,
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .filter(None, log::LevelFilter::Debug)
        .init();

    info!("Logger initialized, writing to app.log");
    Ok(())
}

fn main() -> Result<()> {
    let args: Cli = Cli::parse();

    if args.log {
        init_logger()?;
    } else {
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Off)
            .init();
    }

    info!("CLI arguments: {:?}", args);

    let engine = Rc::new(Engine::new().context("Failed to build the standard grammar")?);

    match args.commands {
        Commands::Tokenize { source, json } => {
            info!("Running Tokenize subcommand");
            let code = read_source(&source)?;
            let mut lexemes = Vec::new();

            for lexeme in engine.scanner().scan(&code) {
                match lexeme {
                    Ok(lexeme) => {
                        debug!("Scanned lexeme: {}", lexeme);
                        if !json {
                            println!("{}", lexeme);
                        }
                        lexemes.push(lexeme);
                    }

                    Err(e) => fail(&e),
                }
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&lexemes)?);
            }

            info!("Tokenization completed successfully");
        }

        Commands::Parse { source } => {
            info!("Running Parse subcommand");
            let code = read_source(&source)?;

            match engine.build_expression(&code) {
                Ok(expression) => {
                    debug!("AST: {}", expression);
                    println!("{}", expression);
                }
                Err(e) => fail(&e),
            }
        }

        Commands::Evaluate { source, roots, json } => {
            info!("Running Evaluate subcommand");
            let code = read_source(&source)?;
            let scope = build_scope(&engine, &roots)?;

            match scope.evaluate(&code) {
                Ok(value) if json => {
                    println!("{}", serde_json::to_string_pretty(&bx::json::from_value(&value))?)
                }
                Ok(value) => {
                    debug!("Evaluated to: {}", value);
                    println!("{}", value);
                }
                Err(e) => fail(&e),
            }
        }

        Commands::Inspect { source, roots } => {
            info!("Running Inspect subcommand");
            let code = read_source(&source)?;
            let scope = build_scope(&engine, &roots)?;

            let expression = scope.build_or_get_expression(&code).unwrap_or_else(|e| fail(&e));
            let writable = scope
                .is_valid_set_value_expression(&expression)
                .unwrap_or_else(|e| fail(&e));
            let result_type = scope.path_result_type(&code).unwrap_or_else(|e| fail(&e));

            println!("tree: {}", expression);
            println!(
                "path: {}",
                expression
                    .token_path()
                    .iter()
                    .map(|node| node.text())
                    .collect::<Vec<_>>()
                    .join(" | ")
            );
            println!("writable: {}", writable);
            match result_type {
                Some(ty) => println!("type: {}", ty),
                None => println!("type: none"),
            }
        }

        Commands::Set {
            source,
            roots,
            value,
        } => {
            info!("Running Set subcommand");
            let code = read_source(&source)?;
            let mut scope = build_scope(&engine, &roots)?;

            let json: serde_json::Value =
                serde_json::from_str(&value).context(format!("Invalid JSON value {:?}", value))?;
            let value: Value = bx::json::to_value(&json);

            if let Err(e) = scope.assign(&code, value) {
                fail(&e);
            }

            print_roots(&scope)?;
        }
    }

    Ok(())
}
