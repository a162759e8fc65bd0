//! tagconf CLI - Command-line interface for tagconf configuration loading
//!
//! Usage:
//!   tagconf expand settings.json
//!   tagconf validate https://config.internal/app.json --schema schema.json
//!   tagconf check settings.json data://{"a":1}

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use colored::Colorize;
use tagconf_core::{
    strip_comments, LoadError, Loader, LoaderOptions, Schema, ValidationFailure,
    DEFAULT_MAX_DEPTH,
};

/// tagconf - JSON configuration with ${SRC:...} and ${ENV:...} expansion
#[derive(Parser, Debug)]
#[command(name = "tagconf")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print a source with every tag expanded
    Expand {
        /// Source descriptor (file path, URL, vault://, data://, or inline JSON)
        source: String,

        /// Maximum tag expansion depth
        #[arg(long, default_value_t = DEFAULT_MAX_DEPTH)]
        max_depth: usize,

        /// Keep comments instead of blanking them
        #[arg(long)]
        keep_comments: bool,

        /// Write to file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate an expanded source against a JSON Schema
    Validate {
        /// Source descriptor
        source: String,

        /// Path to schema file (JSON, or YAML by extension)
        #[arg(short, long)]
        schema: PathBuf,

        /// Output format: text, json
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Only output errors (quiet mode)
        #[arg(short, long)]
        quiet: bool,

        /// Maximum tag expansion depth
        #[arg(long, default_value_t = DEFAULT_MAX_DEPTH)]
        max_depth: usize,
    },

    /// Check that sources expand to valid JSON
    Check {
        /// Source descriptor(s) to check
        #[arg(required = true)]
        sources: Vec<String>,
    },
}

/// Run the CLI with the process arguments
pub fn run() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Commands::Expand {
            source,
            max_depth,
            keep_comments,
            output,
        } => cmd_expand(&source, max_depth, keep_comments, output.as_deref()),

        Commands::Validate {
            source,
            schema,
            format,
            quiet,
            max_depth,
        } => cmd_validate(&source, &schema, &format, quiet, max_depth),

        Commands::Check { sources } => cmd_check(&sources),
    }
}

fn loader(source: &str, max_depth: usize) -> Loader {
    Loader::new(LoaderOptions {
        source: Some(source.to_string()),
        max_depth,
        ..Default::default()
    })
}

fn cmd_expand(source: &str, max_depth: usize, keep_comments: bool, output: Option<&Path>) -> ExitCode {
    let loader = loader(source, max_depth);

    let result = loader.resolve_source().and_then(|s| loader.expand_source(&s));
    let mut content = match result {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{} {}", "✗".red(), LoadError::from(e));
            return ExitCode::from(2);
        }
    };

    if !keep_comments {
        strip_comments(&mut content);
    }

    let written = match output {
        Some(path) => std::fs::write(path, &content).map(|_| {
            eprintln!("{} Wrote to {}", "✓".green(), path.display());
        }),
        None => std::io::stdout().write_all(&content),
    };

    match written {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {}", "Error writing output".red(), e);
            ExitCode::from(2)
        }
    }
}

fn cmd_validate(source: &str, schema_path: &Path, format: &str, quiet: bool, max_depth: usize) -> ExitCode {
    let schema = match Schema::from_file(schema_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{} Failed to load schema {}: {}", "✗".red(), schema_path.display(), e);
            return ExitCode::from(2);
        }
    };

    let mut loader = loader(source, max_depth).with_schema(schema);
    match loader.load_value() {
        Ok(_) => {
            if !quiet {
                if format == "json" {
                    println!("{}", serde_json::json!({ "valid": true }));
                } else {
                    println!("{} {} is valid", "✓".green(), source);
                }
            }
            ExitCode::SUCCESS
        }
        Err(LoadError::Validation(v)) => {
            if format == "json" {
                println!("{:#}", failures_json(&v.failures));
            } else {
                eprintln!("{} Validation failed\n", "✗".red());
                for failure in &v.failures {
                    eprintln!("  {}", failure);
                }
            }
            ExitCode::from(1)
        }
        Err(e) => {
            if format == "json" {
                println!("{:#}", serde_json::json!({ "valid": false, "error": e.to_string() }));
            } else {
                eprintln!("{} {}", "✗".red(), e);
            }
            ExitCode::from(2)
        }
    }
}

fn failures_json(failures: &[ValidationFailure]) -> serde_json::Value {
    let errors: Vec<serde_json::Value> = failures
        .iter()
        .map(|f| serde_json::json!({ "location": f.location, "message": f.message }))
        .collect();
    serde_json::json!({ "valid": false, "errors": errors })
}

fn cmd_check(sources: &[String]) -> ExitCode {
    let mut all_valid = true;

    for source in sources {
        match loader(source, DEFAULT_MAX_DEPTH).load_value() {
            Ok(_) => println!("{} {}: valid JSON", "✓".green(), source),
            Err(e) => {
                eprintln!("{} {}: {}", "✗".red(), source, e);
                all_valid = false;
            }
        }
    }

    if all_valid {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}
