//! docschema CLI
//!
//! Command-line interface for resolving, linting, and validating against
//! documented type declarations.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use docschema::{
    lint, load_declarations, load_json, validate, Context, LintStatus, MappedType, ResolveOptions,
    Resolver, Severity, SymbolTable, ValidateError, DEFAULT_STRUCT_TAG,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "docschema")]
#[command(about = "Resolve documented type declarations into schemas")]
#[command(version)]
struct Cli {
    /// Debug logging (overridden by DOCSCHEMA_LOG)
    #[arg(long, short, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log errors and print failing results
    #[arg(long, short, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ConfigArgs {
    /// Struct tag used to name body fields
    #[arg(long, default_value = DEFAULT_STRUCT_TAG)]
    tag: String,

    /// Map a qualified type straight to a schema type (repeatable)
    #[arg(long = "map-type", value_name = "NAME=TYPE[:FORMAT]")]
    map_types: Vec<String>,

    /// Base directory that declaration file paths are relative to
    #[arg(long, default_value = ".")]
    source_root: PathBuf,
}

impl ConfigArgs {
    fn options(&self) -> Result<ResolveOptions, String> {
        let mut options = ResolveOptions::new()
            .struct_tag(self.tag.as_str())
            .source_root(self.source_root.as_path());

        for entry in &self.map_types {
            let (name, mapped) = entry
                .split_once('=')
                .ok_or_else(|| format!("invalid --map-type {entry:?}: expected NAME=TYPE[:FORMAT]"))?;
            let mapped: MappedType = mapped
                .parse()
                .map_err(|e| format!("invalid --map-type {entry:?}: {e}"))?;
            options = options.map_type(name.trim(), mapped);
        }
        Ok(options)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve named types and print the resulting references
    Resolve {
        /// Declaration document (JSON)
        decls: PathBuf,

        /// Type to resolve, as <package>.<Name> (repeatable)
        #[arg(long = "type", short = 't', required = true)]
        types: Vec<String>,

        /// Where the types are used: body, query, path, or form
        #[arg(long, default_value = "body")]
        context: Context,

        /// Print only the documented definitions (no embeds, parameters, or omitdoc fields)
        #[arg(long)]
        definitions: bool,

        /// Output file (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,

        #[command(flatten)]
        config: ConfigArgs,
    },

    /// Validate a JSON payload against a declared type
    Validate {
        /// Payload file to validate
        payload: PathBuf,

        /// Declaration document (JSON)
        #[arg(long)]
        decls: PathBuf,

        /// Type to validate against, as <package>.<Name>
        #[arg(long = "type", short = 't')]
        ty: String,

        /// Where the type is used: body, query, path, or form
        #[arg(long, default_value = "body")]
        context: Context,

        /// Output results as JSON (for automation)
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        config: ConfigArgs,
    },

    /// Lint a declaration document (directives, unresolved types, missing docs)
    Lint {
        /// Declaration document (JSON)
        decls: PathBuf,

        /// Output format: text (default) or json
        #[arg(long, default_value = "text")]
        format: String,

        /// Treat warnings as errors
        #[arg(long)]
        strict: bool,

        #[command(flatten)]
        config: ConfigArgs,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.quiet, cli.verbose);

    let result = match cli.command {
        Commands::Resolve {
            decls,
            types,
            context,
            definitions,
            output,
            pretty,
            config,
        } => run_resolve(ResolveArgs {
            decls,
            types,
            context,
            definitions,
            output,
            pretty,
            config,
        }),

        Commands::Validate {
            payload,
            decls,
            ty,
            context,
            json,
            config,
        } => run_validate(&payload, &decls, &ty, context, json, &config),

        Commands::Lint {
            decls,
            format,
            strict,
            config,
        } => run_lint(&decls, &format, strict, cli.quiet, &config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

fn init_tracing(quiet: bool, verbose: bool) {
    let level = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "warn"
    };

    let filter = EnvFilter::try_from_env("DOCSCHEMA_LOG").unwrap_or_else(|_| EnvFilter::new(level));

    // Only fails if a subscriber is already installed.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

struct ResolveArgs {
    decls: PathBuf,
    types: Vec<String>,
    context: Context,
    definitions: bool,
    output: Option<PathBuf>,
    pretty: bool,
    config: ConfigArgs,
}

fn run_resolve(args: ResolveArgs) -> Result<(), u8> {
    let options = args.config.options().map_err(|e| {
        eprintln!("Error: {}", e);
        2u8
    })?;

    let decls = load_declarations(&args.decls).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;

    let symbols = SymbolTable::new(&decls);
    let mut resolver = Resolver::new(&symbols, &options);
    for ty in &args.types {
        resolver.request(ty, args.context).map_err(|e| {
            eprintln!("Error: {}", e);
            e.exit_code() as u8
        })?;
    }
    let registry = resolver.finish().map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;

    let value = if args.definitions {
        serde_json::to_value(registry.definitions())
    } else {
        serde_json::to_value(&registry)
    };
    let json_output = value
        .and_then(|v| {
            if args.pretty {
                serde_json::to_string_pretty(&v)
            } else {
                serde_json::to_string(&v)
            }
        })
        .map_err(|e| {
            eprintln!("Error serializing output: {}", e);
            2u8
        })?;

    match args.output {
        Some(path) => {
            std::fs::write(&path, &json_output).map_err(|e| {
                eprintln!("Error writing to {}: {}", path.display(), e);
                3u8
            })?;
        }
        None => {
            println!("{}", json_output);
        }
    }

    Ok(())
}

fn run_validate(
    payload_path: &Path,
    decls_path: &Path,
    ty: &str,
    context: Context,
    json_output: bool,
    config: &ConfigArgs,
) -> Result<(), u8> {
    let options = config.options().map_err(|e| {
        report_error(json_output, &e);
        2u8
    })?;

    let payload = load_json(payload_path).map_err(|e| {
        report_error(json_output, &format!("loading payload: {}", e));
        e.exit_code() as u8
    })?;

    let decls = load_declarations(decls_path).map_err(|e| {
        report_error(json_output, &format!("loading declarations: {}", e));
        e.exit_code() as u8
    })?;

    match validate(&decls, ty, context, &payload, &options) {
        Ok(()) => {
            if json_output {
                println!(r#"{{"valid":true}}"#);
            } else {
                println!("Valid");
            }
            Ok(())
        }
        Err(ValidateError::Invalid { errors }) => {
            if json_output {
                let output = serde_json::json!({
                    "valid": false,
                    "errors": errors
                });
                println!("{}", output);
            } else {
                eprintln!("Validation failed:");
                for error in errors {
                    eprintln!("  {}", error);
                }
            }
            Err(1)
        }
        Err(e) => {
            report_error(json_output, &e.to_string());
            Err(e.exit_code() as u8)
        }
    }
}

/// Output an error message in plain text or JSON format.
fn report_error(json_output: bool, msg: &str) {
    if json_output {
        println!("{}", serde_json::json!({ "valid": false, "error": msg }));
    } else {
        eprintln!("Error: {}", msg);
    }
}

fn run_lint(
    path: &Path,
    format: &str,
    strict: bool,
    quiet: bool,
    config: &ConfigArgs,
) -> Result<(), u8> {
    if !path.exists() {
        eprintln!("Error: path not found: {}", path.display());
        return Err(3);
    }

    let options = config.options().map_err(|e| {
        eprintln!("Error: {}", e);
        2u8
    })?;

    let result = lint(path, &options, strict);

    if format == "json" {
        let json_output = serde_json::to_string_pretty(&result).map_err(|e| {
            eprintln!("Error serializing output: {}", e);
            2u8
        })?;
        println!("{}", json_output);
    } else {
        if !quiet {
            println!("Linting {} ...\n", path.display());
        }

        for type_result in &result.results {
            let status_icon = match type_result.status {
                LintStatus::Ok => "\x1b[32m✓\x1b[0m",
                LintStatus::Warning => "\x1b[33m⚠\x1b[0m",
                LintStatus::Error => "\x1b[31m✗\x1b[0m",
            };

            if !quiet || type_result.status != LintStatus::Ok {
                println!(
                    "  {} {} ({})",
                    status_icon,
                    type_result.key,
                    type_result.file.display()
                );
            }

            for diag in &type_result.diagnostics {
                let (color, label) = match diag.severity {
                    Severity::Error => ("\x1b[31m", "error"),
                    Severity::Warning => ("\x1b[33m", "warning"),
                };
                if !quiet || diag.severity == Severity::Error {
                    println!(
                        "    {}{}[{}]\x1b[0m: {} - {}",
                        color, label, diag.code, diag.path, diag.message
                    );
                }
            }
        }

        println!();
        if result.is_ok() && (!strict || result.warnings == 0) {
            println!(
                "\x1b[32m✓ {} types checked, all passed\x1b[0m",
                result.types_checked
            );
        } else {
            println!(
                "\x1b[31m✗ {} types checked: {} passed, {} failed ({} errors, {} warnings)\x1b[0m",
                result.types_checked, result.passed, result.failed, result.errors, result.warnings
            );
        }
    }

    if result.is_ok() && (!strict || result.warnings == 0) {
        Ok(())
    } else {
        Err(1)
    }
}
