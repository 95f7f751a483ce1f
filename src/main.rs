use std::env;
use std::error::Error;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use fusionforms::library::PropertyDirectory;
use fusionforms::{
    check_schema, collect_form_files, create_empty_form, encode_for_import, export_file_name,
    load_form_path, schema_file_name, schema_to_html, Config, FormSchema,
};
use tracing_subscriber::{layer::SubscriberExt as _, util::SubscriberInitExt as _};

fn main() {
    init_logging();
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn init_logging() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();
}

fn run() -> Result<(), Box<dyn Error>> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    match args[1].as_str() {
        "--help" | "-h" | "help" => {
            print_usage();
            Ok(())
        }
        "import" => {
            if args.len() < 3 {
                eprintln!("Usage: ffc import <file.html> [--name <name>]");
                eprintln!();
                eprintln!("Convert an HTML form into schema JSON on stdout.");
                std::process::exit(1);
            }
            let options = parse_options(&args[3..], &["--name", "--config"])?;
            run_import(&args[2], &options)
        }
        "export" => {
            if args.len() < 3 {
                eprintln!("Usage: ffc export <schema.json> [--out-dir <dir>]");
                eprintln!();
                eprintln!("Render schema JSON as HTML, to stdout or to <dir>/<Class>_<ACTION>.xml.");
                std::process::exit(1);
            }
            let options = parse_options(&args[3..], &["--out-dir", "--config"])?;
            run_export(&args[2], &options)
        }
        "roundtrip" => {
            if args.len() < 3 {
                eprintln!("Usage: ffc roundtrip <file.html>");
                std::process::exit(1);
            }
            let options = parse_options(&args[3..], &["--name", "--config"])?;
            run_roundtrip(&args[2], &options)
        }
        "new" => {
            let options = parse_options(&args[2..], &["--name"])?;
            let schema = create_empty_form(options.get("--name"));
            print_json(&schema)
        }
        "check" => {
            if args.len() < 3 {
                eprintln!("Usage: ffc check <schema.json> [--config <fusionforms.toml>]");
                std::process::exit(1);
            }
            let options = parse_options(&args[3..], &["--config"])?;
            run_check(&args[2], &options)
        }
        "batch" => {
            if args.len() < 4 {
                eprintln!("Usage: ffc batch <dir> <out-dir>");
                eprintln!();
                eprintln!("Import every .html/.htm/.json form under <dir> and write schema JSON files.");
                std::process::exit(1);
            }
            parse_options(&args[4..], &[])?;
            run_batch(Path::new(&args[2]), Path::new(&args[3]))
        }
        "encode" => {
            if args.len() < 3 {
                eprintln!("Usage: ffc encode <schema.json>");
                std::process::exit(1);
            }
            let schema = load_form_path(Path::new(&args[2]), None)?;
            println!("{}", encode_for_import(&schema)?);
            Ok(())
        }
        other => {
            eprintln!("Error: Unknown command: {other}");
            print_usage();
            std::process::exit(1);
        }
    }
}

fn print_usage() {
    eprintln!("Usage: ffc <command> [options]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  import <file> [--name N]          Convert an HTML form to schema JSON");
    eprintln!("  export <schema> [--out-dir DIR]   Render schema JSON as an HTML document");
    eprintln!("  roundtrip <file>                  Import then export an HTML form");
    eprintln!("  new [--name N]                    Print an empty form schema");
    eprintln!("  check <schema> [--config C]       Check a schema for structural problems");
    eprintln!("  batch <dir> <out-dir>             Import every form file under a directory");
    eprintln!("  encode <schema>                   Print a schema as base64 for import links");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --config <file>   Config file (default: ./fusionforms.toml when present)");
    eprintln!();
    eprintln!("Logging goes to stderr; set RUST_LOG=debug for import decisions.");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  ffc import legacy/invoice.html > invoice.json");
    eprintln!("  ffc export invoice.json --out-dir out/");
    eprintln!("  ffc check invoice.json --config fusionforms.toml");
}

/// `--flag value` pairs after the positional arguments.
struct Options {
    values: Vec<(String, String)>,
}

impl Options {
    fn get(&self, flag: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(key, _)| key == flag)
            .map(|(_, value)| value.as_str())
    }

    fn config(&self) -> Result<Config, Box<dyn Error>> {
        Ok(Config::discover(self.get("--config").map(Path::new))?)
    }
}

fn parse_options(args: &[String], allowed: &[&str]) -> Result<Options, Box<dyn Error>> {
    let mut values = Vec::new();
    let mut i = 0;
    while i < args.len() {
        let flag = args[i].as_str();
        if !allowed.contains(&flag) {
            return Err(format!("Error: Unknown option: {flag}").into());
        }
        match args.get(i + 1) {
            Some(value) => values.push((flag.to_string(), value.clone())),
            None => return Err(format!("Error: {flag} requires a value").into()),
        }
        i += 2;
    }
    Ok(Options { values })
}

fn print_json(schema: &FormSchema) -> Result<(), Box<dyn Error>> {
    let mut stdout = io::stdout();
    serde_json::to_writer_pretty(&mut stdout, schema)?;
    stdout.write_all(b"\n")?;
    Ok(())
}

fn import_file(path: &Path, options: &Options, config: &Config) -> Result<FormSchema, Box<dyn Error>> {
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
    let fallback = options
        .get("--name")
        .unwrap_or_else(|| config.fallback_name(stem));
    Ok(load_form_path(path, Some(fallback).filter(|name| !name.is_empty()))?)
}

fn run_import(filename: &str, options: &Options) -> Result<(), Box<dyn Error>> {
    let config = options.config()?;
    let schema = import_file(Path::new(filename), options, &config)?;
    print_json(&schema)
}

fn run_export(filename: &str, options: &Options) -> Result<(), Box<dyn Error>> {
    let config = options.config()?;
    let schema = load_form_path(Path::new(filename), None)?;
    let html = schema_to_html(&schema);

    match options.get("--out-dir") {
        Some(dir) => {
            let dir = PathBuf::from(dir);
            fs::create_dir_all(&dir)?;
            let path = dir.join(export_file_name(&schema, &config.export.default_action_code));
            fs::write(&path, html)?;
            println!("✓ Wrote {}", path.display());
        }
        None => println!("{html}"),
    }
    Ok(())
}

fn run_roundtrip(filename: &str, options: &Options) -> Result<(), Box<dyn Error>> {
    let config = options.config()?;
    let schema = import_file(Path::new(filename), options, &config)?;
    tracing::info!(
        sections = schema.sections.len(),
        fields = schema.fields().len(),
        "imported {filename}"
    );
    println!("{}", schema_to_html(&schema));
    Ok(())
}

fn run_check(filename: &str, options: &Options) -> Result<(), Box<dyn Error>> {
    let config = options.config()?;
    let schema = load_form_path(Path::new(filename), None)?;

    let mut store = config.library_store();
    let directory = if config.library.properties.is_some() {
        Some(store.properties()?)
    } else {
        None
    };
    let diags = check_schema(&schema, directory.map(|d| d as &dyn PropertyDirectory));

    if diags.is_empty() {
        println!("✓ No issues found");
        return Ok(());
    }

    let mut error_count = 0;
    let mut warning_count = 0;

    for diag in &diags {
        tracing::debug!(%diag, "diagnostic");
        let icon = match diag.severity.as_str() {
            "error" => {
                error_count += 1;
                "✗"
            }
            "warning" => {
                warning_count += 1;
                "⚠"
            }
            _ => "?",
        };
        println!("{icon} [{}] {}", diag.kind, diag.message);
        println!("  at {}\n", diag.location);
    }

    println!("---");
    println!("{error_count} error(s), {warning_count} warning(s)");

    if error_count > 0 {
        Err("diagnostics reported errors".into())
    } else {
        Ok(())
    }
}

fn run_batch(dir: &Path, out_dir: &Path) -> Result<(), Box<dyn Error>> {
    let files = collect_form_files(dir)?;
    fs::create_dir_all(out_dir)?;

    let mut failures = 0;
    for path in &files {
        match load_form_path(path, None) {
            Ok(schema) => {
                let target = out_dir.join(schema_file_name(&schema));
                fs::write(&target, serde_json::to_string_pretty(&schema)?)?;
                println!("✓ {} -> {}", path.display(), target.display());
            }
            Err(err) => {
                failures += 1;
                tracing::warn!(path = %path.display(), "{err}");
                println!("✗ {}: {err}", path.display());
            }
        }
    }

    println!("---");
    println!("{} converted, {failures} failed", files.len() - failures);
    if failures > 0 && failures == files.len() {
        return Err("no form could be converted".into());
    }
    Ok(())
}
