//! CoC CLI - Bridge interface
//!
//! Commands: templates, render, batch
//! Outputs JSON summaries to stdout
//! Returns non-zero on unknown template

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use coc_engine::{AssetLibrary, BatchPackager, DocumentRenderer, TemplateStore};

#[derive(Parser)]
#[command(name = "coc-cli")]
#[command(about = "CoC Engine - Certificate of Conformity batch generator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the template collection file
    #[arg(short, long, default_value = "templates.json")]
    store: PathBuf,

    /// Directory holding brand logos and the signature image
    #[arg(short, long, default_value = "logos")]
    assets_dir: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// List stored templates
    Templates,

    /// Render a single document
    Render {
        /// Template name
        #[arg(short, long)]
        template: String,

        /// Vehicle identification number
        #[arg(short, long)]
        vin: String,

        /// Effective date, DD.MM.YYYY (defaults to today)
        #[arg(short, long)]
        date: Option<String>,

        /// Output PDF path
        #[arg(short, long, default_value = "out.pdf")]
        out: PathBuf,
    },

    /// Render one document per VIN line and pack them into a ZIP
    Batch {
        /// Template name
        #[arg(short, long)]
        template: String,

        /// Newline-delimited VIN list file
        #[arg(long)]
        vins: PathBuf,

        /// Effective date, DD.MM.YYYY (defaults to today)
        #[arg(short, long)]
        date: Option<String>,

        /// Output archive path
        #[arg(short, long, default_value = "coc_bundle.zip")]
        out: PathBuf,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let store = TemplateStore::new(&cli.store);
    let renderer = DocumentRenderer::new(AssetLibrary::new(&cli.assets_dir));

    match cli.command {
        Commands::Templates => {
            let templates: Vec<_> = store
                .load_all()
                .iter()
                .map(|(name, record)| {
                    serde_json::json!({
                        "name": name,
                        "brand": record.identity.brand(),
                        "rows": record.rows.len(),
                    })
                })
                .collect();

            println!("{}", serde_json::to_string_pretty(&templates).unwrap());
            ExitCode::SUCCESS
        }

        Commands::Render {
            template,
            vin,
            date,
            out,
        } => {
            let all = store.load_all();
            let Some(record) = all.get(&template) else {
                println!(r#"{{"error": "Template not found: {template}"}}"#);
                return ExitCode::from(2);
            };

            match renderer.render(&vin, record, date.as_deref()) {
                Ok(bytes) => {
                    if let Err(e) = fs::write(&out, &bytes) {
                        println!(r#"{{"error": "Failed to write {}: {}"}}"#, out.display(), e);
                        return ExitCode::FAILURE;
                    }
                    let output = serde_json::json!({
                        "vin": vin,
                        "document": out,
                        "bytes": bytes.len(),
                    });
                    println!("{}", serde_json::to_string_pretty(&output).unwrap());
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    println!(r#"{{"error": "{e}"}}"#);
                    ExitCode::FAILURE
                }
            }
        }

        Commands::Batch {
            template,
            vins,
            date,
            out,
        } => {
            let all = store.load_all();
            let Some(record) = all.get(&template) else {
                println!(r#"{{"error": "Template not found: {template}"}}"#);
                return ExitCode::from(2);
            };

            let vin_list = match fs::read_to_string(&vins) {
                Ok(content) => BatchPackager::parse_vin_list(&content),
                Err(e) => {
                    println!(r#"{{"error": "Failed to read {}: {}"}}"#, vins.display(), e);
                    return ExitCode::FAILURE;
                }
            };

            let packager = BatchPackager::new(&renderer);
            match packager.generate(record, &vin_list, date.as_deref()) {
                Ok(bytes) => {
                    if let Err(e) = fs::write(&out, &bytes) {
                        println!(r#"{{"error": "Failed to write {}: {}"}}"#, out.display(), e);
                        return ExitCode::FAILURE;
                    }
                    let output = serde_json::json!({
                        "entries": vin_list.len(),
                        "archive": out,
                        "bytes": bytes.len(),
                    });
                    println!("{}", serde_json::to_string_pretty(&output).unwrap());
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    println!(r#"{{"error": "{e}"}}"#);
                    ExitCode::FAILURE
                }
            }
        }
    }
}
