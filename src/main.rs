use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use vault_export::config::{self, ExportConfig};
use vault_export::fs::DiskFs;
use vault_export::log::Severity;
use vault_export::markdown::MarkdownRenderer;
use vault_export::website::Website;
use vault_export::{output, vault};

/// Shared flags for commands that export.
#[derive(clap::Args, Clone)]
struct BuildArgs {
    /// Ignore the export manifest and re-render every document
    #[arg(long)]
    no_incremental: bool,

    /// Remove the output directory before exporting
    #[arg(long)]
    clean: bool,
}

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "vault-export")]
#[command(about = "Export a folder of markdown notes as a static website")]
#[command(long_about = "\
Export a folder of markdown notes as a static website

Every document becomes a standalone HTML page. Internal links are rewritten
to the exported pages, referenced media is copied (or inlined), and files
left over from earlier exports are removed.

Source structure:

  vault/
  ├── export.toml                  # Export config (optional)
  ├── .obsidian/snippets/*.css     # CSS snippets (enable in export.toml)
  ├── Home.md                      # → Home.html
  ├── Board.canvas                 # → Board.html
  ├── attachments/cat.png          # → attachments/cat.png when referenced
  └── notes/
      └── Daily Log.md             # → notes/Daily Log.html

Output structure:

  site/
  ├── Home.html
  ├── notes/Daily Log.html
  └── lib/
      ├── styles/                  # webpage.css, theme.css, snippets.css
      ├── scripts/                 # webpage.js, graph-data.js, search-index.js
      ├── media/                   # attachments from outside the export root
      └── metadata.json            # incremental-export manifest

Run 'vault-export gen-config' to generate a documented export.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Vault directory
    #[arg(long, default_value = ".", global = true)]
    source: PathBuf,

    /// Output directory
    #[arg(long, default_value = "site", global = true)]
    output: PathBuf,

    /// Config file (defaults to export.toml in the vault)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Show info-level log entries and tracing output
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Export the vault to the output directory
    Build(BuildArgs),
    /// Scan the vault and report broken references without exporting
    Check,
    /// Print the precomputed link graph as JSON
    Graph,
    /// Print a stock export.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // --verbose enables INFO level, otherwise use RUST_LOG or default to WARN
    let filter = if cli.verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Build(ref build_args) => {
            let mut export_config = load_config(&cli)?;
            if build_args.no_incremental {
                export_config.incremental = false;
            }
            if build_args.clean && cli.output.exists() {
                println!("==> Cleaning {}", cli.output.display());
                std::fs::remove_dir_all(&cli.output)?;
            }

            println!("==> Scanning {}", cli.source.display());
            let vault = vault::scan_vault(&cli.source, Some(&cli.output))?;

            println!(
                "==> Exporting {} documents → {}",
                vault.documents.len(),
                cli.output.display()
            );
            let threshold = if cli.verbose {
                Severity::Info
            } else {
                export_config.log_level
            };
            let mut website = Website::new(&vault.root, &cli.output, export_config);
            let mut renderer = MarkdownRenderer::new(&vault.root);

            let runtime = tokio::runtime::Runtime::new()?;
            let token = website.cancel_token();
            runtime.spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    token.cancel();
                }
            });
            let outcome = match runtime.block_on(website.build(
                &mut renderer,
                &vault.index,
                &vault.documents,
                &DiskFs,
            )) {
                Ok(outcome) => outcome,
                Err(e) => {
                    if let Some(report) = e.report() {
                        output::print_aborted_build(report, threshold);
                    }
                    return Err(e.into());
                }
            };
            output::print_build_summary(&outcome, threshold);

            if !outcome.is_cancelled() {
                println!("==> Export complete: {}", cli.output.display());
            }
        }
        Command::Check => {
            println!("==> Checking {}", cli.source.display());
            let vault = vault::scan_vault(&cli.source, Some(&cli.output))?;
            output::print_check_output(&vault);
        }
        Command::Graph => {
            let export_config = load_config(&cli)?;
            let vault = vault::scan_vault(&cli.source, Some(&cli.output))?;
            let website = Website::new(&vault.root, &cli.output, export_config);
            let graph = website.graph(&vault.documents, &vault.index);
            println!("{}", graph.to_data().to_json()?);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

fn load_config(cli: &Cli) -> Result<ExportConfig, config::ConfigError> {
    match &cli.config {
        Some(path) => config::load_config_file(path),
        None => config::load_config(Path::new(&cli.source)),
    }
}
