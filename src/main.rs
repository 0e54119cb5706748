use anyhow::{bail, Context, Result};
use arboard::Clipboard;
use clap::{Parser, Subcommand, ValueEnum};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

use f2t2f::config;
use f2t2f::encode;
use f2t2f::filter::{ListFile, PathFilter};
use f2t2f::{Document, FormatKind, Node, Outcome};

#[derive(Parser)]
#[command(name = "f2t2f", about = "Convert folder structures to text and back")]
struct Cli {
    /// Path to the configuration file
    #[arg(long, global = true, env = config::CONFIG_ENV)]
    config: Option<PathBuf>,
    /// Log every operation
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    /// Tree preview plus delimited file blocks
    V2,
    /// Legacy recursive JSON
    Json,
}

impl From<Format> for f2t2f::OutputFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::V2 => f2t2f::OutputFormat::Structural,
            Format::Json => f2t2f::OutputFormat::LegacyJson,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Serialize a folder to the clipboard
    Copy {
        #[arg(default_value = ".")]
        folder: PathBuf,
        #[arg(long, value_enum, default_value_t = Format::V2)]
        format: Format,
    },
    /// Create or patch a folder from the clipboard
    Paste {
        #[arg(default_value = ".")]
        destination: PathBuf,
        /// List the operations without touching the filesystem
        #[arg(long)]
        dry_run: bool,
    },
    /// Serialize a folder to a text file (`-` for stdout)
    Save {
        folder: PathBuf,
        output: PathBuf,
        #[arg(long, value_enum, default_value_t = Format::V2)]
        format: Format,
    },
    /// Create or patch a folder from a text file (`-` for stdin)
    Load {
        input: PathBuf,
        #[arg(default_value = ".")]
        destination: PathBuf,
        /// List the operations without touching the filesystem
        #[arg(long)]
        dry_run: bool,
    },
    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Print the configuration file location
    Path,
    /// Write a default configuration file
    Init {
        /// Overwrite an existing configuration file
        #[arg(long)]
        force: bool,
    },
}

fn is_stdio(path: &Path) -> bool {
    path.as_os_str() == "-"
}

fn config_path(cli_path: Option<PathBuf>) -> Result<PathBuf> {
    match cli_path {
        Some(path) => Ok(path),
        None => config::default_config_path(),
    }
}

async fn render_folder(folder: &Path, format: Format, config_file: &Path) -> Result<(Node, String)> {
    let config = config::load_config(config_file);
    let list = ListFile::load(folder)?;
    let filter = PathFilter::new(&config.ignore_patterns, list.as_ref())?;
    let tree = encode::read_tree(folder, filter).await?;
    let text = f2t2f::encode_as(&tree, format.into());
    Ok((tree, text))
}

fn print_save_summary(tree: &Node, output: &str, bytes: usize, start: Instant) {
    let files = tree.descendants().iter().filter(|(_, n)| !n.is_dir()).count();
    println!("  Root: {}", tree.name);
    println!("  Files: {}", files);
    println!("  Output: {} ({} bytes)", output, bytes);
    println!("  Time elapsed: {:.3}s", start.elapsed().as_secs_f64());
}

async fn save(folder: &Path, output: &Path, format: Format, config_file: &Path) -> Result<()> {
    let to_stdout = is_stdio(output);
    if !to_stdout {
        println!("Reading structure from '{}'...", folder.display());
    }

    let start = Instant::now();
    let (tree, text) = render_folder(folder, format, config_file).await?;

    if to_stdout {
        std::io::stdout()
            .write_all(text.as_bytes())
            .context("Failed to write to stdout")?;
        return Ok(());
    }

    std::fs::write(output, &text).with_context(|| format!("Failed to write output file: {}", output.display()))?;
    println!("\nStructure saved successfully!");
    print_save_summary(&tree, &output.display().to_string(), text.len(), start);
    Ok(())
}

async fn copy(folder: &Path, format: Format, config_file: &Path) -> Result<()> {
    println!("Reading structure from '{}'...", folder.display());
    let start = Instant::now();
    let (tree, text) = render_folder(folder, format, config_file).await?;

    let mut clipboard = Clipboard::new().context("Failed to access the clipboard")?;
    clipboard
        .set_text(text.as_str())
        .context("Failed to copy to the clipboard")?;

    println!("\nSuccessfully copied structure of '{}' to clipboard.", tree.name);
    print_save_summary(&tree, "clipboard", text.len(), start);
    Ok(())
}

/// Full-tree documents land in `<destination>/<root_name>` unless the
/// destination already carries that name. Header-less documents (patches
/// pasted from a chat) apply to the destination itself.
fn resolve_target(document: &Document, destination: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(destination)
        .with_context(|| format!("Failed to create destination: {}", destination.display()))?;
    let destination = destination
        .canonicalize()
        .with_context(|| format!("Failed to canonicalize destination: {}", destination.display()))?;

    let Some(root_name) = document.root_name.as_deref().filter(|n| !n.is_empty()) else {
        return Ok(destination);
    };
    if destination.file_name().is_some_and(|n| n == root_name) {
        println!("Destination '{}' matches structure root. Overwriting contents.", root_name);
        return Ok(destination);
    }
    if root_name.contains(['/', '\\']) || root_name == ".." || root_name == "." {
        bail!("Refusing unsafe root name '{}'", root_name);
    }
    let target = destination.join(root_name);
    std::fs::create_dir_all(&target).with_context(|| format!("Failed to create directory: {}", target.display()))?;
    Ok(target)
}

async fn load(input: &Path, destination: &Path, dry_run: bool) -> Result<()> {
    let text = if is_stdio(input) {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf).context("Failed to read stdin")?;
        buf
    } else {
        std::fs::read_to_string(input).with_context(|| format!("Failed to read input file: {}", input.display()))?
    };
    if text.trim().is_empty() {
        bail!("Input '{}' is empty.", input.display());
    }

    println!("Reading structure from '{}'...", input.display());
    apply_text(&text, destination, dry_run).await
}

async fn paste(destination: &Path, dry_run: bool) -> Result<()> {
    let mut clipboard = Clipboard::new().context("Failed to access the clipboard")?;
    let text = match clipboard.get_text() {
        Ok(text) => text,
        Err(arboard::Error::ContentNotAvailable) => String::new(),
        Err(e) => return Err(e).context("Failed to read the clipboard"),
    };
    if text.trim().is_empty() {
        bail!("Clipboard is empty or does not contain text.");
    }

    println!("Reading structure from clipboard...");
    apply_text(&text, destination, dry_run).await
}

async fn apply_text(text: &str, destination: &Path, dry_run: bool) -> Result<()> {
    let decoded = f2t2f::decode(text)?;
    for warning in &decoded.warnings {
        println!("  Warning: {}", warning);
    }

    let document = decoded.document;
    let format = match document.format {
        FormatKind::StructuralV2 => "v2",
        FormatKind::LegacyJsonV1 => "json",
        FormatKind::Unknown => "unknown",
    };
    println!("  Format: {}, {} operation(s)", format, document.operations.len());

    if dry_run {
        for op in &document.operations {
            println!("  {:<14} {}", op.label(), op.path());
        }
        return Ok(());
    }

    let target = resolve_target(&document, destination)?;
    println!("Applying to '{}'...", target.display());

    let start = Instant::now();
    let apply_target = target.clone();
    let report = tokio::task::spawn_blocking(move || f2t2f::apply(&document, &apply_target)).await?;

    println!("\nDone.");
    println!("  Created: {}", report.count(Outcome::Created));
    println!("  Overwritten: {}", report.count(Outcome::Overwritten));
    println!("  Patched: {}", report.count(Outcome::Patched));
    println!("  Unchanged: {}", report.count(Outcome::Unchanged));
    println!("  Skipped (binary): {}", report.count(Outcome::Skipped));
    println!("  Time elapsed: {:.3}s", start.elapsed().as_secs_f64());

    if !report.is_clean() {
        println!("\nFailed operations:");
        for failure in &report.failures {
            println!("  {} {}: {}", failure.label, failure.path, failure.error);
        }
        if report.failures.iter().any(|f| f.error.is_content_mismatch()) {
            println!("  (the file may have changed since the patch was written)");
        }
        bail!("{} operation(s) failed", report.failures.len());
    }
    if !decoded.warnings.is_empty() {
        bail!("{} block(s) could not be read", decoded.warnings.len());
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "f2t2f=debug" } else { "f2t2f=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Copy { folder, format } => {
            let config_file = config_path(cli.config)?;
            copy(&folder, format, &config_file).await?;
        }
        Commands::Paste { destination, dry_run } => paste(&destination, dry_run).await?,
        Commands::Save { folder, output, format } => {
            let config_file = config_path(cli.config)?;
            save(&folder, &output, format, &config_file).await?;
        }
        Commands::Load {
            input,
            destination,
            dry_run,
        } => load(&input, &destination, dry_run).await?,
        Commands::Config { command } => {
            let path = config_path(cli.config)?;
            match command {
                ConfigCommand::Path => {
                    println!("Your configuration file is located at:");
                    println!("{}", path.display());
                }
                ConfigCommand::Init { force } => {
                    if config::save_default_config(&path, force)? {
                        println!("Default configuration file created at:");
                        println!("{}", path.display());
                        println!("You can now edit this file to customize the ignored folders and files.");
                    } else {
                        println!("Configuration file already exists: {}", path.display());
                        println!("To overwrite it, run: f2t2f config init --force");
                    }
                }
            }
        }
    }

    Ok(())
}
