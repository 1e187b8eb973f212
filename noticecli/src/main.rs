use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use noticecraft_core::{ProcessConfig, Reconciler};
use std::io::{self, IsTerminal};
use std::path::PathBuf;

mod discover;
mod formatter;
mod logger;
mod prompt;

#[derive(Parser)]
#[command(name = "noticecli")]
#[command(about = "Fill exam notification sheets with room, seat, date and time from exam arrangement tables", long_about = None)]
#[command(version)]
struct Cli {
    /// Folder holding the notification sheet and the arrangement tables
    #[arg(value_name = "DIR")]
    dir: Option<PathBuf>,

    /// Notification sheet (default: the file whose name contains 纸 or 通知单)
    #[arg(short, long, value_name = "FILE")]
    notification: Option<PathBuf>,

    /// Workbooks in DIR that are not arrangement tables
    #[arg(short = 'x', long, num_args = 1.., value_name = "FILE")]
    exclude: Vec<PathBuf>,

    /// Also write the student name and colour the written rows (asked when
    /// running in a terminal)
    #[arg(long)]
    highlight: bool,

    /// Output file (default: 考试通知单-处理后.xlsx next to the notification sheet)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Path to configuration file (TOML); replaces folder discovery
    #[arg(short, long, value_name = "CONFIG", conflicts_with = "dir")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "human")]
    format: OutputFormat,

    /// Log every student and subject row
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Human-readable colored output
    Human,
    /// JSON output for scripting
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logger::init(cli.verbose);

    // Prompts need a terminal and human output
    let interactive = io::stdin().is_terminal() && matches!(cli.format, OutputFormat::Human);
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    let mut config = match &cli.config {
        Some(config_path) => ProcessConfig::from_file(config_path)
            .with_context(|| format!("Failed to load config from {}", config_path.display()))?,
        None => {
            let dir = match &cli.dir {
                Some(dir) => dir.clone(),
                None => prompt::ask_dir(&mut stdin.lock(), &mut stdout)?,
            };
            let files = discover::list_workbooks(&dir)?;
            let found = if interactive && cli.notification.is_none() && cli.exclude.is_empty() {
                prompt::pick_roles(&mut stdin.lock(), &mut stdout, files)
            } else {
                discover::split_roles(files, cli.notification.as_deref(), &cli.exclude)
            }
            .with_context(|| format!("Failed to pick workbooks in {}", dir.display()))?;
            let mut config = ProcessConfig::new(found.notification, found.arrangements);
            if interactive && !cli.highlight {
                config.highlight = prompt::ask_highlight(&mut stdin.lock(), &mut stdout)?;
            }
            config
        }
    };

    if cli.highlight {
        config.highlight = true;
    }
    if let Some(output) = &cli.output {
        config.output = Some(output.clone());
    }
    config.validate().context("Invalid configuration")?;

    if matches!(cli.format, OutputFormat::Human) {
        formatter::print_plan(&config);
    }

    let notification = config.notification.clone();
    let summary = Reconciler::new(config)
        .run()
        .with_context(|| format!("Failed to process {}", notification.display()))?;

    match cli.format {
        OutputFormat::Human => formatter::print_human(&summary),
        OutputFormat::Json => formatter::print_json(&summary)?,
    }

    Ok(())
}
