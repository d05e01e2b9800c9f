//! Command-line argument surface and resolution
//!
//! Argument values can come from three places: the command line itself, a
//! settings file replacing the command-line values, or interactive stdin
//! prompting for the paths. Resolution validates every path before the
//! workflow starts.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;

/// Extracts the data changes between two SQL dump snapshots as SQL
/// statements, one file per table.
#[derive(Debug, Parser)]
#[command(name = "dump-diff")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Dump file holding the original data state.
    #[arg(long, value_name = "FILE")]
    pub original_file: Option<PathBuf>,

    /// Dump file holding the changed data state.
    #[arg(long, value_name = "FILE")]
    pub changed_file: Option<PathBuf>,

    /// Directory the generated statement files are written to.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Comma-separated table names to process exclusively.
    #[arg(long, value_name = "NAMES")]
    pub include_tables: Option<String>,

    /// Comma-separated table names to leave out.
    #[arg(long, value_name = "NAMES")]
    pub exclude_tables: Option<String>,

    /// Re-read rows from the dump on demand instead of holding them in memory.
    #[arg(long)]
    pub lazy: bool,

    /// Prompt for the dump and output paths on stdin.
    #[arg(long)]
    pub interactive: bool,

    /// Settings file supplying the argument values.
    #[arg(long, value_name = "FILE")]
    pub settings_file: Option<PathBuf>,
}

/// Validated run options handed to the workflow.
#[derive(Debug, Clone)]
pub struct Options {
    pub original_file: PathBuf,
    pub changed_file: PathBuf,
    pub output_dir: PathBuf,
    pub include_tables: Option<Vec<String>>,
    pub exclude_tables: Option<Vec<String>>,
    pub lazy: bool,
}

impl Cli {
    /// Resolves the raw arguments into validated [`Options`].
    pub fn into_options(self) -> Result<Options> {
        let mut cli = self;

        if let Some(path) = cli.settings_file.take() {
            cli.apply_settings(&path)?;
        }

        let original_file = resolve_path(
            cli.original_file,
            cli.interactive,
            "original dump file",
            "--original-file",
            file_exists,
        )?;
        let changed_file = resolve_path(
            cli.changed_file,
            cli.interactive,
            "changed dump file",
            "--changed-file",
            file_exists,
        )?;
        let output_dir = resolve_path(
            cli.output_dir,
            cli.interactive,
            "output directory",
            "--output-dir",
            dir_exists,
        )?;

        Ok(Options {
            original_file,
            changed_file,
            output_dir,
            include_tables: cli.include_tables.as_deref().and_then(parse_name_list),
            exclude_tables: cli.exclude_tables.as_deref().and_then(parse_name_list),
            lazy: cli.lazy,
        })
    }

    /// Replaces the argument values with the ones from the settings file.
    /// The file supplies the whole argument set; it cannot re-enter
    /// interactive mode or chain another settings file.
    fn apply_settings(&mut self, path: &Path) -> Result<()> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.to_path_buf()))
            .build()
            .with_context(|| format!("failed to load settings file {}", path.display()))?;

        self.original_file = settings.get_string("original_file").ok().map(PathBuf::from);
        self.changed_file = settings.get_string("changed_file").ok().map(PathBuf::from);
        self.output_dir = settings.get_string("output_dir").ok().map(PathBuf::from);
        self.include_tables = settings.get_string("include_tables").ok();
        self.exclude_tables = settings.get_string("exclude_tables").ok();
        self.lazy = settings.get_bool("lazy").unwrap_or(false);
        self.interactive = false;

        Ok(())
    }
}

/// Splits a comma-separated name list, trimming and lowercasing each entry
/// for case-insensitive matching.
fn parse_name_list(raw: &str) -> Option<Vec<String>> {
    let names: Vec<String> = raw
        .split(',')
        .map(|name| name.trim().to_lowercase())
        .filter(|name| !name.is_empty())
        .collect();

    if names.is_empty() {
        None
    } else {
        Some(names)
    }
}

fn resolve_path(
    value: Option<PathBuf>,
    interactive: bool,
    label: &str,
    flag: &str,
    validate: fn(&Path) -> bool,
) -> Result<PathBuf> {
    if interactive {
        return prompt_path(label, validate);
    }

    let path = match value {
        Some(path) => path,
        None => bail!("{label} is required ({flag})"),
    };

    if !validate(&path) {
        bail!("{label} does not exist: {}", path.display());
    }

    Ok(path)
}

/// Asks on stdin until the entered path validates.
fn prompt_path(label: &str, validate: fn(&Path) -> bool) -> Result<PathBuf> {
    loop {
        print!("Enter the {label}: ");
        io::stdout().flush().context("failed to flush prompt")?;

        let mut line = String::new();
        let read = io::stdin()
            .read_line(&mut line)
            .context("failed to read input")?;
        if read == 0 {
            bail!("input ended while asking for the {label}");
        }

        let entered = line.trim();
        if !entered.is_empty() && validate(Path::new(entered)) {
            return Ok(PathBuf::from(entered));
        }

        println!("The path does not exist, please try again.");
    }
}

fn file_exists(path: &Path) -> bool {
    path.is_file()
}

fn dir_exists(path: &Path) -> bool {
    path.is_dir()
}
