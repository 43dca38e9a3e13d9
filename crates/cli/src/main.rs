//! Command-line interface for the unarc engine.
//!
//! This CLI lists, extracts and tests archives through the native engine
//! and reports its progress. It never prompts: overwrite and password
//! requests are answered from the flags given, or aborted.

use clap::{Args, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::PathBuf;
use std::process;
use tracing::warn;
use unarc::{
    Command, Event, EventKind, ExitCode, ExtractOptions, ListOptions, OverwritePolicy,
    TestOptions, TextCodec, Unarc,
};

#[derive(Parser)]
#[command(name = "unarc-cli")]
#[command(version, about = "List, extract and test archives with the unarc engine", long_about = None)]
struct Cli {
    /// Path to the engine library
    #[arg(long, global = true, env = "UNARC_LIBRARY", default_value = "unarc.dll")]
    library: PathBuf,

    /// Print engine events as JSON lines
    #[arg(long, global = true)]
    json: bool,

    /// Code page of the engine's strings (e.g. 1251); defaults to the
    /// system ANSI code page
    #[arg(long, global = true, env = "UNARC_CODE_PAGE")]
    code_page: Option<u16>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List archive contents
    List {
        /// Archive file
        archive: PathBuf,

        /// Names or wildcards to list
        files: Vec<String>,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Extract files from an archive
    Extract {
        /// Archive file
        archive: PathBuf,

        /// Names or wildcards to extract
        files: Vec<String>,

        /// Output directory
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Drop stored paths and extract everything into one directory
        #[arg(long)]
        flat: bool,

        /// Base directory inside the archive
        #[arg(long)]
        base_dir: Option<String>,

        /// Overwrite mode: always, never, ask
        #[arg(long, value_enum, default_value = "ask")]
        overwrite: OverwriteArg,

        #[command(flatten)]
        engine: EngineArgs,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Test archive integrity
    Test {
        /// Archive file
        archive: PathBuf,

        #[command(flatten)]
        engine: EngineArgs,

        #[command(flatten)]
        common: CommonArgs,
    },
}

#[derive(Args)]
struct CommonArgs {
    /// Password for encrypted archives
    #[arg(long)]
    password: Option<String>,

    /// Do not append the default archive extension
    #[arg(long)]
    no_arc_ext: bool,
}

#[derive(Args)]
struct EngineArgs {
    /// Directory for temporary files
    #[arg(long)]
    temp: Option<PathBuf>,

    /// Memory limit for decompression (e.g. 256m)
    #[arg(long)]
    memory_limit: Option<String>,

    /// Engine configuration file
    #[arg(long)]
    cfg: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum OverwriteArg {
    Always,
    Never,
    Ask,
}

impl From<OverwriteArg> for OverwritePolicy {
    fn from(arg: OverwriteArg) -> Self {
        match arg {
            OverwriteArg::Always => OverwritePolicy::Always,
            OverwriteArg::Never => OverwritePolicy::Never,
            OverwriteArg::Ask => OverwritePolicy::Ask,
        }
    }
}

#[derive(Serialize)]
struct Summary {
    exit_code: ExitCode,
}

fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(exit_code) => process::exit(exit_code.code()),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let command = build_command(cli.command);
    let mut unarc = Unarc::load(&cli.library)?;
    if let Some(code_page) = cli.code_page {
        let codec = TextCodec::for_code_page(code_page)
            .ok_or_else(|| format!("Unsupported code page: {}", code_page))?;
        unarc.set_codec(codec);
    }

    let progress = if cli.json {
        unarc.subscribe_all(print_json);
        None
    } else {
        Some(attach_console(&mut unarc, &command))
    };

    let result = unarc.execute(&command);

    if let Some(bar) = progress {
        bar.finish_and_clear();
    }
    let exit_code = result?;

    if cli.json {
        println!("{}", serde_json::to_string(&Summary { exit_code })?);
    } else if !exit_code.is_success() {
        eprintln!(
            "Engine finished with {:?} for {}",
            exit_code,
            command.archive().display()
        );
    }

    Ok(exit_code)
}

fn build_command(command: Commands) -> Command {
    match command {
        Commands::List {
            archive,
            files,
            common,
        } => Command::list(
            archive,
            ListOptions {
                password: common.password,
                no_arc_extension: common.no_arc_ext,
                selectors: files,
            },
        ),
        Commands::Extract {
            archive,
            files,
            out,
            flat,
            base_dir,
            overwrite,
            engine,
            common,
        } => {
            let options = ExtractOptions {
                base_dir,
                destination: out,
                temp_path: engine.temp,
                password: common.password,
                memory_limit: engine.memory_limit,
                overwrite: overwrite.into(),
                no_arc_extension: common.no_arc_ext,
                config_path: engine.cfg,
                selectors: files,
            };
            if flat {
                Command::extract(archive, options)
            } else {
                Command::extract_with_paths(archive, options)
            }
        }
        Commands::Test {
            archive,
            engine,
            common,
        } => Command::test(
            archive,
            TestOptions {
                temp_path: engine.temp,
                password: common.password,
                memory_limit: engine.memory_limit,
                no_arc_extension: common.no_arc_ext,
                config_path: engine.cfg,
            },
        ),
    }
}

fn print_json(event: &Event) {
    match serde_json::to_string(event) {
        Ok(line) => println!("{}", line),
        Err(e) => warn!("Could not serialize event: {}", e),
    }
}

/// Human-readable output: a file listing plus a byte progress bar.
fn attach_console(unarc: &mut Unarc, command: &Command) -> ProgressBar {
    let bar = ProgressBar::new(0);
    if let Ok(style) =
        ProgressStyle::with_template("{spinner} [{bar:40}] {bytes}/{total_bytes} {wide_msg}")
    {
        bar.set_style(style.progress_chars("=> "));
    }

    let listing = command.kind() == unarc::CommandKind::List;

    let b = bar.clone();
    unarc.subscribe(EventKind::ArchiveSize, move |event| {
        if let Event::ArchiveSize { bytes } = event {
            b.set_length(*bytes);
        }
    });

    let b = bar.clone();
    unarc.subscribe(EventKind::BytesRead, move |event| {
        if let Event::BytesRead { bytes } = event {
            b.set_position(*bytes);
        }
    });

    let b = bar.clone();
    unarc.subscribe(EventKind::FileInfo, move |event| {
        if let Event::FileInfo { size, name } = event {
            if listing {
                b.println(format!("{:>12}  {}", size, name));
            } else {
                b.set_message(name.clone());
            }
        }
    });

    let b = bar.clone();
    unarc.subscribe(EventKind::ArchiveTotalFiles, move |event| {
        if let Event::ArchiveTotalFiles { count } = event {
            b.println(format!("Files: {}", count));
        }
    });

    let b = bar.clone();
    unarc.subscribe(EventKind::ArchiveUncompressedSize, move |event| {
        if let Event::ArchiveUncompressedSize { bytes } = event {
            b.println(format!("Original size: {} bytes", bytes));
        }
    });

    let b = bar.clone();
    unarc.subscribe(EventKind::ArchiveCompressedSize, move |event| {
        if let Event::ArchiveCompressedSize { bytes } = event {
            b.println(format!("Compressed size: {} bytes", bytes));
        }
    });

    let b = bar.clone();
    unarc.subscribe(EventKind::Error, move |event| {
        if let Event::Error { code, message } = event {
            b.suspend(|| eprintln!("Engine error {:?} ({}): {}", code, code.code(), message));
        }
    });

    bar
}
