use clap::Parser;
use eyre::WrapErr;
use generator::{Config, FileSink, ManifestSink, OUTPUT_FILE, StdoutSink, TemplatePaths};
use std::io;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod env_file;

use env_file::EnvFile;

#[derive(Parser, Debug)]
#[command(name = "fleetgen")]
#[command(about = "Generate a docker compose file for a fleet of VNC Firefox instances", long_about = None)]
struct Cli {
    /// Directory holding the compose templates
    #[arg(long, default_value = ".")]
    dir: PathBuf,

    /// Output file [default: <dir>/docker-compose.yml]
    #[arg(long)]
    output: Option<PathBuf>,

    /// Env file loaded before reading parameters [default: <dir>/.env]
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// Print the manifest to stdout instead of writing a file
    #[arg(long, conflicts_with = "output")]
    stdout: bool,
}

impl Cli {
    fn env_file(&self) -> PathBuf {
        self.env_file
            .clone()
            .unwrap_or_else(|| env_file::default_path(&self.dir))
    }
}

fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let env_file = EnvFile::load(&cli.env_file())?;
    let config =
        Config::from_lookup(|key| env_file.lookup_with(|name| std::env::var(name).ok(), key))
            .wrap_err("error parsing environment")?;
    tracing::debug!(
        instances = config.instances,
        forward_proxy = config.forward_proxy,
        monitoring = config.monitoring,
        "resolved parameters"
    );

    let paths = TemplatePaths::in_dir(&cli.dir);
    let sink: Box<dyn ManifestSink> = if cli.stdout {
        Box::new(StdoutSink)
    } else {
        let output = cli.output.unwrap_or_else(|| cli.dir.join(OUTPUT_FILE));
        Box::new(FileSink::new(output))
    };

    let summary = generator::run(&config, &paths, sink.as_ref())?;

    if cli.stdout {
        eprintln!("{}", summary);
    } else {
        println!("{}", summary);
    }

    Ok(())
}
