use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tplc_compiler::{compile_and_write, Configuration};

#[derive(Parser)]
#[command(name = "tplc")]
#[command(about = "Compile templates into a Go source file")]
struct Cli {
    /// JSON configuration file
    config: PathBuf,

    /// Output file, overriding `out_path`
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Package name, overriding `out_pkg` and package discovery
    #[arg(short, long)]
    pkg: Option<String>,

    /// Log every unit and allocated function
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut logger = env_logger::Builder::from_default_env();
    if cli.verbose {
        logger.filter_level(log::LevelFilter::Debug);
    }
    logger.init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            let mut source = err.source();
            while let Some(cause) = source {
                eprintln!("  caused by: {cause}");
                source = cause.source();
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), tplc_compiler::CompileError> {
    let mut conf = Configuration::load(&cli.config)?;
    if let Some(out) = cli.out {
        conf.out_path = out;
    }
    if let Some(pkg) = cli.pkg {
        conf.out_pkg = Some(pkg);
    }
    let output = compile_and_write(&conf)?;
    println!(
        "{}: {} template(s), package {}",
        conf.out_path.display(),
        output.functions.len(),
        output.package
    );
    Ok(())
}
