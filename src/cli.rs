// Command-line argument handling.

use std::path::PathBuf;

use clap::Parser;

// A minimal ahead-of-time compiler targeting 32-bit Windows PE executables.
#[derive(Parser, Debug)]
#[command(name = "incc")]
pub struct Cli {
    // Source files, parsed in order into one shared namespace.
    #[arg(required = true)]
    pub sources: Vec<PathBuf>,

    // Output executable path.
    #[arg(short, long, default_value = "output.exe")]
    pub output: PathBuf,

    // Raise the log level to show compilation progress on stderr.
    #[arg(short, long)]
    pub verbose: bool,
}
