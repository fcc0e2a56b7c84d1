use clap::Parser;

use incc::cli::Cli;
use incc::diagnostics;
use incc::pipeline;

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match pipeline::compile_files(&cli.sources) {
        Ok(image) => match std::fs::write(&cli.output, &image) {
            Ok(()) => std::process::exit(0),
            Err(source) => {
                let error = diagnostics::CompileError::Io {
                    path: cli.output.clone(),
                    source,
                };
                let code = diagnostics::report(&error, std::io::stderr());
                std::process::exit(code);
            }
        },
        Err(error) => {
            let code = diagnostics::report(&error, std::io::stderr());
            std::process::exit(code);
        }
    }
}
