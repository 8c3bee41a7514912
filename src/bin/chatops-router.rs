use chatops_router::app::{self, Cli};
use chatops_router::shared::logging::init_tracing;
use clap::Parser;

fn run() -> Result<i32, String> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref());
    let output = app::run(cli).map_err(|err| err.to_string())?;
    if let Some(stdout) = output.stdout {
        println!("{stdout}");
    }
    Ok(output.exit_code)
}

fn main() {
    match run() {
        Ok(0) => {}
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    }
}
