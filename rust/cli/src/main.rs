use std::process::ExitCode;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    mapsync_cli::mapsync_cli(args)
}
