use std::process::ExitCode;

fn main() -> ExitCode {
    spfoundry_cli::run()
}
