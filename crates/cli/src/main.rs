use std::process::ExitCode;

fn main() -> ExitCode {
    marketer_cli::run()
}
