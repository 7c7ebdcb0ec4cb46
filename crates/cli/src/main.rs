use std::process::ExitCode;

fn main() -> ExitCode {
    tarifario_cli::run()
}
