use std::process::ExitCode;

fn main() -> ExitCode {
    venta_cli::run()
}
