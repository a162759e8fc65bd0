use std::process::ExitCode;

fn main() -> ExitCode {
    tagconf_cli::run()
}
