//! pxa - command-line sprite sheet exporter

use std::process::ExitCode;

use pixelaria::cli;

fn main() -> ExitCode {
    cli::run()
}
