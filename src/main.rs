//! Binary entrypoint for the console client.

use std::process::ExitCode;

use colloquy::start_colloquy;

/// Start a conversation with the configured remote agent.
fn main() -> ExitCode {
    start_colloquy::run()
}
