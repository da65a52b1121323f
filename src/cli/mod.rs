//! Command-line front end

pub mod check;
pub mod play;

use crate::player::Output;
use std::io::{self, Write};

/// Clear the terminal
pub fn clear_screen() {
    // ANSI escape codes work on most terminals
    print!("\x1b[2J\x1b[H");

    // Fallback: push old content off screen
    if io::stdout().flush().is_err() {
        for _ in 0..50 {
            println!();
        }
    }
}

/// Write player output to stdout
pub fn render(outputs: Vec<Output>) -> io::Result<()> {
    if outputs.is_empty() {
        return Ok(());
    }
    let mut stdout = io::stdout().lock();
    for output in outputs {
        match output {
            Output::Write(text) => stdout.write_all(text.as_bytes())?,
            Output::Clear => {
                stdout.flush()?;
                clear_screen();
            }
        }
    }
    stdout.flush()
}
