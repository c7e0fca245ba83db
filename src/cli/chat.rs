use std::io::{BufRead, Write};

use crate::chat::Inbound;
use crate::cli::Context;
use crate::error::Result;

/// Line-oriented stand-in for a chat transport: each stdin line is one
/// message from `user_id`, each reply one JSON line on stdout.
pub fn run(data_dir: Option<&str>, user_id: i64, name: &str) -> Result<()> {
    let service = Context::open(data_dir)?.chat()?;
    let stdin = std::io::stdin();
    let mut out = std::io::stdout().lock();
    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let reply = service.handle(&Inbound {
            user_id,
            display_name: name.to_string(),
            text: line,
        });
        serde_json::to_writer(&mut out, &reply)?;
        writeln!(out)?;
        out.flush()?;
    }
    Ok(())
}
