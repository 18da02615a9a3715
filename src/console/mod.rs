//! Serial-style operator console.
//!
//! Every task writes lines through `tracing`; [`ConsoleWriter`] routes them
//! into one bounded [`ConsoleQueue`] so no producer ever blocks on output.
//! A single output task drains the queue with [`drain_into`], printing
//! verbose-only lines while the [`VerboseFlag`] is set.
//!
//! Input bytes go through [`CommandAssembler`].

mod command;
mod queue;
mod writer;

pub use command::{CommandAssembler, ConsoleCommand};
pub use queue::{ConsoleLine, ConsoleQueue, LineLevel, VerboseFlag};
pub use writer::{ConsoleWriter, LineWriter};

use std::io::{self, Write};

/// Write every waiting line to `out`.
///
/// Verbose-only lines are dequeued and discarded unless `verbose` is on.
/// Returns the number of lines written.
pub fn drain_into<W: Write>(queue: &ConsoleQueue, verbose: &VerboseFlag, out: &mut W) -> io::Result<usize> {
    let mut written = 0;
    while let Some(line) = queue.pop() {
        if line.level == LineLevel::Debug && !verbose.is_on() {
            continue;
        }
        writeln!(out, "{}", line.text)?;
        written += 1;
    }
    if written > 0 {
        out.flush()?;
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_filters_debug() {
        let queue = ConsoleQueue::new(8);
        let verbose = VerboseFlag::new(false);
        queue.info("[PAIRING] Paired");
        queue.debug("[HEARTBEAT] Sending heartbeat");

        let mut out = Vec::new();
        assert_eq!(drain_into(&queue, &verbose, &mut out).unwrap(), 1);
        assert_eq!(String::from_utf8(out).unwrap(), "[PAIRING] Paired\n");
        assert!(queue.is_empty());

        verbose.set(true);
        queue.debug("[HEARTBEAT] RTT: 4 ms");
        let mut out = Vec::new();
        assert_eq!(drain_into(&queue, &verbose, &mut out).unwrap(), 1);
        assert_eq!(String::from_utf8(out).unwrap(), "[HEARTBEAT] RTT: 4 ms\n");
    }
}
