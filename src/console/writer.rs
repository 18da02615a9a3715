//! `tracing` sink feeding the console queue.

use std::io;

use tracing::{Level, Metadata};
use tracing_subscriber::fmt::MakeWriter;

use super::queue::{ConsoleLine, ConsoleQueue, LineLevel};

/// [`MakeWriter`] that turns every formatted event into a [`ConsoleLine`].
///
/// `DEBUG` and `TRACE` events become verbose-only lines; everything else is
/// always printed. Writing never blocks: a full queue drops the line.
///
/// ```no_run
/// use q8link::console::{ConsoleQueue, ConsoleWriter};
///
/// let queue = ConsoleQueue::new(20);
/// tracing_subscriber::fmt()
///     .with_writer(ConsoleWriter::new(queue.clone()))
///     .with_ansi(false)
///     .without_time()
///     .init();
/// ```
#[derive(Debug, Clone)]
pub struct ConsoleWriter {
    queue: ConsoleQueue,
}

impl ConsoleWriter {
    /// Create a writer feeding `queue`.
    pub fn new(queue: ConsoleQueue) -> Self {
        Self { queue }
    }
}

impl<'a> MakeWriter<'a> for ConsoleWriter {
    type Writer = LineWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LineWriter::new(self.queue.clone(), LineLevel::Info)
    }

    fn make_writer_for(&'a self, meta: &Metadata<'_>) -> Self::Writer {
        let level = if *meta.level() >= Level::DEBUG {
            LineLevel::Debug
        } else {
            LineLevel::Info
        };
        LineWriter::new(self.queue.clone(), level)
    }
}

/// Buffers one event and enqueues it on drop.
#[derive(Debug)]
pub struct LineWriter {
    queue: ConsoleQueue,
    level: LineLevel,
    buf: Vec<u8>,
}

impl LineWriter {
    fn new(queue: ConsoleQueue, level: LineLevel) -> Self {
        Self {
            queue,
            level,
            buf: Vec::new(),
        }
    }
}

impl io::Write for LineWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for LineWriter {
    fn drop(&mut self) {
        let text = String::from_utf8_lossy(&self.buf);
        let text = text.trim_end_matches(['\r', '\n']);
        if !text.is_empty() {
            self.queue.push(ConsoleLine::new(self.level, text));
        }
    }
}
