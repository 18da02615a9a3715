//! Bounded console line queue.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crossbeam::queue::ArrayQueue;

use crate::core::CONSOLE_LINE_MAX;

/// Console line class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LineLevel {
    /// Printed only while verbose output is on.
    Debug,
    /// Always printed.
    Info,
}

/// One formatted console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleLine {
    /// Line class.
    pub level: LineLevel,
    /// Text, at most [`CONSOLE_LINE_MAX`] bytes.
    pub text: String,
}

impl ConsoleLine {
    /// Create a line, truncating `text` on a character boundary.
    pub fn new(level: LineLevel, text: impl Into<String>) -> Self {
        let mut text = text.into();
        if text.len() > CONSOLE_LINE_MAX {
            let mut cut = CONSOLE_LINE_MAX;
            while !text.is_char_boundary(cut) {
                cut -= 1;
            }
            text.truncate(cut);
        }
        Self { level, text }
    }
}

/// Drop-on-full queue between every producer and the console output task.
///
/// Producers never block: when the queue is full the new line is lost and
/// counted.
#[derive(Debug, Clone)]
pub struct ConsoleQueue {
    lines: Arc<ArrayQueue<ConsoleLine>>,
    dropped: Arc<AtomicU64>,
}

impl ConsoleQueue {
    /// Create a queue holding up to `capacity` lines.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: Arc::new(ArrayQueue::new(capacity)),
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Enqueue a line. Returns `false` if it was dropped.
    pub fn push(&self, line: ConsoleLine) -> bool {
        if self.lines.push(line).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        true
    }

    /// Enqueue an always-printed line.
    pub fn info(&self, text: impl Into<String>) -> bool {
        self.push(ConsoleLine::new(LineLevel::Info, text))
    }

    /// Enqueue a verbose-only line.
    pub fn debug(&self, text: impl Into<String>) -> bool {
        self.push(ConsoleLine::new(LineLevel::Debug, text))
    }

    /// Dequeue the oldest line.
    pub fn pop(&self) -> Option<ConsoleLine> {
        self.lines.pop()
    }

    /// Lines waiting.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Check if no line is waiting.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Queue capacity.
    pub fn capacity(&self) -> usize {
        self.lines.capacity()
    }

    /// Lines lost to a full queue.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Shared verbose output switch.
#[derive(Debug, Clone, Default)]
pub struct VerboseFlag(Arc<AtomicBool>);

impl VerboseFlag {
    /// Create a flag in the given state.
    pub fn new(on: bool) -> Self {
        Self(Arc::new(AtomicBool::new(on)))
    }

    /// Check if verbose output is on.
    pub fn is_on(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Set the flag.
    pub fn set(&self, on: bool) {
        self.0.store(on, Ordering::Relaxed);
    }

    /// Flip the flag and return the new state.
    pub fn toggle(&self) -> bool {
        !self.0.fetch_xor(true, Ordering::Relaxed)
    }
}
