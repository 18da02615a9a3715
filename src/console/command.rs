//! Console command assembly.
//!
//! Bytes arrive one at a time from the serial line. At the start of a
//! command, `'d'` toggles verbose output and, in permanent pairing mode,
//! `'p'` forces re-pairing. Anything else accumulates until `';'` and is
//! forwarded as a joint command string.

use crate::codec::CommandText;

const COMMAND_CAPACITY: usize = CommandText::MAX_LEN;

/// A complete console command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// Toggle debug output.
    ToggleVerbose,
    /// Drop the current peer and resume pairing broadcasts.
    ForcePair,
    /// Joint command for the robot, bytes as typed.
    Forward(CommandText),
}

/// Builds [`ConsoleCommand`]s from a byte stream.
#[derive(Debug, Clone, Default)]
pub struct CommandAssembler {
    buffer: heapless::Vec<u8, COMMAND_CAPACITY>,
    force_pair_enabled: bool,
}

impl CommandAssembler {
    /// Create an assembler. `force_pair_enabled` turns `'p'` into
    /// [`ConsoleCommand::ForcePair`].
    pub fn new(force_pair_enabled: bool) -> Self {
        Self {
            buffer: heapless::Vec::new(),
            force_pair_enabled,
        }
    }

    /// Feed one byte.
    ///
    /// Line endings are ignored. A command longer than
    /// [`CommandText::MAX_LEN`] bytes is cut there and the remainder starts
    /// the next command.
    pub fn push(&mut self, byte: u8) -> Option<ConsoleCommand> {
        if self.buffer.is_empty() {
            match byte {
                b'd' => return Some(ConsoleCommand::ToggleVerbose),
                b'p' if self.force_pair_enabled => return Some(ConsoleCommand::ForcePair),
                _ => {}
            }
        }
        match byte {
            b'\r' | b'\n' => None,
            b';' => self.take(),
            _ => {
                // A full buffer is taken right away, so there is always room.
                let _ = self.buffer.push(byte);
                if self.buffer.is_full() { self.take() } else { None }
            }
        }
    }

    /// Feed a slice, collecting every completed command.
    pub fn extend(&mut self, bytes: &[u8]) -> Vec<ConsoleCommand> {
        bytes.iter().filter_map(|&b| self.push(b)).collect()
    }

    /// Bytes of the command being assembled.
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }

    /// Discard the command being assembled.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    fn take(&mut self) -> Option<ConsoleCommand> {
        if self.buffer.is_empty() {
            return None;
        }
        let text = CommandText::from_bytes(&self.buffer);
        self.buffer.clear();
        Some(ConsoleCommand::Forward(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_char_commands() {
        let mut asm = CommandAssembler::new(true);
        assert_eq!(asm.extend(b"dp"), vec![
            ConsoleCommand::ToggleVerbose,
            ConsoleCommand::ForcePair
        ]);
    }

    #[test]
    fn test_force_pair_disabled() {
        let mut asm = CommandAssembler::new(false);
        assert_eq!(asm.extend(b"p;"), vec![ConsoleCommand::Forward(CommandText::new("p"))]);
    }

    #[test]
    fn test_forward_until_semicolon() {
        let mut asm = CommandAssembler::new(false);
        let cmds = asm.extend(b"10,20,30,40,50,60,70,80;1,2");
        assert_eq!(cmds, vec![ConsoleCommand::Forward(CommandText::new(
            "10,20,30,40,50,60,70,80"
        ))]);
        assert_eq!(asm.pending(), b"1,2");
    }

    #[test]
    fn test_d_inside_command_is_data() {
        let mut asm = CommandAssembler::new(true);
        let cmds = asm.extend(b"1d,p;");
        assert_eq!(cmds, vec![ConsoleCommand::Forward(CommandText::new("1d,p"))]);
    }

    #[test]
    fn test_long_command_is_cut() {
        let mut asm = CommandAssembler::new(false);
        let long = vec![b'1'; 120];
        let mut cmds = asm.extend(&long);
        cmds.extend(asm.extend(b";"));
        assert_eq!(cmds.len(), 2);
        let ConsoleCommand::Forward(first) = &cmds[0] else {
            panic!("expected forward");
        };
        assert_eq!(first.as_bytes().len(), 99);
        assert_eq!(cmds[1], ConsoleCommand::Forward(CommandText::new(&"1".repeat(21))));
    }

    #[test]
    fn test_empty_and_line_endings() {
        let mut asm = CommandAssembler::new(false);
        assert!(asm.extend(b";;\r\n").is_empty());
        assert_eq!(asm.extend(b"1,\r\n2;"), vec![ConsoleCommand::Forward(CommandText::new("1,2"))]);
    }

    #[test]
    fn test_high_bytes_count_once() {
        let mut asm = CommandAssembler::new(false);
        let cmds = asm.extend(b"1,\xE9;");
        let ConsoleCommand::Forward(text) = &cmds[0] else {
            panic!("expected forward");
        };
        assert_eq!(text.as_bytes(), b"1,\xE9");

        let cmds = asm.extend(&[0xC3; 120]);
        assert_eq!(cmds.len(), 1);
        let ConsoleCommand::Forward(text) = &cmds[0] else {
            panic!("expected forward");
        };
        assert_eq!(text.as_bytes(), &[0xC3; 99][..]);
        assert_eq!(asm.pending().len(), 21);
    }
}
