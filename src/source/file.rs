use std::fs::File;
use std::io::{self, BufReader, Read};
use std::rc::Rc;
use std::time::SystemTime;

use crate::error::KrillError;

/// Maximum characters held back at once: one character of true lookahead
/// plus slack for carriage-return and escape-prefix handling.
const PUSHBACK_MAX: usize = 4;

/// What the previous read produced, for trailing-newline synthesis.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Last {
    /// nothing read yet; an empty input still synthesizes one newline
    Start,
    Byte(u8),
    Eof,
}

enum Backing {
    /// an open handle; `pending` holds a byte read ahead past a `\r`
    Stream {
        reader: Box<dyn Read>,
        pending: Option<u8>,
    },
    /// an immutable text buffer and a cursor into it
    Text { text: Vec<u8>, cursor: usize },
}

/// One open input: a stream of canonical characters read from a file handle
/// or from an in-memory string. Reads at this stage perform the line-ending
/// canonicalization (`\r\n` and bare `\r` both become `\n`) and synthesize a
/// final newline when the input does not end in one, so every logical line
/// the tokenizer sees is newline-terminated.
pub struct Source {
    name: Rc<str>,
    backing: Backing,
    mtime: Option<SystemTime>,
    line: u32,
    column: u32,
    last: Last,
    pushback: [u8; PUSHBACK_MAX],
    npushed: usize,
    ntok: u32,
}

const NAME_STRING: &str = "(string)";

impl Source {
    fn new(name: &str, backing: Backing, mtime: Option<SystemTime>) -> Self {
        Self {
            name: Rc::from(name),
            backing,
            mtime,
            line: 1,
            column: 1,
            last: Last::Start,
            pushback: [0; PUSHBACK_MAX],
            npushed: 0,
            ntok: 0,
        }
    }

    /// Opens `name` for reading, or standard input when `name` is `-`.
    /// Fails if the file cannot be opened or its metadata cannot be read.
    pub fn open(name: &str) -> Result<Self, KrillError> {
        if name == "-" {
            let reader: Box<dyn Read> = Box::new(BufReader::new(io::stdin()));
            return Ok(Self::new(
                name,
                Backing::Stream {
                    reader,
                    pending: None,
                },
                None,
            ));
        }
        let file = File::open(name).map_err(|err| KrillError::Open(name.to_owned(), err))?;
        let mtime = file
            .metadata()
            .and_then(|meta| meta.modified())
            .map_err(|err| KrillError::Open(name.to_owned(), err))?;
        log::debug!("opened {name}");
        Ok(Self::new(
            name,
            Backing::Stream {
                reader: Box::new(BufReader::new(file)),
                pending: None,
            },
            Some(mtime),
        ))
    }

    /// Wraps an in-memory string as a source. No I/O is possible.
    pub fn from_string(text: &str) -> Self {
        Self::new(
            NAME_STRING,
            Backing::Text {
                text: text.as_bytes().to_vec(),
                cursor: 0,
            },
            None,
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn name_rc(&self) -> Rc<str> {
        self.name.clone()
    }

    /// Modification time captured when the source was opened; absent for
    /// string-backed sources and standard input.
    pub fn mtime(&self) -> Option<SystemTime> {
        self.mtime
    }

    /// 1-based line of the next unread character.
    pub fn line(&self) -> u32 {
        self.line
    }

    /// 1-based column of the next unread character.
    pub fn column(&self) -> u32 {
        self.column
    }

    /// Hands out the next per-source token sequence index.
    pub(crate) fn next_index(&mut self) -> u32 {
        let index = self.ntok;
        self.ntok += 1;
        index
    }

    /// Reads the next byte from the backing, collapsing `\r\n` and bare
    /// `\r` to `\n` and synthesizing one final `\n` for inputs that do not
    /// end with one.
    fn read_canonical(&mut self) -> io::Result<Option<u8>> {
        let last = self.last;
        let c = match &mut self.backing {
            Backing::Stream { reader, pending } => {
                let raw = match pending.take() {
                    Some(b) => Some(b),
                    None => read_byte(reader.as_mut())?,
                };
                match raw {
                    None => synthesized(last),
                    Some(b'\r') => {
                        let next = read_byte(reader.as_mut())?;
                        if next != Some(b'\n') {
                            *pending = next;
                        }
                        Some(b'\n')
                    }
                    some => some,
                }
            }
            Backing::Text { text, cursor } => match text.get(*cursor).copied() {
                None => synthesized(last),
                Some(b'\r') => {
                    *cursor += 1;
                    if text.get(*cursor) == Some(&b'\n') {
                        *cursor += 1;
                    }
                    Some(b'\n')
                }
                Some(b) => {
                    *cursor += 1;
                    Some(b)
                }
            },
        };
        self.last = match c {
            Some(b) => Last::Byte(b),
            None => Last::Eof,
        };
        Ok(c)
    }

    /// Produces the next canonical character, preferring the pushback
    /// buffer. Line and column advance exactly once per logical character,
    /// whichever path produced it.
    pub fn getc(&mut self) -> io::Result<Option<u8>> {
        let c = if self.npushed > 0 {
            self.npushed -= 1;
            Some(self.pushback[self.npushed])
        } else {
            self.read_canonical()?
        };
        match c {
            Some(b'\n') => {
                self.line += 1;
                self.column = 1;
            }
            Some(_) => self.column += 1,
            None => {}
        }
        Ok(c)
    }

    /// Puts `c` back and reverses the position bookkeeping. A no-op at end
    /// of input. Overflowing the buffer is a caller bug, not input-driven,
    /// and fails fast.
    pub fn ungetc(&mut self, c: Option<u8>) {
        let Some(c) = c else { return };
        assert!(
            self.npushed < PUSHBACK_MAX,
            "character pushback overflow in {}",
            self.name
        );
        self.pushback[self.npushed] = c;
        self.npushed += 1;
        if c == b'\n' {
            self.column = 1;
            self.line -= 1;
        } else {
            self.column -= 1;
        }
    }
}

fn synthesized(last: Last) -> Option<u8> {
    match last {
        Last::Byte(b'\n') | Last::Eof => None,
        _ => Some(b'\n'),
    }
}

fn read_byte(reader: &mut dyn Read) -> io::Result<Option<u8>> {
    let mut buf = [0u8; 1];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => return Ok(None),
            Ok(_) => return Ok(Some(buf[0])),
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;

    fn drain(src: &mut Source) -> io::Result<Vec<u8>> {
        let mut out = Vec::new();
        while let Some(c) = src.getc()? {
            out.push(c);
        }
        Ok(out)
    }

    #[test]
    fn line_endings_canonicalize() -> io::Result<()> {
        let mut src = Source::from_string("a\r\nb\rc\n");
        assert_eq!(b"a\nb\nc\n".to_vec(), drain(&mut src)?);
        Ok(())
    }

    #[test]
    fn missing_final_newline_is_synthesized_once() -> io::Result<()> {
        let mut src = Source::from_string("abc");
        assert_eq!(b"abc\n".to_vec(), drain(&mut src)?);
        assert_eq!(None, src.getc()?);

        let mut src = Source::from_string("abc\n");
        assert_eq!(b"abc\n".to_vec(), drain(&mut src)?);
        Ok(())
    }

    #[test]
    fn empty_input_yields_one_newline() -> io::Result<()> {
        let mut src = Source::from_string("");
        assert_eq!(Some(b'\n'), src.getc()?);
        assert_eq!(None, src.getc()?);
        Ok(())
    }

    #[test]
    fn final_carriage_return_still_terminates() -> io::Result<()> {
        let mut src = Source::from_string("a\r");
        assert_eq!(b"a\n".to_vec(), drain(&mut src)?);
        Ok(())
    }

    #[test]
    fn positions_advance_per_character() -> io::Result<()> {
        let mut src = Source::from_string("ab\nc");
        assert_eq!((1, 1), (src.line(), src.column()));
        src.getc()?;
        assert_eq!((1, 2), (src.line(), src.column()));
        src.getc()?;
        src.getc()?;
        assert_eq!((2, 1), (src.line(), src.column()));
        src.getc()?;
        assert_eq!((2, 2), (src.line(), src.column()));
        Ok(())
    }

    #[test]
    fn ungetc_then_getc_is_identity() -> io::Result<()> {
        let mut src = Source::from_string("xy");
        let c = src.getc()?;
        assert_eq!(Some(b'x'), c);
        assert_eq!((1, 2), (src.line(), src.column()));
        src.ungetc(c);
        assert_eq!((1, 1), (src.line(), src.column()));
        assert_eq!(Some(b'x'), src.getc()?);
        assert_eq!((1, 2), (src.line(), src.column()));
        Ok(())
    }

    #[test]
    fn ungetc_newline_restores_line() -> io::Result<()> {
        let mut src = Source::from_string("a\nb");
        src.getc()?;
        let nl = src.getc()?;
        assert_eq!(Some(b'\n'), nl);
        assert_eq!((2, 1), (src.line(), src.column()));
        src.ungetc(nl);
        assert_eq!((1, 1), (src.line(), src.column()));
        assert_eq!(Some(b'\n'), src.getc()?);
        Ok(())
    }

    #[test]
    fn ungetc_at_end_of_input_is_a_no_op() -> io::Result<()> {
        let mut src = Source::from_string("");
        src.getc()?;
        let eof = src.getc()?;
        assert_eq!(None, eof);
        src.ungetc(eof);
        assert_eq!(None, src.getc()?);
        Ok(())
    }

    #[test]
    fn stream_and_string_backings_agree() -> io::Result<()> {
        let text = "int main() { return 0; }\r\nint y;\r";
        let mut from_text = Source::from_string(text);
        let mut from_reader = Source::new(
            "t.c",
            Backing::Stream {
                reader: Box::new(text.as_bytes()),
                pending: None,
            },
            None,
        );
        assert_eq!(drain(&mut from_text)?, drain(&mut from_reader)?);
        Ok(())
    }
}
