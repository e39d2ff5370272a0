use std::fmt::{self, Display};

use crate::punct::Punct;
use crate::source::Pos;

/// String and character literal encodings, derived from the prefix seen
/// before the opening quote.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Encoding {
    /// no prefix
    None,
    /// `L` prefix
    Wchar,
    /// `u` prefix
    Char16,
    /// `U` prefix
    Char32,
    /// `u8` prefix (string literals only)
    Utf8,
}

impl Encoding {
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::None => "",
            Self::Wchar => "L",
            Self::Char16 => "u",
            Self::Char32 => "U",
            Self::Utf8 => "u8",
        }
    }
}

/// Opaque macro hide-set slot. The tokenizer allocates every token with an
/// empty slot and never looks at it again; the macro expander owns the
/// table the slot indexes into and is the only mutator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HideSet(Option<u32>);

impl HideSet {
    pub fn slot(&self) -> Option<u32> {
        self.0
    }

    pub fn set_slot(&mut self, slot: u32) {
        self.0 = Some(slot);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }
}

/// Preprocessing token kinds, C11 6.4 "Lexical Elements".
///
/// A pp-token is looser than the token the parser eventually sees: a
/// keyword such as `if` is just an identifier here, and a pp-number like
/// `.32e.` is accepted even though it is not a valid constant. The
/// preprocessor converts pp-tokens to regular tokens and rejects the
/// invalid ones.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TokenKind {
    Ident(String),
    Punct(Punct),
    /// raw, undecoded spelling; numeric validation is a later phase
    Num(String),
    /// decoded bytes, with escapes resolved and universal character names
    /// re-encoded as UTF-8
    Str(Vec<u8>, Encoding),
    /// decoded value; unprefixed constants are narrowed to `signed char`
    Char(i32, Encoding),
    /// a run of whitespace or comments; absorbed into the `space` flag of
    /// the following token before tokens reach the consumer
    Space,
    Newline,
    Eof,
    /// a character no pp-token can start with, surfaced as data for the
    /// consumer to reject or recover from
    Invalid(u8),
}

/// One preprocessing token with its position, its sequence index within
/// the originating source, and the two whitespace flags the tokenizer
/// stamps before handing it out. Everything else is immutable once made.
#[derive(Clone, Debug)]
pub struct Token {
    pub kind: TokenKind,
    pub pos: Pos,
    /// index of this token within its source
    pub count: u32,
    /// preceded by whitespace or a comment
    pub space: bool,
    /// first token on its line
    pub bol: bool,
    pub hideset: HideSet,
}

impl Token {
    pub fn is_ident(&self, name: &str) -> bool {
        matches!(&self.kind, TokenKind::Ident(s) if s == name)
    }

    pub fn is_punct(&self, punct: Punct) -> bool {
        matches!(&self.kind, TokenKind::Punct(p) if *p == punct)
    }

    pub fn is_eof(&self) -> bool {
        matches!(self.kind, TokenKind::Eof)
    }

    /// One-line rendering for token dumps: kind, spelling, and flags.
    pub fn describe(&self) -> String {
        let flags = match (self.bol, self.space) {
            (true, true) => " [bol space]",
            (true, false) => " [bol]",
            (false, true) => " [space]",
            (false, false) => "",
        };
        let what = match &self.kind {
            TokenKind::Ident(s) => format!("ident {s}"),
            TokenKind::Punct(p) => format!("punct {p}"),
            TokenKind::Num(s) => format!("number {s}"),
            TokenKind::Str(..) | TokenKind::Char(..) => format!("literal {}", self),
            TokenKind::Space => "space".to_owned(),
            TokenKind::Newline => "newline".to_owned(),
            TokenKind::Eof => "eof".to_owned(),
            TokenKind::Invalid(c) => format!("invalid 0x{c:02x}"),
        };
        format!("{}\t{}{}", self.pos, what, flags)
    }
}

impl Display for Token {
    /// Renders the token as source text: identifiers and numbers verbatim,
    /// literals re-quoted with non-printable bytes escaped.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TokenKind::Ident(s) => write!(f, "{s}"),
            TokenKind::Punct(p) => write!(f, "{p}"),
            TokenKind::Num(s) => write!(f, "{s}"),
            TokenKind::Str(bytes, enc) => {
                write!(f, "{}\"", enc.prefix())?;
                for &b in bytes {
                    quote_byte(f, b)?;
                }
                write!(f, "\"")
            }
            TokenKind::Char(value, enc) => {
                write!(f, "{}'", enc.prefix())?;
                let v = *value;
                if (0x20..=0x7E).contains(&v) && v != 0x27 && v != 0x5C {
                    write!(f, "{}", v as u8 as char)?;
                } else {
                    write!(f, "\\x{:x}", v as u32)?;
                }
                write!(f, "'")
            }
            TokenKind::Space => write!(f, " "),
            TokenKind::Newline => writeln!(f),
            TokenKind::Eof => Ok(()),
            TokenKind::Invalid(c) => quote_byte(f, *c),
        }
    }
}

fn quote_byte(f: &mut fmt::Formatter<'_>, b: u8) -> fmt::Result {
    match b {
        b'"' => write!(f, "\\\""),
        b'\\' => write!(f, "\\\\"),
        b'\n' => write!(f, "\\n"),
        b'\t' => write!(f, "\\t"),
        b'\r' => write!(f, "\\r"),
        0x20..=0x7E => write!(f, "{}", b as char),
        _ => write!(f, "\\x{b:02x}"),
    }
}
