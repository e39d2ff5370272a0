use std::fmt::{self, Display};
use std::rc::Rc;

pub(crate) mod file;
pub(crate) mod stream;

pub use file::Source;
pub use stream::Stream;

// 1. Physical source file multibyte characters are mapped, in an implementation
// defined manner, to the source character set (introducing new-line characters for
// end-of-line indicators) if necessary.

// 2. Each instance of a backslash character (\) immediately followed by a new-line
// character is deleted, splicing physical source lines to form logical source lines.
// A source file that is not empty shall end in a new-line character, which shall not
// be immediately preceded by a backslash character before any such splicing takes
// place.

/// A point in a source: the source's display name plus the 1-based line and
/// column of the character the point refers to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pos {
    pub name: Rc<str>,
    pub line: u32,
    pub column: u32,
}

impl Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.name, self.line, self.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_display() {
        let pos = Pos {
            name: Rc::from("t.c"),
            line: 3,
            column: 14,
        };
        assert_eq!("t.c:3:14", pos.to_string());
    }
}
