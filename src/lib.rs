//! Translation phases 1-3 of a C compiler front end: an input stream
//! manager that canonicalizes raw source bytes into a logical character
//! stream, and a tokenizer that decomposes that stream into preprocessing
//! tokens. Macro expansion and parsing are later phases built on top of
//! the types exported here.

pub mod error;
pub mod lex;
pub mod punct;
pub mod source;

pub use error::KrillError;
pub use lex::{Encoding, HideSet, Lexer, Token, TokenKind};
pub use punct::Punct;
pub use source::{Pos, Source, Stream};
