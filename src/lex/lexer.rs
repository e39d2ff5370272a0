use crate::error::KrillError;
use crate::lex::escape::{is_valid_ucn, write_utf8};
use crate::lex::token::{Encoding, HideSet, Token, TokenKind};
use crate::punct::Punct;
use crate::source::{Pos, Source, Stream};

/// The tokenizer: translation phase 3. Decomposes the canonical character
/// stream into preprocessing tokens.
///
/// Each comment is treated as if it were a space character. Runs of spaces
/// and comments are removed, and their presence is recorded on the token
/// that follows them as the `space` flag. Newlines become newline tokens —
/// the preprocessor is line-oriented and needs them.
///
/// Besides the character stream, tokens can come from a stack of pending
/// token buffers: pushed-back tokens and wholesale token-stream
/// substitution both live there, and the top buffer always wins over
/// fresh input.
pub struct Lexer {
    stream: Stream,
    buffers: Vec<Vec<Token>>,
    pos: Pos,
}

impl Lexer {
    /// Opens `filename` (or `-` for standard input) as the initial source.
    pub fn new(filename: &str) -> Result<Self, KrillError> {
        Ok(Self::from_source(Source::open(filename)?))
    }

    pub fn from_source(src: Source) -> Self {
        let mut stream = Stream::new();
        stream.push(src);
        let pos = stream.pos(0);
        Self {
            stream,
            buffers: vec![Vec::new()],
            pos,
        }
    }

    /// The underlying stream, for pushing `#include`d sources.
    pub fn stream_mut(&mut self) -> &mut Stream {
        &mut self.stream
    }

    fn mark(&mut self) {
        self.pos = self.stream.pos(0);
    }

    /// Column of the next unread character, for line-start detection.
    pub(crate) fn stream_column(&self) -> u32 {
        self.stream.column()
    }

    pub(crate) fn make_token(&mut self, kind: TokenKind) -> Token {
        Token {
            kind,
            pos: self.pos.clone(),
            count: self.stream.next_index(),
            space: false,
            bol: false,
            hideset: HideSet::default(),
        }
    }

    fn punct(&mut self, p: Punct) -> Token {
        self.make_token(TokenKind::Punct(p))
    }

    pub(crate) fn readc(&mut self) -> Result<Option<u8>, KrillError> {
        self.stream.readc()
    }

    fn peek(&mut self) -> Result<Option<u8>, KrillError> {
        let c = self.stream.readc()?;
        self.stream.ungetc(c);
        Ok(c)
    }

    /// Consumes the next character if it is `expect`.
    fn next_is(&mut self, expect: u8) -> Result<bool, KrillError> {
        let c = self.stream.readc()?;
        if c == Some(expect) {
            return Ok(true);
        }
        self.stream.ungetc(c);
        Ok(false)
    }

    fn is_hspace(c: u8) -> bool {
        // space, tab, form feed, vertical tab; newline is a token of its own
        matches!(c, b' ' | b'\t' | b'\x0C' | b'\x0B')
    }

    fn do_skip_space(&mut self) -> Result<bool, KrillError> {
        let Some(c) = self.readc()? else {
            return Ok(false);
        };
        if Self::is_hspace(c) {
            return Ok(true);
        }
        if c == b'/' {
            if self.next_is(b'*')? {
                self.skip_block_comment()?;
                return Ok(true);
            }
            if self.next_is(b'/')? {
                self.skip_line()?;
                return Ok(true);
            }
        }
        self.stream.ungetc(Some(c));
        Ok(false)
    }

    /// Skips spaces and comments; true if at least one was skipped.
    pub(crate) fn skip_space(&mut self) -> Result<bool, KrillError> {
        if !self.do_skip_space()? {
            return Ok(false);
        }
        while self.do_skip_space()? {}
        Ok(true)
    }

    /// Discards the rest of the line, leaving the newline unread.
    pub(crate) fn skip_line(&mut self) -> Result<(), KrillError> {
        loop {
            let c = self.readc()?;
            match c {
                None => return Ok(()),
                Some(b'\n') => {
                    self.stream.ungetc(c);
                    return Ok(());
                }
                _ => {}
            }
        }
    }

    fn skip_block_comment(&mut self) -> Result<(), KrillError> {
        let pos = self.stream.pos(-2);
        let mut maybe_end = false;
        loop {
            let Some(c) = self.readc()? else {
                return Err(KrillError::UnterminatedComment(pos));
            };
            if c == b'/' && maybe_end {
                return Ok(());
            }
            maybe_end = c == b'*';
        }
    }

    /// Reads a pp-number (C11 6.4.8). Deliberately loose: digits, letters,
    /// periods, and an exponent sign directly after `e`/`E`/`p`/`P` are all
    /// accepted; distinguishing and validating int/float forms is a later
    /// phase's job.
    fn read_number(&mut self, first: u8) -> Result<Token, KrillError> {
        let mut text = String::new();
        text.push(first as char);
        let mut last = first;
        loop {
            let c = self.readc()?;
            let Some(ch) = c else { break };
            let exp_sign =
                matches!(last, b'e' | b'E' | b'p' | b'P') && matches!(ch, b'+' | b'-');
            if !ch.is_ascii_alphanumeric() && ch != b'.' && !exp_sign {
                self.stream.ungetc(Some(ch));
                break;
            }
            text.push(ch as char);
            last = ch;
        }
        Ok(self.make_token(TokenKind::Num(text)))
    }

    fn read_octal_char(&mut self, first: u8) -> Result<u32, KrillError> {
        let mut r = (first - b'0') as u32;
        for _ in 0..2 {
            match self.peek()? {
                Some(c @ b'0'..=b'7') => {
                    self.readc()?;
                    r = (r << 3) | (c - b'0') as u32;
                }
                _ => break,
            }
        }
        Ok(r)
    }

    fn read_hex_char(&mut self) -> Result<u32, KrillError> {
        let pos = self.stream.pos(-2);
        let c = self.readc()?;
        let first = match c {
            Some(c) if c.is_ascii_hexdigit() => c,
            other => return Err(KrillError::HexEscape(pos, other)),
        };
        let mut r = hex_val(first);
        loop {
            match self.peek()? {
                Some(c) if c.is_ascii_hexdigit() => {
                    self.readc()?;
                    r = (r << 4) | hex_val(c);
                }
                _ => return Ok(r),
            }
        }
    }

    /// Reads a `\u` or `\U` escape; `len` is 4 or 8 hex digits.
    fn read_universal_char(&mut self, len: usize) -> Result<u32, KrillError> {
        let pos = self.stream.pos(-2);
        let mut r: u32 = 0;
        for _ in 0..len {
            match self.readc()? {
                Some(c) if c.is_ascii_hexdigit() => r = (r << 4) | hex_val(c),
                Some(c) => {
                    return Err(KrillError::InvalidUcn(pos, (c as char).to_string()))
                }
                None => {
                    return Err(KrillError::InvalidUcn(pos, "end of input".to_owned()))
                }
            }
        }
        if !is_valid_ucn(r) {
            let spelling = if len == 4 {
                format!("\\u{r:04x}")
            } else {
                format!("\\U{r:08x}")
            };
            return Err(KrillError::InvalidUcn(pos, spelling));
        }
        Ok(r)
    }

    /// Decodes the escape following a consumed backslash and returns its
    /// value. An unrecognized letter is its own value, with a warning.
    fn read_escaped_char(&mut self) -> Result<u32, KrillError> {
        let pos = self.stream.pos(-1);
        let Some(c) = self.readc()? else {
            // a dangling backslash; the caller runs into the unterminated
            // literal right after
            log::warn!("{pos}: unknown escape character: \\<end of input>");
            return Ok(0);
        };
        match c {
            b'\'' | b'"' | b'?' | b'\\' => Ok(c as u32),
            b'a' => Ok(0x07),
            b'b' => Ok(0x08),
            b'f' => Ok(0x0C),
            b'n' => Ok(0x0A),
            b'r' => Ok(0x0D),
            b't' => Ok(0x09),
            b'v' => Ok(0x0B),
            // '\e' is a GNU extension
            b'e' => Ok(0x1B),
            b'x' => self.read_hex_char(),
            b'u' => self.read_universal_char(4),
            b'U' => self.read_universal_char(8),
            b'0'..=b'7' => self.read_octal_char(c),
            _ => {
                log::warn!("{pos}: unknown escape character: \\{}", c as char);
                Ok(c as u32)
            }
        }
    }

    fn read_char_lit(&mut self, enc: Encoding) -> Result<Token, KrillError> {
        let c = self.readc()?;
        let r = match c {
            Some(b'\\') => self.read_escaped_char()?,
            Some(c) => c as u32,
            None => return Err(KrillError::UnterminatedChar(self.pos.clone())),
        };
        if self.readc()? != Some(b'\'') {
            return Err(KrillError::UnterminatedChar(self.pos.clone()));
        }
        // an unprefixed constant has type int but the value of a char
        let value = match enc {
            Encoding::None => (r as u8) as i8 as i32,
            _ => r as i32,
        };
        Ok(self.make_token(TokenKind::Char(value, enc)))
    }

    fn read_string_lit(&mut self, enc: Encoding) -> Result<Token, KrillError> {
        let mut buf: Vec<u8> = Vec::new();
        loop {
            let Some(c) = self.readc()? else {
                return Err(KrillError::UnterminatedString(self.pos.clone()));
            };
            if c == b'"' {
                break;
            }
            if c != b'\\' {
                buf.push(c);
                continue;
            }
            // universal character names become UTF-8 in the decoded bytes;
            // \x and octal escapes are stored as single bytes
            let is_ucn = matches!(self.peek()?, Some(b'u') | Some(b'U'));
            let value = self.read_escaped_char()?;
            if is_ucn {
                write_utf8(&mut buf, &self.pos, value)?;
            } else {
                buf.push(value as u8);
            }
        }
        Ok(self.make_token(TokenKind::Str(buf, enc)))
    }

    /// Reads an identifier. Universal character names are allowed inside
    /// (C11 6.4.2.1) and land in the text as UTF-8, as do raw bytes above
    /// 0x7F from the source.
    fn read_ident(&mut self, first: u8) -> Result<Token, KrillError> {
        let mut buf: Vec<u8> = vec![first];
        loop {
            let c = self.readc()?;
            if let Some(ch) = c {
                if ch.is_ascii_alphanumeric() || ch >= 0x80 || ch == b'_' || ch == b'$' {
                    buf.push(ch);
                    continue;
                }
                if ch == b'\\' && matches!(self.peek()?, Some(b'u') | Some(b'U')) {
                    let value = self.read_escaped_char()?;
                    write_utf8(&mut buf, &self.pos, value)?;
                    continue;
                }
            }
            self.stream.ungetc(c);
            let text = String::from_utf8_lossy(&buf).into_owned();
            return Ok(self.make_token(TokenKind::Ident(text)));
        }
    }

    fn read_rep(&mut self, expect: u8, then: Punct, els: Punct) -> Result<Token, KrillError> {
        let p = if self.next_is(expect)? { then } else { els };
        Ok(self.punct(p))
    }

    fn read_rep2(
        &mut self,
        expect1: u8,
        then1: Punct,
        expect2: u8,
        then2: Punct,
        els: Punct,
    ) -> Result<Token, KrillError> {
        if self.next_is(expect1)? {
            return Ok(self.punct(then1));
        }
        self.read_rep(expect2, then2, els)
    }

    /// Digraphs starting with `%` (C11 6.4.6p3): `%>` is `}`, `%:` is `#`,
    /// and `%:%:` is `##`. Alternate spellings map straight to the
    /// punctuator they alias.
    fn read_percent_digraph(&mut self) -> Result<Option<Token>, KrillError> {
        if self.next_is(b'>')? {
            return Ok(Some(self.punct(Punct::RBrace)));
        }
        if self.next_is(b':')? {
            if self.next_is(b'%')? {
                if self.next_is(b':')? {
                    return Ok(Some(self.punct(Punct::HashHash)));
                }
                self.stream.ungetc(Some(b'%'));
            }
            return Ok(Some(self.punct(Punct::Hash)));
        }
        Ok(None)
    }

    /// Reads one raw token: whitespace/comment runs come back as a single
    /// space token, and every punctuator is matched maximal-munch — the
    /// longest spelling that fits wins.
    pub(crate) fn do_read_token(&mut self) -> Result<Token, KrillError> {
        self.mark();
        if self.skip_space()? {
            return Ok(self.make_token(TokenKind::Space));
        }
        self.mark();
        let Some(c) = self.readc()? else {
            return Ok(self.make_token(TokenKind::Eof));
        };
        match c {
            b'\n' => Ok(self.make_token(TokenKind::Newline)),
            b':' => {
                let p = if self.next_is(b'>')? {
                    Punct::RBracket
                } else {
                    Punct::Colon
                };
                Ok(self.punct(p))
            }
            b'#' => {
                let p = if self.next_is(b'#')? {
                    Punct::HashHash
                } else {
                    Punct::Hash
                };
                Ok(self.punct(p))
            }
            b'+' => self.read_rep2(b'+', Punct::Inc, b'=', Punct::AddAssign, Punct::Plus),
            b'*' => self.read_rep(b'=', Punct::MulAssign, Punct::Star),
            b'=' => self.read_rep(b'=', Punct::EqEq, Punct::Assign),
            b'!' => self.read_rep(b'=', Punct::Ne, Punct::Bang),
            b'&' => self.read_rep2(b'&', Punct::AndAnd, b'=', Punct::AndAssign, Punct::Amp),
            b'|' => self.read_rep2(b'|', Punct::OrOr, b'=', Punct::OrAssign, Punct::Pipe),
            b'^' => self.read_rep(b'=', Punct::XorAssign, Punct::Caret),
            b'"' => self.read_string_lit(Encoding::None),
            b'\'' => self.read_char_lit(Encoding::None),
            b'/' => self.read_rep(b'=', Punct::DivAssign, Punct::Slash),
            b'0'..=b'9' => self.read_number(c),
            b'L' | b'U' => {
                let enc = if c == b'L' {
                    Encoding::Wchar
                } else {
                    Encoding::Char32
                };
                if self.next_is(b'"')? {
                    return self.read_string_lit(enc);
                }
                if self.next_is(b'\'')? {
                    return self.read_char_lit(enc);
                }
                self.read_ident(c)
            }
            b'u' => {
                if self.next_is(b'"')? {
                    return self.read_string_lit(Encoding::Char16);
                }
                if self.next_is(b'\'')? {
                    return self.read_char_lit(Encoding::Char16);
                }
                // C11 6.4.5: u8 prefixes a UTF-8 string literal
                if self.next_is(b'8')? {
                    if self.next_is(b'"')? {
                        return self.read_string_lit(Encoding::Utf8);
                    }
                    self.stream.ungetc(Some(b'8'));
                }
                self.read_ident(c)
            }
            b'.' => {
                if matches!(self.peek()?, Some(d) if d.is_ascii_digit()) {
                    return self.read_number(c);
                }
                if self.next_is(b'.')? {
                    if self.next_is(b'.')? {
                        return Ok(self.punct(Punct::Ellipsis));
                    }
                    // two dots with no third: kept as an identifier token
                    return Ok(self.make_token(TokenKind::Ident("..".to_owned())));
                }
                Ok(self.punct(Punct::Dot))
            }
            b'(' => Ok(self.punct(Punct::LParen)),
            b')' => Ok(self.punct(Punct::RParen)),
            b',' => Ok(self.punct(Punct::Comma)),
            b';' => Ok(self.punct(Punct::Semi)),
            b'[' => Ok(self.punct(Punct::LBracket)),
            b']' => Ok(self.punct(Punct::RBracket)),
            b'{' => Ok(self.punct(Punct::LBrace)),
            b'}' => Ok(self.punct(Punct::RBrace)),
            b'?' => Ok(self.punct(Punct::Question)),
            b'~' => Ok(self.punct(Punct::Tilde)),
            b'-' => {
                if self.next_is(b'-')? {
                    return Ok(self.punct(Punct::Dec));
                }
                if self.next_is(b'>')? {
                    return Ok(self.punct(Punct::Arrow));
                }
                if self.next_is(b'=')? {
                    return Ok(self.punct(Punct::SubAssign));
                }
                Ok(self.punct(Punct::Minus))
            }
            b'<' => {
                if self.next_is(b'<')? {
                    return self.read_rep(b'=', Punct::ShlAssign, Punct::Shl);
                }
                if self.next_is(b'=')? {
                    return Ok(self.punct(Punct::Le));
                }
                if self.next_is(b':')? {
                    return Ok(self.punct(Punct::LBracket));
                }
                if self.next_is(b'%')? {
                    return Ok(self.punct(Punct::LBrace));
                }
                Ok(self.punct(Punct::Lt))
            }
            b'>' => {
                if self.next_is(b'=')? {
                    return Ok(self.punct(Punct::Ge));
                }
                if self.next_is(b'>')? {
                    return self.read_rep(b'=', Punct::ShrAssign, Punct::Shr);
                }
                Ok(self.punct(Punct::Gt))
            }
            b'%' => {
                if let Some(tok) = self.read_percent_digraph()? {
                    return Ok(tok);
                }
                self.read_rep(b'=', Punct::ModAssign, Punct::Percent)
            }
            _ if c.is_ascii_alphabetic() || c == b'_' || c == b'$' || (0x80..=0xFD).contains(&c) => {
                self.read_ident(c)
            }
            _ => Ok(self.make_token(TokenKind::Invalid(c))),
        }
    }

    fn buffer_empty(&self) -> bool {
        self.buffers.len() == 1 && self.buffers[0].is_empty()
    }

    /// Returns the next preprocessing token.
    ///
    /// Buffered tokens win over fresh input. When more than one pending
    /// buffer exists and the top one is empty, a substituted token stream
    /// has run out: end-of-input is reported rather than falling through
    /// to the real stream. Fresh tokens get the `space` flag if whitespace
    /// or comments preceded them and the `bol` flag if nothing did on
    /// their line.
    pub fn next_token(&mut self) -> Result<Token, KrillError> {
        if let Some(tok) = self.buffers.last_mut().and_then(|buf| buf.pop()) {
            return Ok(tok);
        }
        if self.buffers.len() > 1 {
            return Ok(self.make_token(TokenKind::Eof));
        }
        let bol = self.stream.column() == 1;
        let mut tok = self.do_read_token()?;
        while matches!(tok.kind, TokenKind::Space) {
            tok = self.do_read_token()?;
            tok.space = true;
        }
        tok.bol = bol;
        Ok(tok)
    }

    /// Pushes `tok` back so the next `next_token` returns it. Callers may
    /// return at most the tokens they just received, newest first.
    /// End-of-input tokens are not kept — end of input repeats for free.
    pub fn unget(&mut self, tok: Token) {
        if tok.is_eof() {
            return;
        }
        self.buffers
            .last_mut()
            .expect("no pending token buffer")
            .push(tok);
    }

    /// Temporarily substitutes `tokens` for the whole input: they come
    /// back from `next_token` popped from the end of the list, and once
    /// they run out `next_token` reports end-of-input until the matching
    /// `unstash_buffer`.
    pub fn stash_buffer(&mut self, tokens: Vec<Token>) {
        self.buffers.push(tokens);
    }

    pub fn unstash_buffer(&mut self) {
        assert!(
            self.buffers.len() > 1,
            "token buffer unstash without a matching stash"
        );
        self.buffers.pop();
    }

    /// Lexes exactly one token from `text`. The string must contain
    /// nothing else; a trailing newline is tolerated. Used to re-lex
    /// synthesized text such as command-line macro definitions.
    pub fn lex_string(&mut self, text: &str) -> Result<Token, KrillError> {
        self.stream.stash(Source::from_string(text));
        let tok = self.do_read_token()?;
        self.next_is(b'\n')?;
        if self.peek()?.is_some() {
            let pos = self.stream.pos(0);
            self.stream.unstash();
            return Err(KrillError::Unconsumed(pos, text.to_owned()));
        }
        self.stream.unstash();
        Ok(tok)
    }

    /// Lexes the operand of `#include`.
    ///
    /// Header names get special treatment: the name may be quoted by `<`
    /// and `>`, and even a `"`-quoted one is not a string literal — a
    /// backslash in it is an ordinary character. So this reads raw
    /// characters instead of tokens, and is only callable while no pending
    /// token buffer is active. Returns the name and whether it was the
    /// `<...>` (system) form, or `None`, consuming nothing, when the input
    /// does not start with either quote.
    pub fn read_header_name(&mut self) -> Result<Option<(String, bool)>, KrillError> {
        if !self.buffer_empty() {
            return Ok(None);
        }
        self.skip_space()?;
        let pos = self.stream.pos(0);
        let (close, system) = if self.next_is(b'"')? {
            (b'"', false)
        } else if self.next_is(b'<')? {
            (b'>', true)
        } else {
            return Ok(None);
        };
        let mut name = Vec::new();
        while !self.next_is(close)? {
            match self.readc()? {
                None | Some(b'\n') => return Err(KrillError::UnterminatedHeader(pos)),
                Some(c) => name.push(c),
            }
        }
        if name.is_empty() {
            return Err(KrillError::EmptyHeader(pos));
        }
        Ok(Some((String::from_utf8_lossy(&name).into_owned(), system)))
    }
}

fn hex_val(c: u8) -> u32 {
    match c {
        b'0'..=b'9' => (c - b'0') as u32,
        b'a'..=b'f' => (c - b'a' + 10) as u32,
        _ => (c - b'A' + 10) as u32,
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;

    fn lex_all(text: &str) -> Result<Vec<Token>, KrillError> {
        let mut lexer = Lexer::from_source(Source::from_string(text));
        let mut out = Vec::new();
        loop {
            let tok = lexer.next_token()?;
            if tok.is_eof() {
                return Ok(out);
            }
            out.push(tok);
        }
    }

    /// Token kinds with newline tokens dropped, for one-line inputs.
    fn kinds(text: &str) -> Vec<TokenKind> {
        lex_all(text)
            .expect("lexes")
            .into_iter()
            .map(|tok| tok.kind)
            .filter(|kind| !matches!(kind, TokenKind::Newline))
            .collect()
    }

    fn ident(s: &str) -> TokenKind {
        TokenKind::Ident(s.to_owned())
    }

    fn num(s: &str) -> TokenKind {
        TokenKind::Num(s.to_owned())
    }

    fn punct(p: Punct) -> TokenKind {
        TokenKind::Punct(p)
    }

    #[test]
    fn maximal_munch() {
        assert_eq!(vec![punct(Punct::ShlAssign)], kinds("<<="));
        assert_eq!(
            vec![punct(Punct::Dec), punct(Punct::Minus), ident("x")],
            kinds("---x")
        );
        assert_eq!(
            vec![
                ident("a"),
                punct(Punct::Inc),
                punct(Punct::Inc),
                punct(Punct::Plus),
                ident("b"),
            ],
            kinds("a+++++b")
        );
        assert_eq!(
            vec![punct(Punct::Shr), punct(Punct::ShrAssign), punct(Punct::Ge)],
            kinds(">> >>= >=")
        );
    }

    #[test]
    fn digraphs_map_to_their_aliases() {
        assert_eq!(
            vec![
                punct(Punct::LBracket),
                punct(Punct::RBracket),
                punct(Punct::LBrace),
                punct(Punct::RBrace),
                punct(Punct::Hash),
                punct(Punct::HashHash),
            ],
            kinds("<: :> <% %> %: %:%:")
        );
        // an incomplete %:%: backs off to %: then %
        assert_eq!(
            vec![punct(Punct::Hash), punct(Punct::Percent), ident("x")],
            kinds("%:%x")
        );
    }

    #[test]
    fn dots() {
        assert_eq!(vec![punct(Punct::Ellipsis)], kinds("..."));
        assert_eq!(vec![ident("..")], kinds(".."));
        assert_eq!(vec![punct(Punct::Dot), ident("x")], kinds(". x"));
        assert_eq!(vec![num(".5")], kinds(".5"));
    }

    #[test]
    fn pp_numbers_are_loose() {
        assert_eq!(vec![num(".32e.")], kinds(".32e."));
        assert_eq!(vec![num("0x1p-3")], kinds("0x1p-3"));
        assert_eq!(vec![num("1e+5"), punct(Punct::Minus), num("2")], kinds("1e+5-2"));
        assert_eq!(vec![num("1"), punct(Punct::Plus), num("2")], kinds("1+2"));
        assert_eq!(vec![num("0xDEADbeef"), ident("_tag")], kinds("0xDEADbeef _tag"));
    }

    #[test]
    fn identifiers() {
        assert_eq!(vec![ident("_foo$bar9")], kinds("_foo$bar9"));
        assert_eq!(vec![ident("café")], kinds("café"));
        // universal character names re-encode as UTF-8 inside identifiers
        assert_eq!(vec![ident("fée")], kinds("f\\u00e9e"));
    }

    #[test]
    fn splice_is_invisible_to_tokens() {
        assert_eq!(kinds("ab"), kinds("a\\\nb"));
        assert_eq!(vec![num("12")], kinds("1\\\n2"));
    }

    #[test]
    fn encoded_literal_prefixes() {
        assert_eq!(
            vec![TokenKind::Str(b"x".to_vec(), Encoding::Wchar)],
            kinds("L\"x\"")
        );
        assert_eq!(
            vec![TokenKind::Str(b"x".to_vec(), Encoding::Char16)],
            kinds("u\"x\"")
        );
        assert_eq!(
            vec![TokenKind::Str(b"x".to_vec(), Encoding::Char32)],
            kinds("U\"x\"")
        );
        assert_eq!(
            vec![TokenKind::Str(b"x".to_vec(), Encoding::Utf8)],
            kinds("u8\"x\"")
        );
        assert_eq!(
            vec![TokenKind::Char(b'x' as i32, Encoding::Char16)],
            kinds("u'x'")
        );
        assert_eq!(
            vec![TokenKind::Char(b'x' as i32, Encoding::Char32)],
            kinds("U'x'")
        );
        // no quote after the prefix letters: plain identifiers
        assert_eq!(vec![ident("u8x")], kinds("u8x"));
        assert_eq!(vec![ident("L"), ident("u"), ident("U")], kinds("L u U"));
    }

    #[test]
    fn string_escapes_decode() {
        assert_eq!(
            vec![TokenKind::Str(vec![65], Encoding::None)],
            kinds(r#""\101""#)
        );
        assert_eq!(
            vec![TokenKind::Str(vec![65], Encoding::None)],
            kinds(r#""\x41""#)
        );
        // octal escapes stop after three digits; hex escapes are eager and
        // the value is stored as a single byte
        assert_eq!(
            vec![TokenKind::Str(vec![0o123, b'4'], Encoding::None)],
            kinds(r#""\1234""#)
        );
        assert_eq!(
            vec![TokenKind::Str(vec![0xFF], Encoding::None)],
            kinds(r#""\xffff""#)
        );
        assert_eq!(
            vec![TokenKind::Str(vec![7, 8, 12, 10, 13, 9, 11, 0x1B], Encoding::None)],
            kinds(r#""\a\b\f\n\r\t\v\e""#)
        );
        // an unknown escape letter is itself, with a warning
        assert_eq!(
            vec![TokenKind::Str(b"q".to_vec(), Encoding::None)],
            kinds(r#""\q""#)
        );
        // universal character names become UTF-8 bytes
        assert_eq!(
            vec![TokenKind::Str(vec![0xC3, 0xA9], Encoding::None)],
            kinds("\"\\u00e9\"")
        );
        // raw bytes above 0x7F pass through untouched
        assert_eq!(
            vec![TokenKind::Str(vec![0xC3, 0xA9], Encoding::None)],
            kinds("\"é\"")
        );
        assert_eq!(
            vec![TokenKind::Str(vec![0xF0, 0x9F, 0x98, 0x80], Encoding::None)],
            kinds(r#""\U0001f600""#)
        );
    }

    #[test]
    fn char_literal_values() {
        assert_eq!(vec![TokenKind::Char(97, Encoding::None)], kinds("'a'"));
        assert_eq!(vec![TokenKind::Char(10, Encoding::None)], kinds(r"'\n'"));
        // unprefixed constants narrow to signed char
        assert_eq!(vec![TokenKind::Char(-1, Encoding::None)], kinds(r"'\xff'"));
        assert_eq!(vec![TokenKind::Char(255, Encoding::Wchar)], kinds(r"L'\xff'"));
        assert_eq!(
            vec![TokenKind::Char(0x1F600, Encoding::Char32)],
            kinds(r"U'\U0001f600'")
        );
    }

    #[test]
    fn fatal_literal_errors() {
        assert!(matches!(
            lex_all(r#""\xg""#),
            Err(KrillError::HexEscape(_, Some(b'g')))
        ));
        // ASCII may not be spelled as a universal character name
        assert!(matches!(
            lex_all("\"\\u0041\""),
            Err(KrillError::InvalidUcn(..))
        ));
        assert!(matches!(
            lex_all(r#""\ud800""#),
            Err(KrillError::InvalidUcn(..))
        ));
        assert!(matches!(
            lex_all("\"abc"),
            Err(KrillError::UnterminatedString(_))
        ));
        assert!(matches!(
            lex_all("'a"),
            Err(KrillError::UnterminatedChar(_))
        ));
        assert!(matches!(
            lex_all("/* no end"),
            Err(KrillError::UnterminatedComment(_))
        ));
    }

    #[test]
    fn invalid_characters_are_data() {
        assert_eq!(vec![TokenKind::Invalid(b'@')], kinds("@"));
        assert_eq!(vec![TokenKind::Invalid(b'`')], kinds("`"));
    }

    #[test]
    fn comments_collapse_to_the_space_flag() -> Result<(), KrillError> {
        let toks = lex_all("a /*x*/ b")?;
        assert!(toks[0].is_ident("a"));
        assert!(!toks[0].space);
        assert!(toks[1].is_ident("b"));
        assert!(toks[1].space);

        let toks = lex_all("a//trailing\nb")?;
        assert!(toks[0].is_ident("a"));
        assert!(matches!(toks[1].kind, TokenKind::Newline));
        assert!(toks[1].space);
        assert!(toks[2].is_ident("b"));
        Ok(())
    }

    #[test]
    fn beginning_of_line_flags() -> Result<(), KrillError> {
        let toks = lex_all("a b\nc")?;
        assert!(toks[0].is_ident("a"));
        assert!(toks[0].bol);
        assert!(toks[1].is_ident("b"));
        assert!(!toks[1].bol);
        assert!(matches!(toks[2].kind, TokenKind::Newline));
        assert!(toks[3].is_ident("c"));
        assert!(toks[3].bol);
        Ok(())
    }

    #[test]
    fn positions_are_stamped() -> Result<(), KrillError> {
        let toks = lex_all("ab + c\n  d")?;
        let at = |i: usize| (toks[i].pos.line, toks[i].pos.column);
        assert_eq!((1, 1), at(0));
        assert_eq!((1, 4), at(1));
        assert_eq!((1, 6), at(2));
        assert_eq!((2, 3), at(4));
        Ok(())
    }

    #[test]
    fn counts_increase_within_a_source() -> Result<(), KrillError> {
        let toks = lex_all("a b c d")?;
        for pair in toks.windows(2) {
            assert!(pair[0].count < pair[1].count);
        }
        Ok(())
    }

    #[test]
    fn pushback_restores_original_order() -> Result<(), KrillError> {
        let mut lexer = Lexer::from_source(Source::from_string("a b c"));
        let a = lexer.next_token()?;
        let b = lexer.next_token()?;
        // newest first
        lexer.unget(b.clone());
        lexer.unget(a.clone());
        assert!(lexer.next_token()?.is_ident("a"));
        assert!(lexer.next_token()?.is_ident("b"));
        assert!(lexer.next_token()?.is_ident("c"));
        Ok(())
    }

    #[test]
    fn pushback_preserves_flags() -> Result<(), KrillError> {
        let mut lexer = Lexer::from_source(Source::from_string("a b"));
        lexer.next_token()?;
        let b = lexer.next_token()?;
        assert!(b.space);
        lexer.unget(b);
        let b = lexer.next_token()?;
        assert!(b.space);
        assert!(!b.bol);
        Ok(())
    }

    #[test]
    fn stashed_buffer_substitutes_the_stream() -> Result<(), KrillError> {
        let mut lexer = Lexer::from_source(Source::from_string("z"));
        let replacement = lex_all("1 2")?;
        let mut stash: Vec<Token> = replacement.into_iter().rev().collect();
        stash.retain(|tok| !matches!(tok.kind, TokenKind::Newline));
        lexer.stash_buffer(stash);

        assert_eq!(num("1"), lexer.next_token()?.kind);
        assert_eq!(num("2"), lexer.next_token()?.kind);
        // the substituted stream is exhausted: end of input, not fallthrough
        assert!(lexer.next_token()?.is_eof());
        assert!(lexer.next_token()?.is_eof());

        lexer.unstash_buffer();
        assert!(lexer.next_token()?.is_ident("z"));
        Ok(())
    }

    #[test]
    fn lex_string_reads_exactly_one_token() -> Result<(), KrillError> {
        let mut lexer = Lexer::from_source(Source::from_string("real input"));
        assert!(lexer.lex_string("foo")?.is_ident("foo"));
        assert!(lexer.lex_string("foo\n")?.is_ident("foo"));
        assert_eq!(num("42"), lexer.lex_string("42")?.kind);
        assert!(matches!(
            lexer.lex_string("foo bar"),
            Err(KrillError::Unconsumed(..))
        ));
        // the real stream is untouched
        assert!(lexer.next_token()?.is_ident("real"));
        Ok(())
    }

    #[test]
    fn header_names() -> Result<(), KrillError> {
        let mut lexer = Lexer::from_source(Source::from_string("<stdio.h>"));
        assert_eq!(Some(("stdio.h".to_owned(), true)), lexer.read_header_name()?);

        let mut lexer = Lexer::from_source(Source::from_string("\"local.h\""));
        assert_eq!(
            Some(("local.h".to_owned(), false)),
            lexer.read_header_name()?
        );

        // not a header name: nothing is consumed
        let mut lexer = Lexer::from_source(Source::from_string("x"));
        assert_eq!(None, lexer.read_header_name()?);
        assert!(lexer.next_token()?.is_ident("x"));

        // backslashes are ordinary characters here
        let mut lexer = Lexer::from_source(Source::from_string("\"dir\\file.h\""));
        assert_eq!(
            Some(("dir\\file.h".to_owned(), false)),
            lexer.read_header_name()?
        );
        Ok(())
    }

    #[test]
    fn header_name_errors() {
        let mut lexer = Lexer::from_source(Source::from_string("<>"));
        assert!(matches!(
            lexer.read_header_name(),
            Err(KrillError::EmptyHeader(_))
        ));

        let mut lexer = Lexer::from_source(Source::from_string("<stdio.h\n>"));
        assert!(matches!(
            lexer.read_header_name(),
            Err(KrillError::UnterminatedHeader(_))
        ));

        let mut lexer = Lexer::from_source(Source::from_string("<stdio.h"));
        assert!(matches!(
            lexer.read_header_name(),
            Err(KrillError::UnterminatedHeader(_))
        ));
    }

    #[test]
    fn header_names_need_an_idle_buffer() -> Result<(), KrillError> {
        let mut lexer = Lexer::from_source(Source::from_string("<stdio.h>"));
        let marker = lexer.lex_string("x")?;
        lexer.stash_buffer(vec![marker]);
        assert_eq!(None, lexer.read_header_name()?);
        lexer.unstash_buffer();
        assert_eq!(Some(("stdio.h".to_owned(), true)), lexer.read_header_name()?);
        Ok(())
    }

    #[test]
    fn includes_drain_depth_first() -> Result<(), KrillError> {
        let mut lexer = Lexer::from_source(Source::from_string("tail"));
        lexer.stream_mut().push(Source::from_string("head"));
        let toks = {
            let mut out = Vec::new();
            loop {
                let tok = lexer.next_token()?;
                if tok.is_eof() {
                    break;
                }
                out.push(tok.kind);
            }
            out
        };
        assert_eq!(
            vec![
                ident("head"),
                TokenKind::Newline,
                ident("tail"),
                TokenKind::Newline,
            ],
            toks
        );
        Ok(())
    }

    #[test]
    fn file_and_string_sources_tokenize_alike() -> Result<(), KrillError> {
        let path = "tests/hello_world.c";
        let text = std::fs::read_to_string(path)?;

        let mut from_file = Lexer::new(path)?;
        let mut lexed = Vec::new();
        loop {
            let tok = from_file.next_token()?;
            if tok.is_eof() {
                break;
            }
            lexed.push(tok.kind);
        }

        let from_text: Vec<TokenKind> =
            lex_all(&text)?.into_iter().map(|tok| tok.kind).collect();
        assert_eq!(from_text, lexed);
        assert!(lexed.contains(&ident("printf")));
        Ok(())
    }

    #[test]
    fn multi_line_program() -> Result<(), KrillError> {
        let text = indoc! {r#"
            int main(void) {
                printf("%d\n", 42);
                return 0;
            }
        "#};
        let toks = kinds(text);
        assert_eq!(
            vec![
                ident("int"),
                ident("main"),
                punct(Punct::LParen),
                ident("void"),
                punct(Punct::RParen),
                punct(Punct::LBrace),
                ident("printf"),
                punct(Punct::LParen),
                TokenKind::Str(b"%d\n".to_vec(), Encoding::None),
                punct(Punct::Comma),
                num("42"),
                punct(Punct::RParen),
                punct(Punct::Semi),
                ident("return"),
                num("0"),
                punct(Punct::Semi),
                punct(Punct::RBrace),
            ],
            toks
        );
        Ok(())
    }
}
