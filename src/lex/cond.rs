use crate::error::KrillError;
use crate::lex::lexer::Lexer;
use crate::lex::token::TokenKind;
use crate::punct::Punct;

/// Skipping a block excluded by `#if`, `#ifdef` and the like.
///
/// C11 6.10 says skipped groups still have to consist of valid pp-tokens,
/// but in practice compilers neither tokenize nor validate them, and
/// neither do we: this scans forward as fast as it can, only looking hard
/// enough to balance nested conditionals and to avoid mistaking directive
/// characters inside literals for structure.
impl Lexer {
    /// Skips a character constant without decoding it; tolerates end of
    /// input (the unterminated conditional is reported elsewhere).
    fn skip_char_verbatim(&mut self) -> Result<(), KrillError> {
        if self.readc()? == Some(b'\\') {
            self.readc()?;
        }
        let mut c = self.readc()?;
        while c.is_some() && c != Some(b'\'') {
            c = self.readc()?;
        }
        Ok(())
    }

    /// Likewise for a string literal: escape-aware, never decoded.
    fn skip_string_verbatim(&mut self) -> Result<(), KrillError> {
        loop {
            match self.readc()? {
                None | Some(b'"') => return Ok(()),
                Some(b'\\') => {
                    self.readc()?;
                }
                _ => {}
            }
        }
    }

    /// Fast-forwards over the body of a false conditional branch.
    ///
    /// Nested `#if`/`#ifdef`/`#ifndef` ... `#endif` pairs are balanced with
    /// a counter. On an unnested `#else`, `#elif` or `#endif`, the directive
    /// name and a synthesized `#` (stamped with the line start it came from)
    /// are pushed back so the preprocessor resumes exactly at that line. End
    /// of input just returns — an unterminated conditional is diagnosed by
    /// the caller, not here.
    pub fn skip_cond_incl(&mut self) -> Result<(), KrillError> {
        let mut nest = 0;
        loop {
            let bol = self.stream_column() == 1;
            self.skip_space()?;
            let Some(c) = self.readc()? else {
                return Ok(());
            };
            if c == b'\'' {
                self.skip_char_verbatim()?;
                continue;
            }
            if c == b'"' {
                self.skip_string_verbatim()?;
                continue;
            }
            if c != b'#' || !bol {
                continue;
            }
            let column = self.stream_column() - 1;
            let tok = self.next_token()?;
            let name = match &tok.kind {
                TokenKind::Ident(name) => name.clone(),
                _ => continue,
            };
            if nest == 0 && matches!(name.as_str(), "else" | "elif" | "endif") {
                self.unget(tok);
                let mut hash = self.make_token(TokenKind::Punct(Punct::Hash));
                hash.bol = true;
                hash.pos.column = column;
                self.unget(hash);
                return Ok(());
            }
            if matches!(name.as_str(), "if" | "ifdef" | "ifndef") {
                nest += 1;
            } else if nest > 0 && name == "endif" {
                nest -= 1;
            }
            self.skip_line()?;
        }
    }
}
