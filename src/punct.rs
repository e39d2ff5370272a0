use std::fmt::{self, Display};

/// C11 6.4.6 punctuators, one variant per operator the tokenizer can
/// produce, multi-character forms included. Digraph spellings (`<:`, `:>`,
/// `<%`, `%>`, `%:`, `%:%:`) are recognized by the lexer and mapped
/// directly to the punctuator they alias, so they have no variants here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Punct {
    /// [
    LBracket,
    /// ]
    RBracket,
    /// (
    LParen,
    /// )
    RParen,
    /// {
    LBrace,
    /// }
    RBrace,
    /// .
    Dot,
    /// ->
    Arrow,
    /// ++
    Inc,
    /// --
    Dec,
    /// &
    Amp,
    /// *
    Star,
    /// +
    Plus,
    /// -
    Minus,
    /// ~
    Tilde,
    /// !
    Bang,
    /// /
    Slash,
    /// %
    Percent,
    /// <<
    Shl,
    /// >>
    Shr,
    /// <
    Lt,
    /// >
    Gt,
    /// <=
    Le,
    /// >=
    Ge,
    /// ==
    EqEq,
    /// !=
    Ne,
    /// ^
    Caret,
    /// |
    Pipe,
    /// &&
    AndAnd,
    /// ||
    OrOr,
    /// ?
    Question,
    /// :
    Colon,
    /// ;
    Semi,
    /// ...
    Ellipsis,
    /// =
    Assign,
    /// *=
    MulAssign,
    /// /=
    DivAssign,
    /// %=
    ModAssign,
    /// +=
    AddAssign,
    /// -=
    SubAssign,
    /// <<=
    ShlAssign,
    /// >>=
    ShrAssign,
    /// &=
    AndAssign,
    /// ^=
    XorAssign,
    /// |=
    OrAssign,
    /// ,
    Comma,
    /// #
    Hash,
    /// ##
    HashHash,
}

impl Punct {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LBracket => "[",
            Self::RBracket => "]",
            Self::LParen => "(",
            Self::RParen => ")",
            Self::LBrace => "{",
            Self::RBrace => "}",
            Self::Dot => ".",
            Self::Arrow => "->",
            Self::Inc => "++",
            Self::Dec => "--",
            Self::Amp => "&",
            Self::Star => "*",
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Tilde => "~",
            Self::Bang => "!",
            Self::Slash => "/",
            Self::Percent => "%",
            Self::Shl => "<<",
            Self::Shr => ">>",
            Self::Lt => "<",
            Self::Gt => ">",
            Self::Le => "<=",
            Self::Ge => ">=",
            Self::EqEq => "==",
            Self::Ne => "!=",
            Self::Caret => "^",
            Self::Pipe => "|",
            Self::AndAnd => "&&",
            Self::OrOr => "||",
            Self::Question => "?",
            Self::Colon => ":",
            Self::Semi => ";",
            Self::Ellipsis => "...",
            Self::Assign => "=",
            Self::MulAssign => "*=",
            Self::DivAssign => "/=",
            Self::ModAssign => "%=",
            Self::AddAssign => "+=",
            Self::SubAssign => "-=",
            Self::ShlAssign => "<<=",
            Self::ShrAssign => ">>=",
            Self::AndAssign => "&=",
            Self::XorAssign => "^=",
            Self::OrAssign => "|=",
            Self::Comma => ",",
            Self::Hash => "#",
            Self::HashHash => "##",
        }
    }

    pub fn all() -> Vec<Self> {
        vec![
            Self::LBracket,
            Self::RBracket,
            Self::LParen,
            Self::RParen,
            Self::LBrace,
            Self::RBrace,
            Self::Dot,
            Self::Arrow,
            Self::Inc,
            Self::Dec,
            Self::Amp,
            Self::Star,
            Self::Plus,
            Self::Minus,
            Self::Tilde,
            Self::Bang,
            Self::Slash,
            Self::Percent,
            Self::Shl,
            Self::Shr,
            Self::Lt,
            Self::Gt,
            Self::Le,
            Self::Ge,
            Self::EqEq,
            Self::Ne,
            Self::Caret,
            Self::Pipe,
            Self::AndAnd,
            Self::OrOr,
            Self::Question,
            Self::Colon,
            Self::Semi,
            Self::Ellipsis,
            Self::Assign,
            Self::MulAssign,
            Self::DivAssign,
            Self::ModAssign,
            Self::AddAssign,
            Self::SubAssign,
            Self::ShlAssign,
            Self::ShrAssign,
            Self::AndAssign,
            Self::XorAssign,
            Self::OrAssign,
            Self::Comma,
            Self::Hash,
            Self::HashHash,
        ]
    }
}

impl Display for Punct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::Punct;

    #[test]
    fn spellings_are_one_to_three_characters() {
        for punct in Punct::all() {
            let len = punct.as_str().len();
            assert!((1..=3).contains(&len), "{punct:?} is {len} chars");
        }
    }

    #[test]
    fn spellings_are_distinct() {
        let all = Punct::all();
        for (i, a) in all.iter().enumerate() {
            for b in &all[i + 1..] {
                assert_ne!(a.as_str(), b.as_str());
            }
        }
    }
}
