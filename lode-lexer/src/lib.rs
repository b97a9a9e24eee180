use logos::Logos;

/// Unescape a quoted string literal body. Also used by the parser when it
/// splits template-literal text runs.
pub fn unescape_string(s: &str) -> String {
    let mut result = String::new();
    let mut chars = s.chars();

    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.next() {
                Some('n') => result.push('\n'),
                Some('r') => result.push('\r'),
                Some('t') => result.push('\t'),
                Some('0') => result.push('\0'),
                Some('"') => result.push('"'),
                Some('\'') => result.push('\''),
                Some('`') => result.push('`'),
                Some('\\') => result.push('\\'),
                Some('u') => {
                    let hex: String = chars.by_ref().take(4).collect();
                    if let Ok(code) = u32::from_str_radix(&hex, 16) {
                        if let Some(unicode_char) = char::from_u32(code) {
                            result.push(unicode_char);
                        }
                    }
                }
                Some(c) => {
                    result.push('\\');
                    result.push(c);
                }
                None => result.push('\\'),
            }
        } else {
            result.push(ch);
        }
    }

    result
}

/// Token types for the Lode source language
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
pub enum Token {
    // Keywords
    #[token("export")]
    Export,
    #[token("import")]
    Import,
    #[token("from")]
    From,
    #[token("function")]
    Function,
    #[token("return")]
    Return,
    #[token("const")]
    Const,
    #[token("let")]
    Let,
    #[token("var")]
    Var,
    #[token("type")]
    Type,
    #[token("interface")]
    Interface,
    #[token("class")]
    Class,
    #[token("extends")]
    Extends,
    #[token("implements")]
    Implements,
    #[token("constructor")]
    Constructor,
    #[token("new")]
    New,
    #[token("this")]
    This,
    #[token("static")]
    Static,
    #[token("readonly")]
    Readonly,
    #[token("async")]
    Async,
    #[token("await")]
    Await,
    #[token("switch")]
    Switch,
    #[token("case")]
    Case,
    #[token("default")]
    Default,
    #[token("break")]
    Break,
    #[token("continue")]
    Continue,
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("while")]
    While,
    #[token("for")]
    For,
    #[token("of")]
    Of,
    #[token("in")]
    In,
    #[token("as")]
    As,
    #[token("void")]
    Void,
    #[token("undefined")]
    Undefined,
    #[token("null")]
    Null,
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("infer")]
    Infer,
    #[token("keyof")]
    Keyof,

    // Multi-character operators before their prefixes
    #[token("===")]
    StrictEq,
    #[token("!==")]
    StrictNotEq,
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<=")]
    LtEq,
    #[token(">=")]
    GtEq,
    #[token("&&")]
    AndAnd,
    #[token("||")]
    OrOr,
    #[token("=>")]
    FatArrow,
    #[token("+=")]
    PlusEq,
    #[token("-=")]
    MinusEq,
    #[token("*=")]
    StarEq,
    #[token("/=")]
    SlashEq,
    #[token("%=")]
    PercentEq,
    #[token("++")]
    Increment,
    #[token("--")]
    Decrement,
    #[token("<<")]
    Shl,
    #[token(">>")]
    Shr,
    #[token("...")]
    DotDotDot,
    #[token("?.")]
    QuestionDot,

    #[token("=")]
    Eq,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("!")]
    Not,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("&")]
    Ampersand,
    #[token("|")]
    Pipe,
    #[token("^")]
    Caret,
    #[token("?")]
    Question,

    // Delimiters
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(",")]
    Comma,
    #[token(";")]
    Semicolon,
    #[token(":")]
    Colon,
    #[token(".")]
    Dot,

    // Literals
    // Float before integer so `3.14` does not lex as `3` `.` `14`.
    #[regex(r"[0-9]+\.[0-9]+([eE][+-]?[0-9]+)?", |lex| lex.slice().to_string())]
    FloatLiteral(String),

    #[regex(r"[0-9]+([eE][+-]?[0-9]+)?", |lex| lex.slice().to_string())]
    IntLiteral(String),

    #[regex(r"0[xX][0-9a-fA-F]+", |lex| lex.slice().to_string())]
    HexLiteral(String),

    #[regex(r#""([^"\\\n]|\\.)*""#, |lex| {
        let s = lex.slice();
        unescape_string(&s[1..s.len()-1])
    })]
    StringLiteral(String),

    #[regex(r#"'([^'\\\n]|\\.)*'"#, |lex| {
        let s = lex.slice();
        unescape_string(&s[1..s.len()-1])
    })]
    SingleQuoteString(String),

    // Template literal, raw body including interpolations. The parser
    // splits on `${` and re-lexes the embedded expressions with the
    // correct byte offset.
    #[regex(r"`(?:[^`\\]|\\.)*`", |lex| {
        let s = lex.slice();
        s[1..s.len()-1].to_string()
    })]
    TemplateLiteral(String),

    // Identifiers
    #[regex(r"[a-zA-Z_$][a-zA-Z0-9_$]*", |lex| lex.slice().to_string())]
    Ident(String),

    // Comments (skip)
    #[regex(r"//[^\n]*", logos::skip)]
    LineComment,

    #[regex(r"/\*([^*]|\*[^/])*\*/", logos::skip)]
    BlockComment,
}

/// A token together with its byte range in the original source.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenSpan {
    pub token: Token,
    pub span: std::ops::Range<usize>,
}

pub struct Lexer<'source> {
    inner: logos::Lexer<'source, Token>,
    /// Added to every span; nonzero when lexing a slice of a larger file
    /// (template-literal interpolations).
    offset: usize,
}

impl<'source> Lexer<'source> {
    pub fn new(source: &'source str) -> Self {
        Self {
            inner: Token::lexer(source),
            offset: 0,
        }
    }

    /// Lex a fragment that starts at byte `offset` of the enclosing file.
    pub fn with_offset(source: &'source str, offset: usize) -> Self {
        Self {
            inner: Token::lexer(source),
            offset,
        }
    }
}

impl<'source> Iterator for Lexer<'source> {
    type Item = Result<TokenSpan, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        let token = self.inner.next()?;
        let raw = self.inner.span();
        let span = raw.start + self.offset..raw.end + self.offset;

        match token {
            Ok(tok) => Some(Ok(TokenSpan { token: tok, span })),
            Err(_) => Some(Err(LexError::InvalidToken { span })),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LexError {
    #[error("invalid token at {span:?}")]
    InvalidToken { span: std::ops::Range<usize> },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(source: &str) -> Vec<Token> {
        Lexer::new(source)
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
            .into_iter()
            .map(|ts| ts.token)
            .collect()
    }

    #[test]
    fn test_keywords_and_idents() {
        let tokens = lex("export function main(): void");
        assert_eq!(
            tokens,
            vec![
                Token::Export,
                Token::Function,
                Token::Ident("main".to_string()),
                Token::LParen,
                Token::RParen,
                Token::Colon,
                Token::Void,
            ]
        );
    }

    #[test]
    fn test_strict_equality_operators() {
        let tokens = lex("a === b !== c == d");
        assert_eq!(
            tokens,
            vec![
                Token::Ident("a".to_string()),
                Token::StrictEq,
                Token::Ident("b".to_string()),
                Token::StrictNotEq,
                Token::Ident("c".to_string()),
                Token::EqEq,
                Token::Ident("d".to_string()),
            ]
        );
    }

    #[test]
    fn test_literals() {
        let tokens = lex(r#"42 3.14 "hi" 'there'"#);
        assert_eq!(
            tokens,
            vec![
                Token::IntLiteral("42".to_string()),
                Token::FloatLiteral("3.14".to_string()),
                Token::StringLiteral("hi".to_string()),
                Token::SingleQuoteString("there".to_string()),
            ]
        );
    }

    #[test]
    fn test_template_literal_raw_body() {
        let tokens = lex("`value: ${x + 1}`");
        assert_eq!(
            tokens,
            vec![Token::TemplateLiteral("value: ${x + 1}".to_string())]
        );
    }

    #[test]
    fn test_comments_are_skipped() {
        let tokens = lex("a // trailing\n/* block */ b");
        assert_eq!(
            tokens,
            vec![Token::Ident("a".to_string()), Token::Ident("b".to_string())]
        );
    }

    #[test]
    fn test_offset_lexing() {
        let mut lexer = Lexer::with_offset("x + 1", 100);
        let first = lexer.next().unwrap().unwrap();
        assert_eq!(first.span, 100..101);
    }

    #[test]
    fn test_string_escapes() {
        let tokens = lex(r#""line\nbreak""#);
        assert_eq!(
            tokens,
            vec![Token::StringLiteral("line\nbreak".to_string())]
        );
    }
}
