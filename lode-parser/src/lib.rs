use thiserror::Error;

// Modular parser structure
mod parser;
pub use parser::Parser;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("parse error at {start}..{end}: {message}")]
    SyntaxError {
        start: usize,
        end: usize,
        message: String,
    },
    #[error("lexer error at {start}..{end}: invalid token")]
    LexerError { start: usize, end: usize },
}

impl ParseError {
    /// Byte range the error points at.
    pub fn range(&self) -> (usize, usize) {
        match self {
            ParseError::SyntaxError { start, end, .. } => (*start, *end),
            ParseError::LexerError { start, end } => (*start, *end),
        }
    }
}

/// Parse one source file into a module.
pub fn parse_module(file: &str, source: &str) -> Result<lode_ast::Module, ParseError> {
    Parser::new(file, source)?.parse_module()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lode_ast::*;

    #[test]
    fn test_parse_minimal_entry() {
        let module = parse_module("src/main.ls", "export function main(): void { return; }")
            .unwrap();
        assert_eq!(module.items.len(), 1);
        let Item::Function(func) = &module.items[0] else {
            panic!("expected function");
        };
        assert_eq!(func.name.as_deref(), Some("main"));
        assert!(func.is_exported);
        assert_eq!(func.params.len(), 0);
    }

    #[test]
    fn test_parse_error_carries_range() {
        let err = parse_module("src/main.ls", "export export").unwrap_err();
        let (start, _end) = err.range();
        assert!(start > 0);
    }
}
