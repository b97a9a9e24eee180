// Type expression parsing. Constructs outside the accepted subset
// (conditional, mapped, infer, keyof) parse to `TypeExpr::Unsupported`
// so the lowering can point a catalog code at them.

use crate::ParseError;
use lode_ast::*;
use lode_lexer::Token;

use super::Parser;

impl Parser {
    pub(crate) fn parse_type(&mut self) -> Result<TypeExpr, ParseError> {
        let start = self.cur_start();

        // Leading `|` on multi-line unions
        self.match_token(&Token::Pipe);

        let first = self.parse_intersection_type()?;
        if !self.check(&Token::Pipe) {
            return Ok(first);
        }

        let mut members = vec![first];
        while self.match_token(&Token::Pipe) {
            members.push(self.parse_intersection_type()?);
        }

        Ok(TypeExpr::Union {
            members,
            span: self.span_from(start),
        })
    }

    fn parse_intersection_type(&mut self) -> Result<TypeExpr, ParseError> {
        let start = self.cur_start();
        let first = self.parse_conditional_type()?;
        if !self.check(&Token::Ampersand) {
            return Ok(first);
        }

        let mut members = vec![first];
        while self.match_token(&Token::Ampersand) {
            members.push(self.parse_conditional_type()?);
        }

        Ok(TypeExpr::Intersection {
            members,
            span: self.span_from(start),
        })
    }

    /// `T extends U ? X : Y` parses to an unsupported node spanning the
    /// whole conditional.
    fn parse_conditional_type(&mut self) -> Result<TypeExpr, ParseError> {
        let start = self.cur_start();
        let base = self.parse_primary_type()?;

        if !self.match_token(&Token::Extends) {
            return Ok(base);
        }

        let _check = self.parse_primary_type()?;
        self.consume(&Token::Question, "Expected '?' in conditional type")?;
        let _then = self.parse_type()?;
        self.consume(&Token::Colon, "Expected ':' in conditional type")?;
        let _other = self.parse_type()?;

        Ok(TypeExpr::Unsupported {
            description: "conditional type".to_string(),
            span: self.span_from(start),
        })
    }

    fn parse_primary_type(&mut self) -> Result<TypeExpr, ParseError> {
        let start = self.cur_start();

        if self.match_token(&Token::Infer) {
            let _name = self.consume_identifier("Expected name after 'infer'")?;
            return Ok(TypeExpr::Unsupported {
                description: "infer type".to_string(),
                span: self.span_from(start),
            });
        }

        if self.match_token(&Token::Keyof) {
            let _inner = self.parse_primary_type()?;
            return Ok(TypeExpr::Unsupported {
                description: "keyof type".to_string(),
                span: self.span_from(start),
            });
        }

        if self.check(&Token::LBrace) {
            return self.parse_object_type();
        }

        if self.check(&Token::LBracket) {
            return self.parse_tuple_type();
        }

        if self.match_token(&Token::LParen) {
            let inner = self.parse_type()?;
            self.consume(&Token::RParen, "Expected ')' after type")?;
            return Ok(inner);
        }

        match self.peek().clone() {
            Token::StringLiteral(value) | Token::SingleQuoteString(value) => {
                self.advance();
                Ok(TypeExpr::StringLit {
                    value,
                    span: self.span_from(start),
                })
            }
            Token::IntLiteral(raw) => {
                self.advance();
                let value = raw
                    .parse::<i64>()
                    .map_err(|_| self.error("Integer literal type out of range"))?;
                Ok(TypeExpr::IntLit {
                    value,
                    span: self.span_from(start),
                })
            }
            Token::Minus => {
                // Negative literal type (`ArrayN<T, -1>` is rejected later,
                // but it must parse to be rejected with the right code).
                self.advance();
                let Token::IntLiteral(raw) = self.peek().clone() else {
                    return Err(self.error("Expected integer after '-' in type"));
                };
                self.advance();
                let value = raw
                    .parse::<i64>()
                    .map_err(|_| self.error("Integer literal type out of range"))?;
                Ok(TypeExpr::IntLit {
                    value: -value,
                    span: self.span_from(start),
                })
            }
            Token::Void => {
                self.advance();
                Ok(TypeExpr::Named {
                    name: "void".to_string(),
                    args: Vec::new(),
                    span: self.span_from(start),
                })
            }
            // `this` appears in reference position for method receivers
            // (`this: ref<this>` in interface facades).
            Token::This => {
                self.advance();
                Ok(TypeExpr::Named {
                    name: "this".to_string(),
                    args: Vec::new(),
                    span: self.span_from(start),
                })
            }
            Token::Undefined => {
                self.advance();
                Ok(TypeExpr::Named {
                    name: "undefined".to_string(),
                    args: Vec::new(),
                    span: self.span_from(start),
                })
            }
            Token::Null => {
                self.advance();
                Ok(TypeExpr::Named {
                    name: "null".to_string(),
                    args: Vec::new(),
                    span: self.span_from(start),
                })
            }
            Token::Ident(name) => {
                self.advance();
                let args = if self.check(&Token::Lt) {
                    self.parse_type_args()?
                } else {
                    Vec::new()
                };
                Ok(TypeExpr::Named {
                    name,
                    args,
                    span: self.span_from(start),
                })
            }
            _ => Err(self.error("Expected a type")),
        }
    }

    pub(crate) fn parse_type_args(&mut self) -> Result<Vec<TypeExpr>, ParseError> {
        self.consume(&Token::Lt, "Expected '<'")?;
        let mut args = Vec::new();
        loop {
            args.push(self.parse_type()?);
            if !self.match_token(&Token::Comma) {
                break;
            }
        }
        self.consume_type_gt()?;
        Ok(args)
    }

    fn parse_object_type(&mut self) -> Result<TypeExpr, ParseError> {
        let start = self.cur_start();
        self.consume(&Token::LBrace, "Expected '{'")?;

        // Mapped type: `{ [K in T]: U }`
        if self.check(&Token::LBracket) {
            // Rewind to the brace so the whole group can be skipped.
            self.current -= 1;
            self.skip_balanced()?;
            return Ok(TypeExpr::Unsupported {
                description: "mapped type".to_string(),
                span: self.span_from(start),
            });
        }

        let mut fields = Vec::new();
        while !self.check(&Token::RBrace) && !self.is_at_end() {
            let field_start = self.cur_start();
            let name = self.consume_identifier("Expected field name in object type")?;
            let optional = self.match_token(&Token::Question);
            self.consume(&Token::Colon, "Expected ':' in object type field")?;
            let ty = self.parse_type()?;
            fields.push(ObjectTypeField {
                name,
                ty,
                optional,
                span: self.span_from(field_start),
            });
            if !self.match_token(&Token::Semicolon) && !self.match_token(&Token::Comma) {
                break;
            }
        }

        self.consume(&Token::RBrace, "Expected '}' after object type")?;
        Ok(TypeExpr::Object {
            fields,
            span: self.span_from(start),
        })
    }

    fn parse_tuple_type(&mut self) -> Result<TypeExpr, ParseError> {
        let start = self.cur_start();
        self.consume(&Token::LBracket, "Expected '['")?;

        let mut members = Vec::new();
        while !self.check(&Token::RBracket) && !self.is_at_end() {
            members.push(self.parse_type()?);
            if !self.match_token(&Token::Comma) {
                break;
            }
        }

        self.consume(&Token::RBracket, "Expected ']' after tuple type")?;
        Ok(TypeExpr::Tuple {
            members,
            span: self.span_from(start),
        })
    }
}
