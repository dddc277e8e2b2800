//! Type annotation parsing.
//!
//! Grammar:
//! - `Name` or `Name<T, ...>`
//! - `(A, B) => R` for function types, `(T)` for grouping
//! - any of the above followed by `[]` (array) or `?` (optional), repeatable

use super::parser::Parser;
use crate::ast::types::*;
use crate::ast::{Ident, ParseError};
use crate::lexer::TokenKind;

impl<'ast> Parser<'ast> {
    /// Parse a complete type expression.
    ///
    /// Examples:
    /// - `Int`
    /// - `List<String>[]`
    /// - `Int??` (same as `Int?`)
    /// - `(Int, Int) => Bool`
    pub fn parse_type(&mut self) -> Result<TypeExpr<'ast>, ParseError> {
        self.deeper(|p| p.parse_type_suffixed())
    }

    fn parse_type_suffixed(&mut self) -> Result<TypeExpr<'ast>, ParseError> {
        let start = self.peek().span;
        let mut ty = self.parse_type_base()?;

        loop {
            let token = *self.peek();
            if token.newline_before {
                break;
            }
            match token.kind {
                TokenKind::LeftBracket if self.peek_nth(1).kind == TokenKind::RightBracket => {
                    self.descend(token.span)?;
                    self.advance();
                    self.advance();
                    ty = TypeExpr {
                        kind: TypeExprKind::Array(self.arena.alloc(ty)),
                        span: self.span_from(start),
                    };
                }
                TokenKind::Question => {
                    self.descend(token.span)?;
                    self.advance();
                    ty = TypeExpr {
                        kind: TypeExprKind::Option(self.arena.alloc(ty)),
                        span: self.span_from(start),
                    };
                }
                _ => break,
            }
        }

        Ok(ty)
    }

    fn parse_type_base(&mut self) -> Result<TypeExpr<'ast>, ParseError> {
        let token = *self.peek();
        match token.kind {
            TokenKind::Identifier => {
                self.advance();
                let args = if self.check(TokenKind::Less) {
                    self.parse_type_args()?
                } else {
                    &[]
                };
                Ok(TypeExpr {
                    kind: TypeExprKind::Named {
                        name: Ident::new(token.lexeme, token.span),
                        args,
                    },
                    span: self.span_from(token.span),
                })
            }
            TokenKind::LeftParen => {
                self.advance();
                let params = self.nested(|p| {
                    let mut params = Vec::new();
                    while !p.check(TokenKind::RightParen) && !p.is_eof() {
                        params.push(p.parse_type()?);
                        if p.eat(TokenKind::Comma).is_none() {
                            break;
                        }
                    }
                    p.expect(TokenKind::RightParen)?;
                    Ok::<_, ParseError>(params)
                })?;

                if self.eat(TokenKind::Arrow).is_some() {
                    let ret = self.parse_type()?;
                    return Ok(TypeExpr {
                        kind: TypeExprKind::Function {
                            params: self.arena.alloc_slice_copy(&params),
                            ret: self.arena.alloc(ret),
                        },
                        span: self.span_from(token.span),
                    });
                }

                // A parenthesized single type groups, as in `((Int) => Int)[]`
                match params.as_slice() {
                    [inner] => Ok(TypeExpr {
                        kind: inner.kind,
                        span: self.span_from(token.span),
                    }),
                    _ => Err(ParseError::expected_token(
                        self.peek().span,
                        "'=>' after function type parameters",
                        self.peek().kind.description(),
                    )),
                }
            }
            TokenKind::Eof => Err(ParseError::unexpected_eof(token.span)),
            _ => Err(ParseError::expected_type(token.span, token.kind.description())),
        }
    }

    /// Parse `<T, U>` type arguments.
    fn parse_type_args(&mut self) -> Result<&'ast [TypeExpr<'ast>], ParseError> {
        self.expect(TokenKind::Less)?;
        let mut args = Vec::new();
        loop {
            args.push(self.parse_type()?);
            if self.eat(TokenKind::Comma).is_none() {
                break;
            }
        }
        self.expect(TokenKind::Greater)?;
        Ok(self.arena.alloc_slice_copy(&args))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bumpalo::Bump;

    fn parse<'a>(source: &str, arena: &'a Bump) -> TypeExpr<'a> {
        Parser::type_expr(source, arena).unwrap_or_else(|e| panic!("{source}: {e}"))
    }

    #[test]
    fn named_with_arguments() {
        let arena = Bump::new();
        let TypeExprKind::Named { name, args } = parse("Map<String, Int[]>", &arena).kind else {
            panic!("expected named type");
        };
        assert_eq!(name.name, "Map");
        assert_eq!(args.len(), 2);
        assert!(matches!(args[1].kind, TypeExprKind::Array(_)));
    }

    #[test]
    fn suffixes_apply_left_to_right() {
        let arena = Bump::new();
        let TypeExprKind::Option(inner) = parse("Int[]?", &arena).kind else { panic!() };
        assert!(matches!(inner.kind, TypeExprKind::Array(_)));

        let TypeExprKind::Array(inner) = parse("String?[]", &arena).kind else { panic!() };
        assert!(matches!(inner.kind, TypeExprKind::Option(_)));
    }

    #[test]
    fn function_types() {
        let arena = Bump::new();
        let TypeExprKind::Function { params, ret } = parse("(Int, String) => Bool", &arena).kind else {
            panic!()
        };
        assert_eq!(params.len(), 2);
        assert!(matches!(ret.kind, TypeExprKind::Named { .. }));

        let TypeExprKind::Array(inner) = parse("(() => Int)[]", &arena).kind else { panic!() };
        assert!(matches!(inner.kind, TypeExprKind::Function { .. }));
    }

    #[test]
    fn rejects_non_types() {
        let arena = Bump::new();
        assert!(Parser::type_expr("123", &arena).is_err());
        assert!(Parser::type_expr("(Int, Int)", &arena).is_err());
    }
}
