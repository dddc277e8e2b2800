//! Statement and declaration parsing.

use super::parser::Parser;
use crate::ast::*;
use crate::lexer::TokenKind;

impl<'ast> Parser<'ast> {
    /// Parse statements until the closing `}` of a block (not consumed).
    ///
    /// Errors are recorded and recovery continues at the next statement, so
    /// one bad line inside a function body does not hide later errors.
    pub(super) fn parse_block_statements(&mut self) -> Result<&'ast [Stmt<'ast>], ParseError> {
        let mut stmts = Vec::new();

        while !self.check(TokenKind::RightBrace) && !self.is_eof() {
            if self.eat(TokenKind::Semicolon).is_some() {
                continue;
            }
            let result = self
                .parse_statement()
                .and_then(|stmt| self.expect_terminator().map(|()| stmt));
            match result {
                Ok(stmt) => stmts.push(stmt),
                Err(error) => {
                    self.record(error);
                    if self.fatal {
                        break;
                    }
                    self.synchronize();
                }
            }
        }

        let stmts: &'ast [Stmt<'ast>] = self.arena.alloc_slice_copy(&stmts);
        Ok(stmts)
    }

    /// Parse a single statement or declaration.
    pub(super) fn parse_statement(&mut self) -> Result<Stmt<'ast>, ParseError> {
        let token = *self.peek();
        match token.kind {
            TokenKind::Val | TokenKind::Var => Ok(Stmt::Binding(self.parse_binding()?)),
            TokenKind::Func => Ok(Stmt::Func(self.alloc_func()?)),
            TokenKind::Type => Ok(Stmt::Type(self.parse_type_decl()?)),
            TokenKind::Enum => Ok(Stmt::Enum(self.parse_enum_decl()?)),
            TokenKind::Import => Ok(Stmt::Import(self.parse_import()?)),
            TokenKind::Export => self.parse_export(),
            TokenKind::While => self.parse_while(),
            TokenKind::For => self.parse_for(),
            TokenKind::Break => {
                self.advance();
                Ok(Stmt::Break(token.span))
            }
            TokenKind::Continue => {
                self.advance();
                Ok(Stmt::Continue(token.span))
            }
            TokenKind::Identifier
                if token.lexeme == "_" && self.peek_nth(1).kind == TokenKind::Equal =>
            {
                self.advance();
                self.advance();
                let value = self.parse_expr(0)?;
                Ok(Stmt::Discard(self.arena.alloc(DiscardStmt {
                    value,
                    span: token.span.merge(value.span()),
                })))
            }
            _ => Ok(Stmt::Expr(self.parse_expr(0)?)),
        }
    }

    /// Parse `val name (: T)? (= init)?` or the `var` form.
    fn parse_binding(&mut self) -> Result<&'ast BindingDecl<'ast>, ParseError> {
        let keyword = self.advance();
        let name = self.expect_ident()?;
        let ty = if self.eat(TokenKind::Colon).is_some() {
            Some(self.parse_type()?)
        } else {
            None
        };
        let init = if self.eat(TokenKind::Equal).is_some() {
            Some(self.parse_expr(0)?)
        } else {
            None
        };

        Ok(self.arena.alloc(BindingDecl {
            mutable: keyword.kind == TokenKind::Var,
            name: Ident::new(name.lexeme, name.span),
            ty,
            init,
            span: self.span_from(keyword.span),
        }))
    }

    fn alloc_func(&mut self) -> Result<&'ast FuncDecl<'ast>, ParseError> {
        let decl = self.parse_func()?;
        Ok(self.arena.alloc(decl))
    }

    /// Parse `func name<T>(params) (: R)? (= expr | { ... })`.
    fn parse_func(&mut self) -> Result<FuncDecl<'ast>, ParseError> {
        let start = self.expect(TokenKind::Func)?.span;
        let name = self.expect_ident()?;
        let type_params = self.parse_type_params()?;
        let params = self.parse_params(true)?;

        let return_type = if self.eat(TokenKind::Colon).is_some() {
            Some(self.parse_type()?)
        } else {
            None
        };

        let body = if self.eat(TokenKind::Equal).is_some() {
            self.parse_expr(0)?
        } else if self.check(TokenKind::LeftBrace) {
            self.parse_block()?
        } else {
            let token = *self.peek();
            return Err(ParseError::new(
                ParseErrorKind::ExpectedBlock,
                token.span,
                format!("expected '=' or '{{' to begin function body, found {}", token.kind),
            ));
        };

        Ok(FuncDecl {
            name: Ident::new(name.lexeme, name.span),
            type_params,
            params,
            inferred_return: return_type.is_none(),
            return_type,
            body,
            span: self.span_from(start),
        })
    }

    /// Parse `<T, U>` after a declaration name, if present.
    fn parse_type_params(&mut self) -> Result<&'ast [Ident<'ast>], ParseError> {
        if self.eat(TokenKind::Less).is_none() {
            return Ok(&[]);
        }
        let mut params = Vec::new();
        loop {
            let name = self.expect_ident()?;
            params.push(Ident::new(name.lexeme, name.span));
            if self.eat(TokenKind::Comma).is_none() {
                break;
            }
        }
        self.expect(TokenKind::Greater)?;
        let params: &'ast [Ident<'ast>] = self.arena.alloc_slice_copy(&params);
        Ok(params)
    }

    /// Parse a parenthesized parameter list.
    ///
    /// `allow_self` admits a leading `self` receiver (methods only; the
    /// checker rejects it on free functions).
    pub(super) fn parse_params(&mut self, allow_self: bool) -> Result<&'ast [Param<'ast>], ParseError> {
        self.expect(TokenKind::LeftParen)?;
        let params = self.nested(|p| {
            let mut params = Vec::new();
            while !p.check(TokenKind::RightParen) && !p.is_eof() {
                params.push(p.parse_param(allow_self && params.is_empty())?);
                if p.eat(TokenKind::Comma).is_none() {
                    break;
                }
            }
            p.expect(TokenKind::RightParen)?;
            Ok::<_, ParseError>(params)
        })?;
        let params: &'ast [Param<'ast>] = self.arena.alloc_slice_copy(&params);
        Ok(params)
    }

    fn parse_param(&mut self, allow_self: bool) -> Result<Param<'ast>, ParseError> {
        if allow_self && let Some(token) = self.eat(TokenKind::SelfKw) {
            return Ok(Param {
                name: Ident::new(token.lexeme, token.span),
                ty: None,
                default: None,
                is_self: true,
                span: token.span,
            });
        }

        let name = self.expect_ident()?;
        let ty = if self.eat(TokenKind::Colon).is_some() {
            Some(self.parse_type()?)
        } else {
            None
        };
        let default = if self.eat(TokenKind::Equal).is_some() {
            Some(self.parse_expr(0)?)
        } else {
            None
        };

        Ok(Param {
            name: Ident::new(name.lexeme, name.span),
            ty,
            default,
            is_self: false,
            span: self.span_from(name.span),
        })
    }

    /// Parse `type Name<T> { field: T (= default)? ... func method(...) ... }`.
    fn parse_type_decl(&mut self) -> Result<&'ast TypeDecl<'ast>, ParseError> {
        let start = self.advance().span;
        let name = self.expect_ident()?;
        let type_params = self.parse_type_params()?;
        self.expect(TokenKind::LeftBrace)?;

        let mut fields = Vec::new();
        let mut methods = Vec::new();
        self.unnested(|p| {
            while !p.check(TokenKind::RightBrace) && !p.is_eof() {
                if p.eat(TokenKind::Comma).is_some() || p.eat(TokenKind::Semicolon).is_some() {
                    continue;
                }
                if p.check(TokenKind::Func) {
                    methods.push(p.parse_func()?);
                } else {
                    fields.push(p.parse_field()?);
                }
            }
            Ok::<_, ParseError>(())
        })?;
        self.expect(TokenKind::RightBrace)?;

        Ok(self.arena.alloc(TypeDecl {
            name: Ident::new(name.lexeme, name.span),
            type_params,
            fields: self.arena.alloc_slice_copy(&fields),
            methods: self.arena.alloc_slice_copy(&methods),
            span: self.span_from(start),
        }))
    }

    /// Parse `name: T (= default)?`.
    fn parse_field(&mut self) -> Result<FieldDecl<'ast>, ParseError> {
        let name = self.expect_ident()?;
        self.expect(TokenKind::Colon)?;
        let ty = self.parse_type()?;
        let default = if self.eat(TokenKind::Equal).is_some() {
            Some(self.parse_expr(0)?)
        } else {
            None
        };
        Ok(FieldDecl {
            name: Ident::new(name.lexeme, name.span),
            ty,
            default,
            span: self.span_from(name.span),
        })
    }

    /// Parse `enum Name { Unit Data(field: T) ... func method(...) ... }`.
    fn parse_enum_decl(&mut self) -> Result<&'ast EnumDecl<'ast>, ParseError> {
        let start = self.advance().span;
        let name = self.expect_ident()?;
        self.expect(TokenKind::LeftBrace)?;

        let mut variants = Vec::new();
        let mut methods = Vec::new();
        self.unnested(|p| {
            while !p.check(TokenKind::RightBrace) && !p.is_eof() {
                if p.eat(TokenKind::Comma).is_some() || p.eat(TokenKind::Semicolon).is_some() {
                    continue;
                }
                if p.check(TokenKind::Func) {
                    methods.push(p.parse_func()?);
                    continue;
                }

                let variant = p.expect_ident()?;
                let fields = if p.check(TokenKind::LeftParen) {
                    p.advance();
                    let fields = p.nested(|p| {
                        let mut fields = Vec::new();
                        while !p.check(TokenKind::RightParen) && !p.is_eof() {
                            fields.push(p.parse_field()?);
                            if p.eat(TokenKind::Comma).is_none() {
                                break;
                            }
                        }
                        p.expect(TokenKind::RightParen)?;
                        Ok::<_, ParseError>(fields)
                    })?;
                    let fields: &'ast [FieldDecl<'ast>] = p.arena.alloc_slice_copy(&fields);
                    Some(fields)
                } else {
                    None
                };
                variants.push(VariantDecl {
                    name: Ident::new(variant.lexeme, variant.span),
                    fields,
                    span: p.span_from(variant.span),
                });
            }
            Ok::<_, ParseError>(())
        })?;
        self.expect(TokenKind::RightBrace)?;

        Ok(self.arena.alloc(EnumDecl {
            name: Ident::new(name.lexeme, name.span),
            variants: self.arena.alloc_slice_copy(&variants),
            methods: self.arena.alloc_slice_copy(&methods),
            span: self.span_from(start),
        }))
    }

    /// Parse `import a, b from "path"`.
    fn parse_import(&mut self) -> Result<&'ast ImportDecl<'ast>, ParseError> {
        let start = self.advance().span;
        let mut names = Vec::new();
        loop {
            let name = self.expect_ident()?;
            names.push(Ident::new(name.lexeme, name.span));
            if self.eat(TokenKind::Comma).is_none() {
                break;
            }
        }
        self.expect(TokenKind::From)?;
        let path = self.expect(TokenKind::StringLiteral)?;

        Ok(self.arena.alloc(ImportDecl {
            names: self.arena.alloc_slice_copy(&names),
            path: path.lexeme,
            path_span: path.span,
            span: self.span_from(start),
        }))
    }

    fn parse_export(&mut self) -> Result<Stmt<'ast>, ParseError> {
        let start = self.advance().span;
        let token = *self.peek();
        let decl = match token.kind {
            TokenKind::Val | TokenKind::Var => Stmt::Binding(self.parse_binding()?),
            TokenKind::Func => Stmt::Func(self.alloc_func()?),
            TokenKind::Type => Stmt::Type(self.parse_type_decl()?),
            TokenKind::Enum => Stmt::Enum(self.parse_enum_decl()?),
            _ => {
                return Err(ParseError::new(
                    ParseErrorKind::InvalidDeclaration,
                    token.span,
                    format!("only declarations can be exported, found {}", token.kind),
                ));
            }
        };
        Ok(Stmt::Export(self.arena.alloc(ExportDecl {
            decl,
            span: start.merge(decl.span()),
        })))
    }

    /// Parse `while cond (|binding|)? body`.
    fn parse_while(&mut self) -> Result<Stmt<'ast>, ParseError> {
        let start = self.advance().span;
        let condition = self.parse_expr(0)?;
        let binding = self.parse_condition_binding()?;
        let body = self.parse_block()?;
        Ok(Stmt::While(self.arena.alloc(WhileStmt {
            condition,
            binding,
            body,
            span: self.span_from(start),
        })))
    }

    /// Parse `for item(, index)? in iterable body`.
    fn parse_for(&mut self) -> Result<Stmt<'ast>, ParseError> {
        let start = self.advance().span;
        let item = self.expect_ident()?;
        let index = if self.eat(TokenKind::Comma).is_some() {
            let index = self.expect_ident()?;
            Some(Ident::new(index.lexeme, index.span))
        } else {
            None
        };
        self.expect(TokenKind::In)?;
        let iterable = self.parse_expr(0)?;
        let body = self.parse_block()?;
        Ok(Stmt::For(self.arena.alloc(ForStmt {
            item: Ident::new(item.lexeme, item.span),
            index,
            iterable,
            body,
            span: self.span_from(start),
        })))
    }
}
