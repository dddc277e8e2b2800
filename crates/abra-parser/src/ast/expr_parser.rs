//! Expression parsing using Pratt parsing (precedence climbing).
//!
//! Line breaks are significant: an infix operator, `(` or `[` that starts a
//! new line ends the current expression, while `.` and `?.` may continue a
//! method chain on the next line. Inside brackets line breaks are ignored.

use super::parser::Parser;
use crate::ast::expr::*;
use crate::ast::ops::POSTFIX_BP;
use crate::ast::{AssignOp, BinaryOp, Ident, ParseError, ParseErrorKind, Stmt, UnaryOp};
use crate::lexer::TokenKind;

impl<'ast> Parser<'ast> {
    /// Parse an expression with a minimum binding power.
    ///
    /// This is the core of the Pratt parser. It handles operator precedence
    /// by only consuming operators with sufficient binding power.
    pub fn parse_expr(&mut self, min_bp: u8) -> Result<&'ast Expr<'ast>, ParseError> {
        self.deeper(|p| p.parse_expr_bp(min_bp))
    }

    /// Every postfix or infix node wrapping `lhs` costs one nesting level,
    /// so long left-leaning chains are bounded like parentheses.
    fn parse_expr_bp(&mut self, min_bp: u8) -> Result<&'ast Expr<'ast>, ParseError> {
        let mut lhs = self.parse_prefix()?;

        loop {
            let token = *self.peek();
            let line_break = token.newline_before && self.nesting == 0;

            // Member access continues across line breaks
            if matches!(token.kind, TokenKind::Dot | TokenKind::QuestionDot) {
                if POSTFIX_BP < min_bp {
                    break;
                }
                self.descend(token.span)?;
                lhs = self.parse_member_access(lhs)?;
                continue;
            }

            if line_break {
                break;
            }

            if token.kind == TokenKind::LeftParen {
                if POSTFIX_BP < min_bp {
                    break;
                }
                self.descend(token.span)?;
                lhs = self.parse_call(lhs)?;
                continue;
            }

            if token.kind == TokenKind::LeftBracket {
                if POSTFIX_BP < min_bp {
                    break;
                }
                self.descend(token.span)?;
                lhs = self.parse_index(lhs)?;
                continue;
            }

            if let Some(assign_op) = AssignOp::from_token(token.kind) {
                let (l_bp, r_bp) = AssignOp::binding_power();
                if l_bp < min_bp {
                    break;
                }
                if !lhs.is_assignable() {
                    return Err(ParseError::new(
                        ParseErrorKind::InvalidAssignmentTarget,
                        lhs.span(),
                        format!("cannot assign to this expression with {assign_op}"),
                    ));
                }

                self.descend(token.span)?;
                self.advance();
                let rhs = self.parse_expr(r_bp)?;
                let span = lhs.span().merge(rhs.span());
                lhs = self.arena.alloc(Expr::Assign(self.arena.alloc(AssignExpr {
                    target: lhs,
                    op: assign_op,
                    value: rhs,
                    span,
                })));
                continue;
            }

            if let Some(bin_op) = BinaryOp::from_token(token.kind) {
                let (l_bp, r_bp) = bin_op.binding_power();
                if l_bp < min_bp {
                    break;
                }

                self.descend(token.span)?;
                self.advance();
                let rhs = self.parse_expr(r_bp)?;
                let span = lhs.span().merge(rhs.span());
                lhs = self.arena.alloc(Expr::Binary(self.arena.alloc(BinaryExpr {
                    left: lhs,
                    op: bin_op,
                    right: rhs,
                    span,
                })));
                continue;
            }

            break;
        }

        Ok(lhs)
    }

    /// Parse a prefix expression (the start of an expression).
    fn parse_prefix(&mut self) -> Result<&'ast Expr<'ast>, ParseError> {
        let token = *self.peek();

        match token.kind {
            TokenKind::IntLiteral => {
                self.advance();
                let value = token.lexeme.replace('_', "").parse::<i64>().map_err(|_| {
                    ParseError::new(
                        ParseErrorKind::InvalidLiteral,
                        token.span,
                        format!("integer literal {} is out of range", token.lexeme),
                    )
                })?;
                Ok(self.literal(LiteralKind::Int(value), token.span))
            }

            TokenKind::FloatLiteral => {
                self.advance();
                let value = token.lexeme.replace('_', "").parse::<f64>().map_err(|_| {
                    ParseError::new(
                        ParseErrorKind::InvalidLiteral,
                        token.span,
                        format!("invalid float literal {}", token.lexeme),
                    )
                })?;
                Ok(self.literal(LiteralKind::Float(value), token.span))
            }

            TokenKind::StringLiteral => {
                self.advance();
                Ok(self.literal(LiteralKind::String(token.lexeme), token.span))
            }

            TokenKind::StringStart => self.parse_interpolation(),

            TokenKind::True => {
                self.advance();
                Ok(self.literal(LiteralKind::Bool(true), token.span))
            }

            TokenKind::False => {
                self.advance();
                Ok(self.literal(LiteralKind::Bool(false), token.span))
            }

            TokenKind::None => {
                self.advance();
                Ok(self.literal(LiteralKind::None, token.span))
            }

            TokenKind::Minus | TokenKind::Bang => {
                self.advance();
                let op = if token.kind == TokenKind::Bang { UnaryOp::Not } else { UnaryOp::Neg };
                let operand = self.parse_expr(UnaryOp::binding_power())?;
                let span = token.span.merge(operand.span());
                Ok(self.arena.alloc(Expr::Unary(self.arena.alloc(UnaryExpr {
                    op,
                    operand,
                    span,
                }))))
            }

            TokenKind::LeftParen if self.is_lambda_start() => self.parse_lambda(),

            TokenKind::LeftParen => {
                let start_span = self.advance().span;
                let expr = self.nested(|p| p.parse_expr(0))?;
                self.expect(TokenKind::RightParen)?;
                Ok(self.arena.alloc(Expr::Paren(self.arena.alloc(ParenExpr {
                    expr,
                    span: self.span_from(start_span),
                }))))
            }

            TokenKind::LeftBracket => self.parse_array(),

            TokenKind::LeftBrace => self.parse_block(),

            TokenKind::If => self.parse_if(),

            TokenKind::Identifier if self.peek_nth(1).kind == TokenKind::Arrow => self.parse_lambda(),

            TokenKind::Identifier => self.parse_ident(),

            TokenKind::SelfKw => {
                self.advance();
                Ok(self.arena.alloc(Expr::Ident(IdentExpr {
                    ident: Ident::new(token.lexeme, token.span),
                    type_args: &[],
                    span: token.span,
                })))
            }

            TokenKind::Eof => Err(ParseError::unexpected_eof(token.span)),

            _ => Err(ParseError::expected_expression(token.span, token.kind.description())),
        }
    }

    fn literal(&self, kind: LiteralKind<'ast>, span: abra_core::Span) -> &'ast Expr<'ast> {
        self.arena.alloc(Expr::Literal(LiteralExpr { kind, span }))
    }

    /// Parse an identifier, with explicit type arguments when it is
    /// immediately called: `identity<Int>(1)`.
    fn parse_ident(&mut self) -> Result<&'ast Expr<'ast>, ParseError> {
        let token = self.advance();
        let ident = Ident::new(token.lexeme, token.span);

        let mut type_args: &'ast [crate::ast::TypeExpr<'ast>] = &[];
        if self.check(TokenKind::Less) && !self.peek().newline_before {
            let saved = self.position;
            match self.try_parse_call_type_args() {
                Some(args) => type_args = args,
                None => self.position = saved,
            }
        }

        Ok(self.arena.alloc(Expr::Ident(IdentExpr {
            ident,
            type_args,
            span: self.span_from(token.span),
        })))
    }

    /// Speculatively parse `<T, ...>` followed by `(`; None means this `<`
    /// is a comparison.
    fn try_parse_call_type_args(&mut self) -> Option<&'ast [crate::ast::TypeExpr<'ast>]> {
        self.advance(); // '<'
        let mut args = Vec::new();
        loop {
            args.push(self.parse_type().ok()?);
            if self.eat(TokenKind::Comma).is_none() {
                break;
            }
        }
        self.eat(TokenKind::Greater)?;
        let next = self.peek();
        if next.kind != TokenKind::LeftParen || next.newline_before {
            return None;
        }
        let args: &'ast [crate::ast::TypeExpr<'ast>] = self.arena.alloc_slice_copy(&args);
        Some(args)
    }

    /// Parse `"text $ident ${expr} text"` from its string tokens.
    fn parse_interpolation(&mut self) -> Result<&'ast Expr<'ast>, ParseError> {
        let start = self.advance();
        let mut parts = Vec::new();
        if !start.lexeme.is_empty() {
            parts.push(InterpolationPart::Text(start.lexeme));
        }

        loop {
            let expr = self.nested(|p| p.parse_expr(0))?;
            parts.push(InterpolationPart::Expr(expr));

            let token = *self.peek();
            match token.kind {
                TokenKind::StringPart | TokenKind::StringEnd => {
                    self.advance();
                    if !token.lexeme.is_empty() {
                        parts.push(InterpolationPart::Text(token.lexeme));
                    }
                    if token.kind == TokenKind::StringEnd {
                        break;
                    }
                }
                TokenKind::Eof => return Err(ParseError::unexpected_eof(token.span)),
                _ => {
                    return Err(ParseError::expected_token(
                        token.span,
                        "'}' to close the interpolation",
                        token.kind.description(),
                    ));
                }
            }
        }

        Ok(self.arena.alloc(Expr::Interpolation(self.arena.alloc(InterpolationExpr {
            parts: self.arena.alloc_slice_copy(&parts),
            span: self.span_from(start.span),
        }))))
    }

    /// Parse an array literal `[a, b, c]`.
    fn parse_array(&mut self) -> Result<&'ast Expr<'ast>, ParseError> {
        let start = self.advance().span;
        let elements = self.nested(|p| {
            let mut elements = Vec::new();
            while !p.check(TokenKind::RightBracket) && !p.is_eof() {
                elements.push(p.parse_expr(0)?);
                if p.eat(TokenKind::Comma).is_none() {
                    break;
                }
            }
            p.expect(TokenKind::RightBracket)?;
            Ok::<_, ParseError>(elements)
        })?;

        Ok(self.arena.alloc(Expr::Array(self.arena.alloc(ArrayExpr {
            elements: self.arena.alloc_slice_copy(&elements),
            span: self.span_from(start),
        }))))
    }

    /// Parse member access: `.name` or `?.name`.
    fn parse_member_access(&mut self, object: &'ast Expr<'ast>) -> Result<&'ast Expr<'ast>, ParseError> {
        let optional = self.advance().kind == TokenKind::QuestionDot;
        let member = self.expect_ident()?;

        let mut type_args: &'ast [crate::ast::TypeExpr<'ast>] = &[];
        if self.check(TokenKind::Less) && !self.peek().newline_before {
            let saved = self.position;
            match self.try_parse_call_type_args() {
                Some(args) => type_args = args,
                None => self.position = saved,
            }
        }

        Ok(self.arena.alloc(Expr::Member(self.arena.alloc(MemberExpr {
            object,
            member: Ident::new(member.lexeme, member.span),
            type_args,
            optional,
            span: self.span_from(object.span()),
        }))))
    }

    /// Parse a call's argument list.
    fn parse_call(&mut self, callee: &'ast Expr<'ast>) -> Result<&'ast Expr<'ast>, ParseError> {
        let args = self.parse_arguments()?;
        Ok(self.arena.alloc(Expr::Call(self.arena.alloc(CallExpr {
            callee,
            args,
            span: self.span_from(callee.span()),
        }))))
    }

    /// Parse `(arg, name: arg, ...)`.
    pub(super) fn parse_arguments(&mut self) -> Result<&'ast [Argument<'ast>], ParseError> {
        self.expect(TokenKind::LeftParen)?;
        let args = self.nested(|p| {
            let mut args = Vec::new();
            while !p.check(TokenKind::RightParen) && !p.is_eof() {
                let start = p.peek().span;
                let name = if p.check(TokenKind::Identifier) && p.peek_nth(1).kind == TokenKind::Colon {
                    let name = p.advance();
                    p.advance(); // ':'
                    Some(Ident::new(name.lexeme, name.span))
                } else {
                    None
                };
                let value = p.parse_expr(0)?;
                args.push(Argument {
                    name,
                    value,
                    span: start.merge(value.span()),
                });
                if p.eat(TokenKind::Comma).is_none() {
                    break;
                }
            }
            p.expect(TokenKind::RightParen)?;
            Ok::<_, ParseError>(args)
        })?;
        let args: &'ast [Argument<'ast>] = self.arena.alloc_slice_copy(&args);
        Ok(args)
    }

    /// Parse an index `[expr]`.
    fn parse_index(&mut self, object: &'ast Expr<'ast>) -> Result<&'ast Expr<'ast>, ParseError> {
        self.advance(); // '['
        let index = self.nested(|p| p.parse_expr(0))?;
        self.expect(TokenKind::RightBracket)?;
        Ok(self.arena.alloc(Expr::Index(self.arena.alloc(IndexExpr {
            object,
            index,
            span: self.span_from(object.span()),
        }))))
    }

    /// Parse a lambda: `x => body` or `(a: Int, b = 1) => body`.
    fn parse_lambda(&mut self) -> Result<&'ast Expr<'ast>, ParseError> {
        let start = self.peek().span;
        let params: &'ast [crate::ast::Param<'ast>] = if self.check(TokenKind::Identifier) {
            let token = self.advance();
            let param = crate::ast::Param {
                name: Ident::new(token.lexeme, token.span),
                ty: None,
                default: None,
                is_self: false,
                span: token.span,
            };
            self.arena.alloc_slice_copy(&[param])
        } else {
            self.parse_params(false)?
        };
        self.expect(TokenKind::Arrow)?;
        let body = self.unnested(|p| p.parse_expr(0))?;

        Ok(self.arena.alloc(Expr::Lambda(self.arena.alloc(LambdaExpr {
            params,
            body,
            span: start.merge(body.span()),
        }))))
    }

    /// Parse a block `{ ... }` as an expression.
    pub(super) fn parse_block(&mut self) -> Result<&'ast Expr<'ast>, ParseError> {
        self.deeper(|p| {
            let start = p.expect(TokenKind::LeftBrace)?.span;
            let stmts = p.unnested(|p| p.parse_block_statements())?;
            p.expect(TokenKind::RightBrace)?;

            let block: &'ast Expr<'ast> = p.arena.alloc(Expr::Block(p.arena.alloc(BlockExpr {
                stmts,
                span: p.span_from(start),
            })));
            Ok(block)
        })
    }

    /// Parse `if cond (|binding|)? then (else otherwise)?`.
    fn parse_if(&mut self) -> Result<&'ast Expr<'ast>, ParseError> {
        let start = self.advance().span;
        let condition = self.parse_expr(0)?;
        let binding = self.parse_condition_binding()?;
        let then_branch = self.parse_branch()?;

        let else_branch = if self.eat(TokenKind::Else).is_some() {
            Some(self.parse_branch()?)
        } else {
            None
        };

        Ok(self.arena.alloc(Expr::If(self.arena.alloc(IfExpr {
            condition,
            binding,
            then_branch,
            else_branch,
            span: self.span_from(start),
        }))))
    }

    /// Parse an `if` branch. A bare `break` or `continue` is read as a block
    /// holding just that statement.
    fn parse_branch(&mut self) -> Result<&'ast Expr<'ast>, ParseError> {
        let token = *self.peek();
        let stmt = match token.kind {
            TokenKind::Break => Stmt::Break(token.span),
            TokenKind::Continue => Stmt::Continue(token.span),
            _ => return self.parse_expr(0),
        };
        self.advance();
        let stmts: &'ast [Stmt<'ast>] = self.arena.alloc_slice_copy(&[stmt]);
        Ok(self.arena.alloc(Expr::Block(self.arena.alloc(BlockExpr {
            stmts,
            span: token.span,
        }))))
    }

    /// Parse an optional `|name|` after an `if`/`while` condition.
    pub(super) fn parse_condition_binding(&mut self) -> Result<Option<Ident<'ast>>, ParseError> {
        if self.eat(TokenKind::Pipe).is_none() {
            return Ok(None);
        }
        let name = self.expect_ident()?;
        self.expect(TokenKind::Pipe)?;
        Ok(Some(Ident::new(name.lexeme, name.span)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Param, Stmt};
    use bumpalo::Bump;

    fn parse<'a>(source: &str, arena: &'a Bump) -> &'a Expr<'a> {
        Parser::expression(source, arena).unwrap_or_else(|e| panic!("{source}: {e}"))
    }

    fn binary<'a>(expr: &'a Expr<'a>) -> &'a BinaryExpr<'a> {
        match expr {
            Expr::Binary(b) => b,
            other => panic!("expected binary, got {other:?}"),
        }
    }

    #[test]
    fn multiplication_binds_tighter() {
        let arena = Bump::new();
        let expr = binary(parse("1 + 2 * 3", &arena));
        assert_eq!(expr.op, BinaryOp::Add);
        assert_eq!(binary(expr.right).op, BinaryOp::Mul);
    }

    #[test]
    fn subtraction_is_left_associative() {
        let arena = Bump::new();
        let expr = binary(parse("1 - 2 - 3", &arena));
        assert_eq!(binary(expr.left).op, BinaryOp::Sub);
    }

    #[test]
    fn coalesce_precedence() {
        let arena = Bump::new();
        // Arithmetic binds tighter; comparison looser.
        let expr = binary(parse("a ?: b + 1 == c", &arena));
        assert_eq!(expr.op, BinaryOp::Equal);
        let coalesce = binary(expr.left);
        assert_eq!(coalesce.op, BinaryOp::Coalesce);
        assert_eq!(binary(coalesce.right).op, BinaryOp::Add);

        let chained = binary(parse("a ?: b ?: c", &arena));
        assert_eq!(binary(chained.right).op, BinaryOp::Coalesce);
    }

    #[test]
    fn unary_and_postfix() {
        let arena = Bump::new();
        let expr = parse("-a.b(1)[0]", &arena);
        let Expr::Unary(unary) = expr else { panic!("expected unary") };
        assert_eq!(unary.op, UnaryOp::Neg);
        assert!(matches!(unary.operand, Expr::Index(_)));
    }

    #[test]
    fn optional_member_chain() {
        let arena = Bump::new();
        let Expr::Member(member) = parse("a?.b.c", &arena) else { panic!() };
        assert!(!member.optional);
        let Expr::Member(inner) = member.object else { panic!() };
        assert!(inner.optional);
        assert_eq!(inner.member.name, "b");
    }

    #[test]
    fn named_arguments() {
        let arena = Bump::new();
        let Expr::Call(call) = parse("Person(name: \"Ken\", age: 30)", &arena) else { panic!() };
        assert_eq!(call.args.len(), 2);
        assert_eq!(call.args[0].name.map(|n| n.name), Some("name"));
        assert_eq!(call.args[1].name.map(|n| n.name), Some("age"));
    }

    #[test]
    fn explicit_type_arguments_only_before_call() {
        let arena = Bump::new();
        let Expr::Call(call) = parse("identity<Int>(1)", &arena) else { panic!() };
        let Expr::Ident(ident) = call.callee else { panic!() };
        assert_eq!(ident.type_args.len(), 1);

        let cmp = binary(parse("a < b", &arena));
        assert_eq!(cmp.op, BinaryOp::Less);
        let chained = binary(parse("a < b && c > d", &arena));
        assert_eq!(chained.op, BinaryOp::And);
    }

    #[test]
    fn explicit_type_arguments_on_method_call() {
        let arena = Bump::new();
        let Expr::Call(call) = parse("list.map<Int>(item => item.length)", &arena) else { panic!() };
        let Expr::Member(member) = call.callee else { panic!() };
        assert_eq!(member.member.name, "map");
        assert_eq!(member.type_args.len(), 1);
    }

    #[test]
    fn lambdas() {
        let arena = Bump::new();
        let Expr::Lambda(single) = parse("x => x + 1", &arena) else { panic!() };
        assert_eq!(single.params.len(), 1);

        let Expr::Lambda(multi) = parse("(a: Int, b = 2) => a * b", &arena) else { panic!() };
        let params: &[Param] = multi.params;
        assert!(params[0].ty.is_some());
        assert!(params[1].default.is_some());

        let Expr::Lambda(empty) = parse("() => { 1 }", &arena) else { panic!() };
        assert!(empty.params.is_empty());
        assert!(matches!(empty.body, Expr::Block(_)));

        assert!(matches!(parse("(a + b)", &arena), Expr::Paren(_)));
    }

    #[test]
    fn interpolation_parts() {
        let arena = Bump::new();
        let Expr::Interpolation(interp) = parse("\"Hi $name, ${1 + 2}!\"", &arena) else { panic!() };
        assert_eq!(interp.parts.len(), 5);
        assert_eq!(interp.parts[0], InterpolationPart::Text("Hi "));
        assert!(matches!(interp.parts[3], InterpolationPart::Expr(Expr::Binary(_))));
        assert_eq!(interp.parts[4], InterpolationPart::Text("!"));
    }

    #[test]
    fn if_expression_forms() {
        let arena = Bump::new();
        let Expr::If(expr) = parse("if (n == 0) 0 else if n == 1 { 1 } else 2", &arena) else { panic!() };
        assert!(matches!(expr.condition, Expr::Paren(_)));
        assert!(matches!(expr.else_branch, Some(Expr::If(_))));

        let Expr::If(binding) = parse("if opt |v| v else 0", &arena) else { panic!() };
        assert_eq!(binding.binding.map(|b| b.name), Some("v"));
    }

    #[test]
    fn block_tail_is_last_expression() {
        let arena = Bump::new();
        let Expr::Block(block) = parse("{\n val x = 1\n x + 1\n}", &arena) else { panic!() };
        assert_eq!(block.stmts.len(), 2);
        assert!(matches!(block.stmts[0], Stmt::Binding(_)));
        assert!(block.tail().is_some());
    }

    #[test]
    fn line_break_inside_brackets_is_ignored() {
        let arena = Bump::new();
        let Expr::Array(array) = parse("[1,\n 2\n + 3]", &arena) else { panic!() };
        assert_eq!(array.elements.len(), 2);
        assert!(matches!(array.elements[1], Expr::Binary(_)));
    }

    #[test]
    fn method_chain_continues_on_next_line() {
        let arena = Bump::new();
        let expr = parse("list\n  .push(1)", &arena);
        assert!(matches!(expr, Expr::Call(_)));
    }

    #[test]
    fn invalid_assignment_target() {
        let arena = Bump::new();
        let errors = Parser::expression("1 = 2", &arena).unwrap_err();
        assert_eq!(errors.first().map(|e| e.kind), Some(ParseErrorKind::InvalidAssignmentTarget));
        let errors = Parser::expression("a?.b = 2", &arena).unwrap_err();
        assert_eq!(errors.first().map(|e| e.kind), Some(ParseErrorKind::InvalidAssignmentTarget));
    }

    #[test]
    fn integer_overflow_is_reported() {
        let arena = Bump::new();
        let errors = Parser::expression("99999999999999999999", &arena).unwrap_err();
        assert_eq!(errors.first().map(|e| e.kind), Some(ParseErrorKind::InvalidLiteral));
    }

    #[test]
    fn deep_parentheses_stop_at_the_nesting_limit() {
        let arena = Bump::new();
        let source = format!("{}1{}", "(".repeat(20_000), ")".repeat(20_000));
        let errors = Parser::expression(&source, &arena).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.first().map(|e| e.kind), Some(ParseErrorKind::NestingTooDeep));
    }

    #[test]
    fn long_operator_chains_count_as_nesting() {
        let arena = Bump::new();
        let short = format!("x{}", " + 1".repeat(20));
        assert!(matches!(parse(&short, &arena), Expr::Binary(_)));

        let long = format!("x{}", " + 1".repeat(200));
        let errors = Parser::expression(&long, &arena).unwrap_err();
        assert_eq!(errors.first().map(|e| e.kind), Some(ParseErrorKind::NestingTooDeep));

        let calls = format!("f{}", "()".repeat(200));
        let errors = Parser::expression(&calls, &arena).unwrap_err();
        assert_eq!(errors.first().map(|e| e.kind), Some(ParseErrorKind::NestingTooDeep));
    }

    #[test]
    fn deep_blocks_stop_at_the_nesting_limit() {
        let arena = Bump::new();
        let source = format!("{}1{}", "{\n".repeat(500), "\n}".repeat(500));
        let (_, errors) = Parser::parse_lenient(&source, &arena);
        assert_eq!(errors.first().map(|e| e.kind), Some(ParseErrorKind::NestingTooDeep));

        let nested = format!("{}1{}", "{\n".repeat(10), "\n}".repeat(10));
        assert!(Parser::parse(&nested, &arena).is_ok());
    }

    #[test]
    fn loop_control_can_be_an_if_branch() {
        let arena = Bump::new();
        let Expr::If(if_expr) = parse("if i > 5 break else continue", &arena) else {
            panic!("expected if");
        };
        let Expr::Block(then_block) = if_expr.then_branch else {
            panic!("expected a block, got {:?}", if_expr.then_branch);
        };
        assert!(matches!(then_block.stmts, [Stmt::Break(_)]));
        assert!(matches!(
            if_expr.else_branch,
            Some(Expr::Block(BlockExpr { stmts: [Stmt::Continue(_)], .. }))
        ));
    }
}
