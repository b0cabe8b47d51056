// LK recursive-descent parser.
//
// One token of look-ahead over the lexed stream. The surface sugars are
// rewritten while parsing: `x++`/`x--` and `x <op>= y` become plain
// assignments, `class Name {..}` becomes a local bound to a map
// constructor, and `fn recv:name(..)` gains its implicit `self` parameter.
// Binary expressions fold constants as they are built.

use smol_str::SmolStr;

use super::ast::*;
use super::fold::{fold_binop, fold_unop};
use super::lexer::{Lexer, Token, TokenKind};

pub struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    chunk_name: &'a str,
}

/// Parse a source chunk into its implicit vararg function body.
pub fn parse(source: &str, chunk_name: &str) -> Result<Block, String> {
    let tokens = Lexer::new(source, chunk_name).tokenize()?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        chunk_name,
    };
    let block = parser.parse_block_body()?;
    parser.expect(TokenKind::TkEof)?;
    Ok(block)
}

impl<'a> Parser<'a> {
    fn current(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn kind(&self) -> TokenKind {
        self.current().kind
    }

    fn line(&self) -> u32 {
        self.current().line
    }

    fn peek_kind(&self) -> TokenKind {
        self.tokens
            .get(self.pos + 1)
            .map(|t| t.kind)
            .unwrap_or(TokenKind::TkEof)
    }

    fn advance(&mut self) -> Token {
        let t = self.current().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        t
    }

    fn accept(&mut self, kind: TokenKind) -> bool {
        if self.kind() == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, String> {
        if self.kind() == kind {
            Ok(self.advance())
        } else {
            Err(self.error(format!(
                "{} expected near {}",
                kind.describe(),
                self.kind().describe()
            )))
        }
    }

    fn error(&self, msg: impl AsRef<str>) -> String {
        format!("{}:{}: {}", self.chunk_name, self.line(), msg.as_ref())
    }

    fn expect_name(&mut self) -> Result<SmolStr, String> {
        let t = self.expect(TokenKind::TkName)?;
        Ok(t.lexeme)
    }

    // ---- blocks and statements ----

    fn block_ends(&self) -> bool {
        matches!(self.kind(), TokenKind::TkRightBrace | TokenKind::TkEof)
    }

    /// Statement list up to the end of the surrounding block, with an
    /// optional terminating `rt [explist] [;]`.
    fn parse_block_body(&mut self) -> Result<Block, String> {
        let mut block = Block::default();
        loop {
            if self.block_ends() {
                break;
            }
            if self.kind() == TokenKind::TkRt {
                let line = self.line();
                self.advance();
                let exprs = if self.block_ends() || self.kind() == TokenKind::TkSemicolon {
                    Vec::new()
                } else {
                    self.parse_exprlist()?
                };
                self.accept(TokenKind::TkSemicolon);
                if !self.block_ends() {
                    return Err(self.error("'rt' must be the last statement of a block"));
                }
                block.ret = Some(Return { exprs, line });
                break;
            }
            if let Some(stat) = self.parse_stat()? {
                block.stats.push(stat);
            }
        }
        Ok(block)
    }

    fn parse_braced_block(&mut self) -> Result<Block, String> {
        self.expect(TokenKind::TkLeftBrace)?;
        let block = self.parse_block_body()?;
        self.expect(TokenKind::TkRightBrace)?;
        Ok(block)
    }

    fn parse_stat(&mut self) -> Result<Option<Stat>, String> {
        match self.kind() {
            TokenKind::TkSemicolon => {
                self.advance();
                Ok(None)
            }
            TokenKind::TkBreak => {
                let line = self.line();
                self.advance();
                Ok(Some(Stat::Break(line)))
            }
            TokenKind::TkWhile => {
                let line = self.line();
                self.advance();
                let cond = self.parse_expr()?;
                let body = self.parse_braced_block()?;
                Ok(Some(Stat::While { cond, body, line }))
            }
            TokenKind::TkFor => self.parse_for().map(Some),
            TokenKind::TkIf => self.parse_if().map(Some),
            TokenKind::TkFn if self.peek_kind() == TokenKind::TkName => {
                self.parse_fn_stat().map(Some)
            }
            TokenKind::TkShy => self.parse_shy().map(Some),
            TokenKind::TkClass => {
                let line = self.line();
                self.advance();
                let name = self.expect_name()?;
                if self.kind() != TokenKind::TkLeftBrace {
                    return Err(self.error("'{' expected after class name"));
                }
                let ctor = self.parse_table_ctor()?;
                Ok(Some(Stat::Local {
                    names: vec![name],
                    values: vec![ctor],
                    line,
                }))
            }
            _ => self.parse_expr_stat().map(Some),
        }
    }

    fn parse_for(&mut self) -> Result<Stat, String> {
        let line = self.line();
        self.advance();
        let first = self.expect_name()?;
        if self.kind() == TokenKind::TkAssign {
            // numeric: for name = init, limit [, step] { block }
            self.advance();
            let init = self.parse_expr()?;
            self.expect(TokenKind::TkComma)?;
            let limit = self.parse_expr()?;
            let step = if self.accept(TokenKind::TkComma) {
                Some(self.parse_expr()?)
            } else {
                None
            };
            let body = self.parse_braced_block()?;
            Ok(Stat::NumericFor {
                var: first,
                init,
                limit,
                step,
                body,
                line,
            })
        } else {
            let mut names = vec![first];
            while self.accept(TokenKind::TkComma) {
                names.push(self.expect_name()?);
            }
            self.expect(TokenKind::TkIn)?;
            let exprs = self.parse_exprlist()?;
            let body = self.parse_braced_block()?;
            Ok(Stat::GenericFor {
                names,
                exprs,
                body,
                line,
            })
        }
    }

    fn parse_if(&mut self) -> Result<Stat, String> {
        let line = self.line();
        self.advance();
        let mut arms = Vec::new();
        let cond = self.parse_expr()?;
        let body = self.parse_braced_block()?;
        arms.push((cond, body));
        let mut else_block = None;
        loop {
            match self.kind() {
                TokenKind::TkElif => {
                    self.advance();
                    let cond = self.parse_expr()?;
                    let body = self.parse_braced_block()?;
                    arms.push((cond, body));
                }
                TokenKind::TkElse => {
                    self.advance();
                    else_block = Some(self.parse_braced_block()?);
                    break;
                }
                _ => break,
            }
        }
        Ok(Stat::If {
            arms,
            else_block,
            line,
        })
    }

    /// `fn name(..)`, `fn recv.name(..)`, `fn recv:name(..)` - sugar for
    /// an assignment of a function expression. The `:` form prepends the
    /// implicit `self` parameter.
    fn parse_fn_stat(&mut self) -> Result<Stat, String> {
        let line = self.line();
        self.advance();
        let first = self.expect_name()?;
        let mut target = Expr::Name(first.clone());
        let mut debug_name = first.to_string();
        let mut is_method = false;
        loop {
            match self.kind() {
                TokenKind::TkDot => {
                    self.advance();
                    let field = self.expect_name()?;
                    debug_name.push('.');
                    debug_name.push_str(&field);
                    target = Expr::Index {
                        obj: Box::new(target),
                        key: Box::new(Expr::Str(field)),
                    };
                }
                TokenKind::TkColon => {
                    self.advance();
                    let method = self.expect_name()?;
                    debug_name.push(':');
                    debug_name.push_str(&method);
                    target = Expr::Index {
                        obj: Box::new(target),
                        key: Box::new(Expr::Str(method)),
                    };
                    is_method = true;
                    break;
                }
                _ => break,
            }
        }
        let body = self.parse_fn_rest(Some(SmolStr::new(&debug_name)), is_method)?;
        Ok(Stat::Assign {
            targets: vec![target],
            values: vec![Expr::Function(Box::new(body))],
            line,
        })
    }

    fn parse_shy(&mut self) -> Result<Stat, String> {
        let line = self.line();
        self.advance();
        if self.accept(TokenKind::TkFn) {
            let name = self.expect_name()?;
            let body = self.parse_fn_rest(Some(name.clone()), false)?;
            return Ok(Stat::LocalFunction {
                name,
                body: Box::new(body),
                line,
            });
        }
        let mut names = vec![self.expect_name()?];
        while self.accept(TokenKind::TkComma) {
            names.push(self.expect_name()?);
        }
        let values = if self.accept(TokenKind::TkAssign) {
            self.parse_exprlist()?
        } else {
            Vec::new()
        };
        Ok(Stat::Local {
            names,
            values,
            line,
        })
    }

    /// Parameter list and body, shared by every function form.
    /// `=> expr` is equivalent to `{ rt expr }`.
    fn parse_fn_rest(&mut self, name: Option<SmolStr>, is_method: bool) -> Result<FuncBody, String> {
        let line = self.line();
        self.expect(TokenKind::TkLeftParen)?;
        let mut params = Vec::new();
        if is_method {
            params.push(SmolStr::new("self"));
        }
        let mut is_vararg = false;
        if self.kind() != TokenKind::TkRightParen {
            loop {
                match self.kind() {
                    TokenKind::TkDots => {
                        self.advance();
                        is_vararg = true;
                        break;
                    }
                    TokenKind::TkName => params.push(self.advance().lexeme),
                    _ => return Err(self.error("parameter name expected")),
                }
                if !self.accept(TokenKind::TkComma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::TkRightParen)?;
        let body = if self.accept(TokenKind::TkArrow) {
            let ret_line = self.line();
            let expr = self.parse_expr()?;
            Block {
                stats: Vec::new(),
                ret: Some(Return {
                    exprs: vec![expr],
                    line: ret_line,
                }),
            }
        } else {
            self.parse_braced_block()?
        };
        Ok(FuncBody {
            name,
            params,
            is_vararg,
            body,
            line,
        })
    }

    /// Expression statements, plain/multi assignment, `:=` definitions,
    /// compound assignment and `++`/`--`.
    fn parse_expr_stat(&mut self) -> Result<Stat, String> {
        let line = self.line();
        let first = self.parse_suffixed_expr()?;

        match self.kind() {
            TokenKind::TkAssign | TokenKind::TkComma => {
                let mut targets = vec![first];
                while self.accept(TokenKind::TkComma) {
                    targets.push(self.parse_suffixed_expr()?);
                }
                for t in &targets {
                    self.check_assignable(t)?;
                }
                if self.accept(TokenKind::TkDefine) {
                    // a, b := f() - every target must be a fresh name
                    let names = self.targets_as_names(&targets)?;
                    let values = self.parse_exprlist()?;
                    return Ok(Stat::Local {
                        names,
                        values,
                        line,
                    });
                }
                self.expect(TokenKind::TkAssign)?;
                let values = self.parse_exprlist()?;
                Ok(Stat::Assign {
                    targets,
                    values,
                    line,
                })
            }
            TokenKind::TkDefine => {
                self.advance();
                let names = self.targets_as_names(&[first])?;
                let values = self.parse_exprlist()?;
                Ok(Stat::Local {
                    names,
                    values,
                    line,
                })
            }
            TokenKind::TkPlusPlus | TokenKind::TkMinusMinus => {
                let op = if self.advance().kind == TokenKind::TkPlusPlus {
                    BinOp::Add
                } else {
                    BinOp::Sub
                };
                self.check_assignable(&first)?;
                let value = fold_binop(op, first.clone(), Expr::Int(1), line);
                Ok(Stat::Assign {
                    targets: vec![first],
                    values: vec![value],
                    line,
                })
            }
            TokenKind::TkPlusEq
            | TokenKind::TkMinusEq
            | TokenKind::TkMulEq
            | TokenKind::TkDivEq
            | TokenKind::TkModEq
            | TokenKind::TkPowEq
            | TokenKind::TkCoalEq => {
                let op = match self.advance().kind {
                    TokenKind::TkPlusEq => BinOp::Add,
                    TokenKind::TkMinusEq => BinOp::Sub,
                    TokenKind::TkMulEq => BinOp::Mul,
                    TokenKind::TkDivEq => BinOp::Div,
                    TokenKind::TkModEq => BinOp::Mod,
                    TokenKind::TkPowEq => BinOp::Pow,
                    TokenKind::TkCoalEq => BinOp::Coalesce,
                    _ => unreachable!(),
                };
                self.check_assignable(&first)?;
                let rhs = self.parse_expr()?;
                let value = fold_binop(op, first.clone(), rhs, line);
                Ok(Stat::Assign {
                    targets: vec![first],
                    values: vec![value],
                    line,
                })
            }
            _ => {
                if !matches!(first, Expr::Call { .. } | Expr::MethodCall { .. }) {
                    return Err(self.error("syntax error: expression is not a statement"));
                }
                Ok(Stat::Expr(first))
            }
        }
    }

    fn check_assignable(&self, e: &Expr) -> Result<(), String> {
        match e {
            Expr::Name(_) | Expr::Index { .. } => Ok(()),
            _ => Err(self.error("cannot assign to this expression")),
        }
    }

    fn targets_as_names(&self, targets: &[Expr]) -> Result<Vec<SmolStr>, String> {
        targets
            .iter()
            .map(|t| match t {
                Expr::Name(n) => Ok(n.clone()),
                _ => Err(self.error("':=' requires plain names on the left")),
            })
            .collect()
    }

    // ---- expressions ----

    fn parse_exprlist(&mut self) -> Result<Vec<Expr>, String> {
        let mut exprs = vec![self.parse_expr()?];
        while self.accept(TokenKind::TkComma) {
            exprs.push(self.parse_expr()?);
        }
        Ok(exprs)
    }

    /// Lowest level: `??`, then the ternary, then everything else.
    pub(crate) fn parse_expr(&mut self) -> Result<Expr, String> {
        let mut e = self.parse_ternary()?;
        while self.kind() == TokenKind::TkCoalesce {
            let line = self.line();
            self.advance();
            let rhs = self.parse_ternary()?;
            e = fold_binop(BinOp::Coalesce, e, rhs, line);
        }
        Ok(e)
    }

    fn parse_ternary(&mut self) -> Result<Expr, String> {
        let cond = self.parse_bin_expr(0)?;
        if self.accept(TokenKind::TkQuestion) {
            let then_expr = self.parse_ternary()?;
            self.expect(TokenKind::TkColon)?;
            let else_expr = self.parse_ternary()?;
            Ok(Expr::Ternary {
                cond: Box::new(cond),
                then_expr: Box::new(then_expr),
                else_expr: Box::new(else_expr),
            })
        } else {
            Ok(cond)
        }
    }

    /// Precedence-climbing over binary operators; `^` is right-associative
    /// and binds tighter than unary on its right operand.
    fn parse_bin_expr(&mut self, limit: u8) -> Result<Expr, String> {
        const UNARY_PRIORITY: u8 = 12;

        let mut left = match self.kind() {
            TokenKind::TkNot => {
                let line = self.line();
                self.advance();
                let operand = self.parse_bin_expr(UNARY_PRIORITY)?;
                fold_unop(UnOp::Not, operand, line)
            }
            TokenKind::TkMinus => {
                let line = self.line();
                self.advance();
                let operand = self.parse_bin_expr(UNARY_PRIORITY)?;
                fold_unop(UnOp::Neg, operand, line)
            }
            TokenKind::TkLen => {
                let line = self.line();
                self.advance();
                let operand = self.parse_bin_expr(UNARY_PRIORITY)?;
                fold_unop(UnOp::Len, operand, line)
            }
            TokenKind::TkTilde => {
                let line = self.line();
                self.advance();
                let operand = self.parse_bin_expr(UNARY_PRIORITY)?;
                fold_unop(UnOp::BNot, operand, line)
            }
            _ => self.parse_simple_expr()?,
        };

        while let Some((op, lpri, rpri)) = binop_priority(self.kind()) {
            if lpri <= limit {
                break;
            }
            let line = self.line();
            self.advance();
            let right = self.parse_bin_expr(rpri)?;
            left = fold_binop(op, left, right, line);
        }
        Ok(left)
    }

    fn parse_simple_expr(&mut self) -> Result<Expr, String> {
        match self.kind() {
            TokenKind::TkNil => {
                self.advance();
                Ok(Expr::Nil)
            }
            TokenKind::TkTrue => {
                self.advance();
                Ok(Expr::True)
            }
            TokenKind::TkFalse => {
                self.advance();
                Ok(Expr::False)
            }
            TokenKind::TkDots => {
                self.advance();
                Ok(Expr::Vararg)
            }
            TokenKind::TkNumber => {
                let t = self.advance();
                parse_number(&t.lexeme)
                    .ok_or_else(|| format!("{}:{}: malformed number", self.chunk_name, t.line))
            }
            TokenKind::TkString => {
                let t = self.advance();
                Ok(Expr::Str(t.lexeme))
            }
            TokenKind::TkLeftBrace => self.parse_table_ctor(),
            TokenKind::TkLeftBracket => self.parse_array_ctor(),
            TokenKind::TkFn => {
                self.advance();
                let body = self.parse_fn_rest(None, false)?;
                Ok(Expr::Function(Box::new(body)))
            }
            _ => self.parse_suffixed_expr(),
        }
    }

    fn parse_primary_expr(&mut self) -> Result<Expr, String> {
        match self.kind() {
            TokenKind::TkName => Ok(Expr::Name(self.advance().lexeme)),
            TokenKind::TkLeftParen => {
                self.advance();
                let e = self.parse_expr()?;
                self.expect(TokenKind::TkRightParen)?;
                Ok(e)
            }
            _ => Err(self.error(format!(
                "unexpected symbol near {}",
                self.kind().describe()
            ))),
        }
    }

    fn parse_suffixed_expr(&mut self) -> Result<Expr, String> {
        let mut e = self.parse_primary_expr()?;
        loop {
            match self.kind() {
                TokenKind::TkDot => {
                    self.advance();
                    let field = self.expect_name()?;
                    e = Expr::Index {
                        obj: Box::new(e),
                        key: Box::new(Expr::Str(field)),
                    };
                }
                TokenKind::TkLeftBracket => {
                    self.advance();
                    let key = self.parse_expr()?;
                    self.expect(TokenKind::TkRightBracket)?;
                    e = Expr::Index {
                        obj: Box::new(e),
                        key: Box::new(key),
                    };
                }
                TokenKind::TkColon if self.peek_kind() == TokenKind::TkName => {
                    // Only a method call when arguments follow; a bare
                    // colon belongs to an enclosing ternary.
                    if self.tokens.get(self.pos + 2).map(|t| t.kind)
                        != Some(TokenKind::TkLeftParen)
                    {
                        break;
                    }
                    let line = self.line();
                    self.advance();
                    let name = self.expect_name()?;
                    let args = self.parse_call_args()?;
                    e = Expr::MethodCall {
                        obj: Box::new(e),
                        name,
                        args,
                        line,
                    };
                }
                TokenKind::TkLeftParen => {
                    let line = self.line();
                    let args = self.parse_call_args()?;
                    e = Expr::Call {
                        func: Box::new(e),
                        args,
                        line,
                    };
                }
                _ => break,
            }
        }
        Ok(e)
    }

    fn parse_call_args(&mut self) -> Result<Vec<Expr>, String> {
        self.expect(TokenKind::TkLeftParen)?;
        let args = if self.kind() == TokenKind::TkRightParen {
            Vec::new()
        } else {
            self.parse_exprlist()?
        };
        self.expect(TokenKind::TkRightParen)?;
        Ok(args)
    }

    /// `{ [exp]: v, name: v, 'lit': v, positional, ... }`
    fn parse_table_ctor(&mut self) -> Result<Expr, String> {
        self.expect(TokenKind::TkLeftBrace)?;
        let mut items = Vec::new();
        while self.kind() != TokenKind::TkRightBrace {
            let item = match self.kind() {
                TokenKind::TkLeftBracket => {
                    self.advance();
                    let key = self.parse_expr()?;
                    self.expect(TokenKind::TkRightBracket)?;
                    self.expect(TokenKind::TkColon)?;
                    let value = self.parse_expr()?;
                    TableItem::Keyed { key, value }
                }
                TokenKind::TkName if self.peek_kind() == TokenKind::TkColon => {
                    let key = self.advance().lexeme;
                    self.advance();
                    let value = self.parse_expr()?;
                    TableItem::Named { key, value }
                }
                TokenKind::TkString if self.peek_kind() == TokenKind::TkColon => {
                    let key = self.advance().lexeme;
                    self.advance();
                    let value = self.parse_expr()?;
                    TableItem::Named { key, value }
                }
                _ => TableItem::Positional(self.parse_expr()?),
            };
            items.push(item);
            if !self.accept(TokenKind::TkComma) {
                break;
            }
        }
        self.expect(TokenKind::TkRightBrace)?;
        Ok(Expr::Table(items))
    }

    /// `[a, b, c]` - positional-only array constructor.
    fn parse_array_ctor(&mut self) -> Result<Expr, String> {
        self.expect(TokenKind::TkLeftBracket)?;
        let mut items = Vec::new();
        while self.kind() != TokenKind::TkRightBracket {
            items.push(self.parse_expr()?);
            if !self.accept(TokenKind::TkComma) {
                break;
            }
        }
        self.expect(TokenKind::TkRightBracket)?;
        Ok(Expr::Array(items))
    }
}

/// Binary operator priorities (left, right); `^` is right-associative.
fn binop_priority(kind: TokenKind) -> Option<(BinOp, u8, u8)> {
    let entry = match kind {
        TokenKind::TkOr => (BinOp::Or, 2, 2),
        TokenKind::TkAnd => (BinOp::And, 3, 3),
        TokenKind::TkEq => (BinOp::Eq, 4, 4),
        TokenKind::TkNe => (BinOp::Ne, 4, 4),
        TokenKind::TkLt => (BinOp::Lt, 4, 4),
        TokenKind::TkLe => (BinOp::Le, 4, 4),
        TokenKind::TkGt => (BinOp::Gt, 4, 4),
        TokenKind::TkGe => (BinOp::Ge, 4, 4),
        TokenKind::TkBitOr => (BinOp::BOr, 5, 5),
        TokenKind::TkTilde => (BinOp::BXor, 6, 6),
        TokenKind::TkBitAnd => (BinOp::BAnd, 7, 7),
        TokenKind::TkShl => (BinOp::Shl, 8, 8),
        TokenKind::TkShr => (BinOp::Shr, 8, 8),
        TokenKind::TkPlus => (BinOp::Add, 10, 10),
        TokenKind::TkMinus => (BinOp::Sub, 10, 10),
        TokenKind::TkMul => (BinOp::Mul, 11, 11),
        TokenKind::TkDiv => (BinOp::Div, 11, 11),
        TokenKind::TkIDiv => (BinOp::IDiv, 11, 11),
        TokenKind::TkMod => (BinOp::Mod, 11, 11),
        TokenKind::TkPow => (BinOp::Pow, 14, 13),
        _ => return None,
    };
    Some(entry)
}

/// Numeric literal classification: integer parse first, then float.
pub fn parse_number(raw: &str) -> Option<Expr> {
    if let Some(hex) = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        if !hex.contains('.') && !hex.contains('p') && !hex.contains('P') {
            // Hex integers wrap like 64-bit two's-complement.
            return u64::from_str_radix(hex, 16).ok().map(|v| Expr::Int(v as i64));
        }
        return parse_hex_float(hex).map(Expr::Float);
    }
    if !raw.contains('.') && !raw.contains('e') && !raw.contains('E') {
        if let Ok(i) = raw.parse::<i64>() {
            return Some(Expr::Int(i));
        }
    }
    raw.parse::<f64>().ok().map(Expr::Float)
}

/// Hex float: mantissa in hex digits with optional fraction, optional
/// binary exponent `p`/`P`.
fn parse_hex_float(s: &str) -> Option<f64> {
    let (mantissa_str, exp) = match s.find(['p', 'P']) {
        Some(i) => (&s[..i], s[i + 1..].parse::<i32>().ok()?),
        None => (s, 0),
    };
    let mut value = 0.0f64;
    let mut frac_scale = 1.0f64;
    let mut seen_dot = false;
    let mut any = false;
    for c in mantissa_str.chars() {
        if c == '.' {
            if seen_dot {
                return None;
            }
            seen_dot = true;
            continue;
        }
        let d = c.to_digit(16)? as f64;
        any = true;
        if seen_dot {
            frac_scale /= 16.0;
            value += d * frac_scale;
        } else {
            value = value * 16.0 + d;
        }
    }
    if !any {
        return None;
    }
    Some(value * 2f64.powi(exp))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(src: &str) -> Block {
        parse(src, "test").unwrap()
    }

    #[test]
    fn precedence_shapes() {
        let b = parse_ok("x = a + b * c");
        let Stat::Assign { values, .. } = &b.stats[0] else {
            panic!()
        };
        let Expr::BinOp { op: BinOp::Add, rhs, .. } = &values[0] else {
            panic!("expected + at the top: {:?}", values[0])
        };
        assert!(matches!(**rhs, Expr::BinOp { op: BinOp::Mul, .. }));
    }

    #[test]
    fn pow_is_right_assoc_and_tight() {
        let b = parse_ok("x = -a ^ b");
        let Stat::Assign { values, .. } = &b.stats[0] else {
            panic!()
        };
        // -a^b parses as -(a^b)
        assert!(matches!(
            &values[0],
            Expr::UnOp { op: UnOp::Neg, .. }
        ));
    }

    #[test]
    fn increments_desugar_to_assignment() {
        let b = parse_ok("i := 0 i++ i -= 2");
        assert!(matches!(&b.stats[0], Stat::Local { .. }));
        let Stat::Assign { values, .. } = &b.stats[1] else {
            panic!()
        };
        assert!(matches!(
            &values[0],
            Expr::BinOp { op: BinOp::Add, .. }
        ));
        let Stat::Assign { values, .. } = &b.stats[2] else {
            panic!()
        };
        assert!(matches!(
            &values[0],
            Expr::BinOp { op: BinOp::Sub, .. }
        ));
    }

    #[test]
    fn class_desugars_to_local_map() {
        let b = parse_ok("class V { 'x': 0 }");
        let Stat::Local { names, values, .. } = &b.stats[0] else {
            panic!()
        };
        assert_eq!(names[0], "V");
        assert!(matches!(&values[0], Expr::Table(items) if items.len() == 1));
    }

    #[test]
    fn method_definition_gains_self() {
        let b = parse_ok("fn V:__add(o) { rt o }");
        let Stat::Assign { values, .. } = &b.stats[0] else {
            panic!()
        };
        let Expr::Function(body) = &values[0] else {
            panic!()
        };
        assert_eq!(body.params, vec!["self", "o"]);
    }

    #[test]
    fn ternary_and_coalesce_nest() {
        let b = parse_ok("x = a ?? b ? c : d");
        let Stat::Assign { values, .. } = &b.stats[0] else {
            panic!()
        };
        // ?? binds loosest: a ?? (b ? c : d)
        assert!(matches!(
            &values[0],
            Expr::BinOp { op: BinOp::Coalesce, .. }
        ));
    }

    #[test]
    fn method_call_vs_ternary_colon() {
        let b = parse_ok("x = c ? o:m(1) : o.f");
        assert!(matches!(&b.stats[0], Stat::Assign { .. }));
        let b = parse_ok("x = c ? a : b");
        let Stat::Assign { values, .. } = &b.stats[0] else {
            panic!()
        };
        assert!(matches!(&values[0], Expr::Ternary { .. }));
    }

    #[test]
    fn arrow_function_is_return_sugar() {
        let b = parse_ok("f := fn(x) => x + 1");
        let Stat::Local { values, .. } = &b.stats[0] else {
            panic!()
        };
        let Expr::Function(body) = &values[0] else {
            panic!()
        };
        assert!(body.body.stats.is_empty());
        assert_eq!(body.body.ret.as_ref().unwrap().exprs.len(), 1);
    }

    #[test]
    fn number_classification() {
        assert_eq!(parse_number("42"), Some(Expr::Int(42)));
        assert_eq!(parse_number("0x10"), Some(Expr::Int(16)));
        assert_eq!(parse_number("3.5"), Some(Expr::Float(3.5)));
        assert_eq!(parse_number("1e2"), Some(Expr::Float(100.0)));
        assert_eq!(parse_number("0x1p4"), Some(Expr::Float(16.0)));
        assert_eq!(parse_number("0x1.8p1"), Some(Expr::Float(3.0)));
        // Integer overflow falls back to float
        assert_eq!(
            parse_number("99999999999999999999"),
            Some(Expr::Float(1e20))
        );
    }

    #[test]
    fn rt_must_be_last() {
        assert!(parse("rt 1 x = 2", "t").is_err());
        assert!(parse("fn f() { rt 1 }", "t").is_ok());
    }

    #[test]
    fn roundtrip_through_pretty_printer() {
        let src = r#"
            shy a, b = 1, 2.5
            fn outer(x, ...) {
                t := {'k': x, [a]: b, 99}
                u := [1, 2, 3]
                while a < 10 { a++ }
                for i = 0, 4, 2 { b += i }
                for k, v in t { u[0] = v }
                if a == 1 { b = 2 } elif a { b = 3 } else { b = 4 }
                rt fn(y) => y ^ 2, t.k, t:m(1), not b, #u, -(a), ...
            }
            print(outer(1, 'x') ?? (a ? b : a))
        "#;
        let mut first = parse(src, "t").unwrap();
        let printed = first.to_source();
        let mut second =
            parse(&printed, "t").unwrap_or_else(|e| panic!("reparse failed: {}\n{}", e, printed));
        first.strip_lines();
        second.strip_lines();
        assert_eq!(first, second);
    }
}
