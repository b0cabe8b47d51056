// Abstract syntax tree for LK.
//
// The parser produces desugared nodes only: `++`, compound assignment and
// `class` never reach this level, and method definitions already carry
// their implicit `self` parameter. Line numbers ride along for codegen
// debug info; `strip_lines` zeroes them so tests can compare structures.

use smol_str::SmolStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    IDiv,
    Mod,
    Pow,
    BAnd,
    BOr,
    BXor,
    Shl,
    Shr,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Coalesce,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Not,
    Len,
    BNot,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Nil,
    True,
    False,
    Int(i64),
    Float(f64),
    Str(SmolStr),
    Vararg,
    Name(SmolStr),
    Index {
        obj: Box<Expr>,
        key: Box<Expr>,
    },
    Call {
        func: Box<Expr>,
        args: Vec<Expr>,
        line: u32,
    },
    MethodCall {
        obj: Box<Expr>,
        name: SmolStr,
        args: Vec<Expr>,
        line: u32,
    },
    Function(Box<FuncBody>),
    /// `{ ... }` constructor: keyed and positional fields.
    Table(Vec<TableItem>),
    /// `[ ... ]` constructor: positional only.
    Array(Vec<Expr>),
    BinOp {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        line: u32,
    },
    UnOp {
        op: UnOp,
        operand: Box<Expr>,
        line: u32,
    },
    Ternary {
        cond: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum TableItem {
    Positional(Expr),
    /// `name: exp` or `'literal': exp`.
    Named { key: SmolStr, value: Expr },
    /// `[exp]: exp`.
    Keyed { key: Expr, value: Expr },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FuncBody {
    pub name: Option<SmolStr>,
    pub params: Vec<SmolStr>,
    pub is_vararg: bool,
    pub body: Block,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Block {
    pub stats: Vec<Stat>,
    /// Trailing `rt [explist]`, when present.
    pub ret: Option<Return>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Return {
    pub exprs: Vec<Expr>,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stat {
    /// Function-call expression in statement position.
    Expr(Expr),
    Assign {
        targets: Vec<Expr>,
        values: Vec<Expr>,
        line: u32,
    },
    /// `shy a, b = ...` or `a := ...`.
    Local {
        names: Vec<SmolStr>,
        values: Vec<Expr>,
        line: u32,
    },
    /// `shy fn name(...)`: the local is in scope inside its own body.
    LocalFunction {
        name: SmolStr,
        body: Box<FuncBody>,
        line: u32,
    },
    If {
        /// `if` plus any number of `elif` arms.
        arms: Vec<(Expr, Block)>,
        else_block: Option<Block>,
        line: u32,
    },
    While {
        cond: Expr,
        body: Block,
        line: u32,
    },
    NumericFor {
        var: SmolStr,
        init: Expr,
        limit: Expr,
        step: Option<Expr>,
        body: Block,
        line: u32,
    },
    GenericFor {
        names: Vec<SmolStr>,
        exprs: Vec<Expr>,
        body: Block,
        line: u32,
    },
    Break(u32),
}

impl Expr {
    pub fn strip_lines(&mut self) {
        match self {
            Expr::Index { obj, key } => {
                obj.strip_lines();
                key.strip_lines();
            }
            Expr::Call { func, args, line } => {
                *line = 0;
                func.strip_lines();
                args.iter_mut().for_each(Expr::strip_lines);
            }
            Expr::MethodCall {
                obj, args, line, ..
            } => {
                *line = 0;
                obj.strip_lines();
                args.iter_mut().for_each(Expr::strip_lines);
            }
            Expr::Function(body) => body.strip_lines(),
            Expr::Table(items) => {
                for item in items {
                    match item {
                        TableItem::Positional(e) | TableItem::Named { value: e, .. } => {
                            e.strip_lines()
                        }
                        TableItem::Keyed { key, value } => {
                            key.strip_lines();
                            value.strip_lines();
                        }
                    }
                }
            }
            Expr::Array(items) => items.iter_mut().for_each(Expr::strip_lines),
            Expr::BinOp { lhs, rhs, line, .. } => {
                *line = 0;
                lhs.strip_lines();
                rhs.strip_lines();
            }
            Expr::UnOp { operand, line, .. } => {
                *line = 0;
                operand.strip_lines();
            }
            Expr::Ternary {
                cond,
                then_expr,
                else_expr,
            } => {
                cond.strip_lines();
                then_expr.strip_lines();
                else_expr.strip_lines();
            }
            _ => {}
        }
    }
}

impl FuncBody {
    pub fn strip_lines(&mut self) {
        self.line = 0;
        self.body.strip_lines();
    }
}

impl Block {
    pub fn strip_lines(&mut self) {
        self.stats.iter_mut().for_each(Stat::strip_lines);
        if let Some(ret) = &mut self.ret {
            ret.line = 0;
            ret.exprs.iter_mut().for_each(Expr::strip_lines);
        }
    }
}

impl Stat {
    pub fn strip_lines(&mut self) {
        match self {
            Stat::Expr(e) => e.strip_lines(),
            Stat::Assign {
                targets,
                values,
                line,
            } => {
                *line = 0;
                targets.iter_mut().for_each(Expr::strip_lines);
                values.iter_mut().for_each(Expr::strip_lines);
            }
            Stat::Local { values, line, .. } => {
                *line = 0;
                values.iter_mut().for_each(Expr::strip_lines);
            }
            Stat::LocalFunction { body, line, .. } => {
                *line = 0;
                body.strip_lines();
            }
            Stat::If {
                arms,
                else_block,
                line,
            } => {
                *line = 0;
                for (cond, block) in arms {
                    cond.strip_lines();
                    block.strip_lines();
                }
                if let Some(b) = else_block {
                    b.strip_lines();
                }
            }
            Stat::While { cond, body, line } => {
                *line = 0;
                cond.strip_lines();
                body.strip_lines();
            }
            Stat::NumericFor {
                init,
                limit,
                step,
                body,
                line,
                ..
            } => {
                *line = 0;
                init.strip_lines();
                limit.strip_lines();
                if let Some(s) = step {
                    s.strip_lines();
                }
                body.strip_lines();
            }
            Stat::GenericFor {
                exprs, body, line, ..
            } => {
                *line = 0;
                exprs.iter_mut().for_each(Expr::strip_lines);
                body.strip_lines();
            }
            Stat::Break(line) => *line = 0,
        }
    }
}

// ---- Pretty printer ----
// Emits desugared LK source with full parenthesisation, so that parsing
// the output reproduces the tree.

impl BinOp {
    fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::IDiv => "~/",
            BinOp::Mod => "%",
            BinOp::Pow => "^",
            BinOp::BAnd => "&",
            BinOp::BOr => "|",
            BinOp::BXor => "~",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::And => "and",
            BinOp::Or => "or",
            BinOp::Coalesce => "??",
        }
    }
}

fn quote_str(s: &str, out: &mut String) {
    out.push('\'');
    for c in s.chars() {
        match c {
            '\'' => out.push_str("\\'"),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('\'');
}

fn write_exprs(exprs: &[Expr], out: &mut String) {
    for (i, e) in exprs.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        e.write_source(out);
    }
}

impl Expr {
    pub fn to_source(&self) -> String {
        let mut out = String::new();
        self.write_source(&mut out);
        out
    }

    fn write_source(&self, out: &mut String) {
        match self {
            Expr::Nil => out.push_str("nil"),
            Expr::True => out.push_str("true"),
            Expr::False => out.push_str("false"),
            Expr::Int(i) => out.push_str(&i.to_string()),
            Expr::Float(f) => {
                if f.fract() == 0.0 && f.is_finite() {
                    out.push_str(&format!("{:.1}", f));
                } else {
                    out.push_str(&format!("{}", f));
                }
            }
            Expr::Str(s) => quote_str(s, out),
            Expr::Vararg => out.push_str("..."),
            Expr::Name(n) => out.push_str(n),
            Expr::Index { obj, key } => {
                obj.write_source(out);
                out.push('[');
                key.write_source(out);
                out.push(']');
            }
            Expr::Call { func, args, .. } => {
                func.write_source(out);
                out.push('(');
                write_exprs(args, out);
                out.push(')');
            }
            Expr::MethodCall {
                obj, name, args, ..
            } => {
                obj.write_source(out);
                out.push(':');
                out.push_str(name);
                out.push('(');
                write_exprs(args, out);
                out.push(')');
            }
            Expr::Function(body) => body.write_source(out),
            Expr::Table(items) => {
                out.push('{');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    match item {
                        TableItem::Positional(e) => e.write_source(out),
                        TableItem::Named { key, value } => {
                            quote_str(key, out);
                            out.push_str(": ");
                            value.write_source(out);
                        }
                        TableItem::Keyed { key, value } => {
                            out.push('[');
                            key.write_source(out);
                            out.push_str("]: ");
                            value.write_source(out);
                        }
                    }
                }
                out.push('}');
            }
            Expr::Array(items) => {
                out.push('[');
                write_exprs(items, out);
                out.push(']');
            }
            Expr::BinOp { op, lhs, rhs, .. } => {
                out.push('(');
                lhs.write_source(out);
                out.push(' ');
                out.push_str(op.symbol());
                out.push(' ');
                rhs.write_source(out);
                out.push(')');
            }
            Expr::UnOp { op, operand, .. } => {
                out.push('(');
                match op {
                    UnOp::Neg => out.push('-'),
                    UnOp::Not => out.push_str("not "),
                    UnOp::Len => out.push('#'),
                    UnOp::BNot => out.push('~'),
                }
                operand.write_source(out);
                out.push(')');
            }
            Expr::Ternary {
                cond,
                then_expr,
                else_expr,
            } => {
                out.push('(');
                cond.write_source(out);
                out.push_str(" ? ");
                then_expr.write_source(out);
                out.push_str(" : ");
                else_expr.write_source(out);
                out.push(')');
            }
        }
    }
}

impl FuncBody {
    fn write_source(&self, out: &mut String) {
        out.push_str("fn(");
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            out.push_str(p);
        }
        if self.is_vararg {
            if !self.params.is_empty() {
                out.push_str(", ");
            }
            out.push_str("...");
        }
        out.push_str(") ");
        self.body.write_block(out);
    }
}

impl Block {
    pub fn to_source(&self) -> String {
        // Top-level chunk: statements without the surrounding braces.
        let mut out = String::new();
        for stat in &self.stats {
            stat.write_source(&mut out);
            out.push('\n');
        }
        if let Some(ret) = &self.ret {
            out.push_str("rt ");
            write_exprs(&ret.exprs, &mut out);
            out.push('\n');
        }
        out
    }

    fn write_block(&self, out: &mut String) {
        out.push_str("{\n");
        for stat in &self.stats {
            stat.write_source(out);
            out.push('\n');
        }
        if let Some(ret) = &self.ret {
            out.push_str("rt ");
            write_exprs(&ret.exprs, out);
            out.push('\n');
        }
        out.push('}');
    }
}

impl Stat {
    fn write_source(&self, out: &mut String) {
        match self {
            Stat::Expr(e) => e.write_source(out),
            Stat::Assign {
                targets, values, ..
            } => {
                write_exprs(targets, out);
                out.push_str(" = ");
                write_exprs(values, out);
            }
            Stat::Local { names, values, .. } => {
                out.push_str("shy ");
                for (i, n) in names.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    out.push_str(n);
                }
                if !values.is_empty() {
                    out.push_str(" = ");
                    write_exprs(values, out);
                }
            }
            Stat::LocalFunction { name, body, .. } => {
                out.push_str("shy fn ");
                out.push_str(name);
                out.push('(');
                for (i, p) in body.params.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    out.push_str(p);
                }
                if body.is_vararg {
                    if !body.params.is_empty() {
                        out.push_str(", ");
                    }
                    out.push_str("...");
                }
                out.push_str(") ");
                body.body.write_block(out);
            }
            Stat::If {
                arms, else_block, ..
            } => {
                for (i, (cond, block)) in arms.iter().enumerate() {
                    out.push_str(if i == 0 { "if " } else { " elif " });
                    cond.write_source(out);
                    out.push(' ');
                    block.write_block(out);
                }
                if let Some(b) = else_block {
                    out.push_str(" else ");
                    b.write_block(out);
                }
            }
            Stat::While { cond, body, .. } => {
                out.push_str("while ");
                cond.write_source(out);
                out.push(' ');
                body.write_block(out);
            }
            Stat::NumericFor {
                var,
                init,
                limit,
                step,
                body,
                ..
            } => {
                out.push_str("for ");
                out.push_str(var);
                out.push_str(" = ");
                init.write_source(out);
                out.push_str(", ");
                limit.write_source(out);
                if let Some(s) = step {
                    out.push_str(", ");
                    s.write_source(out);
                }
                out.push(' ');
                body.write_block(out);
            }
            Stat::GenericFor {
                names, exprs, body, ..
            } => {
                out.push_str("for ");
                for (i, n) in names.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    out.push_str(n);
                }
                out.push_str(" in ");
                write_exprs(exprs, out);
                out.push(' ');
                body.write_block(out);
            }
            Stat::Break(_) => out.push_str("break"),
        }
    }
}
