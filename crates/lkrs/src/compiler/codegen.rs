// Bytecode generation.
//
// Walks the AST emitting Lua-5.3-layout instructions. Registers come from
// a simple high-water counter: locals sit at the bottom of the frame in
// declaration order, temporaries above them and released as soon as an
// expression finishes. Upvalue resolution walks the enclosing function
// states, capturing parent locals on first use; unresolved names compile
// to `_ENV` table accesses.

use smol_str::SmolStr;
use std::rc::Rc;

use super::ast::*;
use super::func_state::{ConstKey, FuncState, MAX_REGS, UpvalInfo};
use crate::lk_value::{LkValue, Proto, UpvalDesc};
use crate::lk_vm::opcode::{FIELDS_PER_FLUSH, Instruction, OpCode};
use crate::lk_vm::{LkVm, MULTRET};

pub(crate) struct Codegen<'vm> {
    vm: &'vm mut LkVm,
    chunk_name: SmolStr,
    fstack: Vec<FuncState>,
}

enum VarKind {
    Local(u32),
    Upval(u32),
    Global,
}

enum StoreTarget {
    Local(u32),
    Upval(u32),
    Global { env: u32, key: u32 },
    Index { obj: u32, key: u32 },
}

pub(crate) fn r#gen(vm: &mut LkVm, block: &Block, chunk_name: &str) -> Result<Rc<Proto>, String> {
    let mut cg = Codegen {
        vm,
        chunk_name: SmolStr::new(chunk_name),
        fstack: Vec::new(),
    };
    // The chunk is an implicit vararg function with `_ENV` as upvalue 0.
    let mut root = FuncState::new(0, true, 0);
    root.upvalues.push(UpvalInfo {
        name: SmolStr::new("_ENV"),
        in_stack: true,
        index: 0,
    });
    cg.fstack.push(root);
    cg.fs_mut().begin_scope(false);
    cg.compile_block_contents(block)?;
    cg.fs_mut().end_scope();
    if block.ret.is_none() {
        cg.emit(Instruction::create_abc(OpCode::Return, 0, 1, 0));
    }
    let fs = cg.fstack.pop().unwrap();
    Ok(Rc::new(cg.build_proto(fs)))
}

impl<'vm> Codegen<'vm> {
    fn fs(&self) -> &FuncState {
        self.fstack.last().unwrap()
    }

    fn fs_mut(&mut self) -> &mut FuncState {
        self.fstack.last_mut().unwrap()
    }

    fn err(&self, msg: impl AsRef<str>) -> String {
        format!(
            "{}:{}: {}",
            self.chunk_name,
            self.fs().cur_line,
            msg.as_ref()
        )
    }

    fn set_line(&mut self, line: u32) {
        if line > 0 {
            self.fs_mut().cur_line = line;
        }
    }

    fn pc(&self) -> usize {
        self.fs().code.len()
    }

    fn emit(&mut self, i: u32) -> usize {
        let fs = self.fs_mut();
        fs.code.push(i);
        fs.line_info.push(fs.cur_line);
        fs.code.len() - 1
    }

    fn reserve(&mut self, n: u32) -> Result<(), String> {
        let fs = self.fs_mut();
        fs.freereg += n;
        if fs.freereg > MAX_REGS {
            return Err(self.err("function or expression needs too many registers"));
        }
        let fs = self.fs_mut();
        if fs.freereg > fs.max_stack {
            fs.max_stack = fs.freereg;
        }
        Ok(())
    }

    // ---- jumps ----

    fn emit_jmp(&mut self) -> usize {
        self.emit(Instruction::create_asbx(OpCode::Jmp, 0, 0))
    }

    fn patch_jump(&mut self, jmp_pc: usize, target: usize) {
        let sbx = target as i32 - jmp_pc as i32 - 1;
        Instruction::set_sbx(&mut self.fs_mut().code[jmp_pc], sbx);
    }

    fn patch_jump_close(&mut self, jmp_pc: usize, target: usize, close_a: Option<u32>) {
        self.patch_jump(jmp_pc, target);
        if let Some(a) = close_a {
            Instruction::set_a(&mut self.fs_mut().code[jmp_pc], a);
        }
    }

    // ---- constants ----

    fn add_const(&mut self, v: LkValue) -> u32 {
        self.fs_mut().add_const(v)
    }

    fn const_of_expr(&mut self, e: &Expr) -> Option<LkValue> {
        match e {
            Expr::Nil => Some(LkValue::Nil),
            Expr::True => Some(LkValue::Bool(true)),
            Expr::False => Some(LkValue::Bool(false)),
            Expr::Int(i) => Some(LkValue::Int(*i)),
            Expr::Float(f) => Some(LkValue::Float(*f)),
            Expr::Str(s) => {
                let id = self.vm.intern(s);
                Some(LkValue::Str(id))
            }
            _ => None,
        }
    }

    fn emit_loadk(&mut self, reg: u32, idx: u32) {
        if idx <= Instruction::MAX_BX {
            self.emit(Instruction::create_abx(OpCode::LoadK, reg, idx));
        } else {
            self.emit(Instruction::create_abx(OpCode::LoadKx, reg, 0));
            self.emit(Instruction::create_ax(OpCode::ExtraArg, idx));
        }
    }

    /// RK operand for a constant value; spills to a register when the
    /// constant index is out of RK range.
    fn rk_of_value(&mut self, v: LkValue) -> Result<u32, String> {
        debug_assert!(ConstKey::of(&v).is_some());
        let idx = self.add_const(v);
        if idx <= Instruction::MAX_INDEX_RK {
            Ok(Instruction::rk_const(idx))
        } else {
            let reg = self.fs().freereg;
            self.reserve(1)?;
            self.emit_loadk(reg, idx);
            Ok(reg)
        }
    }

    // ---- variables ----

    fn resolve_var(&mut self, name: &str) -> VarKind {
        let top = self.fstack.len() - 1;
        if let Some(r) = self.fstack[top].find_local(name) {
            return VarKind::Local(r);
        }
        match self.resolve_upvalue_at(top, name) {
            Ok(Some(u)) => VarKind::Upval(u),
            _ => VarKind::Global,
        }
    }

    fn resolve_upvalue_at(&mut self, level: usize, name: &str) -> Result<Option<u32>, String> {
        if let Some(i) = self.fstack[level]
            .upvalues
            .iter()
            .position(|u| u.name == name)
        {
            return Ok(Some(i as u32));
        }
        if level == 0 {
            return Ok(None);
        }
        if let Some(preg) = self.fstack[level - 1].find_local(name) {
            self.fstack[level - 1].mark_captured(preg);
            return self.push_upvalue(level, name, true, preg);
        }
        if let Some(pidx) = self.resolve_upvalue_at(level - 1, name)? {
            return self.push_upvalue(level, name, false, pidx);
        }
        Ok(None)
    }

    fn push_upvalue(
        &mut self,
        level: usize,
        name: &str,
        in_stack: bool,
        index: u32,
    ) -> Result<Option<u32>, String> {
        let ups = &mut self.fstack[level].upvalues;
        if ups.len() >= 256 {
            return Err(self.err("too many upvalues"));
        }
        ups.push(UpvalInfo {
            name: SmolStr::new(name),
            in_stack,
            index: index as u8,
        });
        Ok(Some((ups.len() - 1) as u32))
    }

    /// Upvalue index of `_ENV` in the current function (created on use).
    fn env_upval(&mut self) -> Result<u32, String> {
        let top = self.fstack.len() - 1;
        self.resolve_upvalue_at(top, "_ENV")?
            .ok_or_else(|| self.err("no '_ENV' in scope"))
    }

    // ---- expressions ----

    fn expr_to_next_reg(&mut self, e: &Expr) -> Result<u32, String> {
        let reg = self.fs().freereg;
        self.reserve(1)?;
        self.expr_to_reg(e, reg)?;
        Ok(reg)
    }

    /// Register already holding the value when possible (plain locals),
    /// otherwise a fresh temporary.
    fn expr_to_any_reg(&mut self, e: &Expr) -> Result<u32, String> {
        if let Expr::Name(n) = e {
            if let VarKind::Local(r) = self.resolve_var(n) {
                return Ok(r);
            }
        }
        self.expr_to_next_reg(e)
    }

    /// RK operand: constants go through the pool, locals are used in
    /// place, anything else lands in a temporary.
    fn expr_to_rk(&mut self, e: &Expr) -> Result<u32, String> {
        if let Some(v) = self.const_of_expr(e) {
            return self.rk_of_value(v);
        }
        self.expr_to_any_reg(e)
    }

    fn expr_to_reg(&mut self, e: &Expr, target: u32) -> Result<(), String> {
        match e {
            Expr::Nil => {
                self.emit(Instruction::create_abc(OpCode::LoadNil, target, 0, 0));
            }
            Expr::True => {
                self.emit(Instruction::create_abc(OpCode::LoadBool, target, 1, 0));
            }
            Expr::False => {
                self.emit(Instruction::create_abc(OpCode::LoadBool, target, 0, 0));
            }
            Expr::Int(_) | Expr::Float(_) | Expr::Str(_) => {
                let v = self.const_of_expr(e).unwrap();
                let idx = self.add_const(v);
                self.emit_loadk(target, idx);
            }
            Expr::Vararg => {
                self.emit(Instruction::create_abc(OpCode::Vararg, target, 2, 0));
            }
            Expr::Name(n) => {
                let name = n.clone();
                match self.resolve_var(&name) {
                    VarKind::Local(r) => {
                        if r != target {
                            self.emit(Instruction::create_abc(OpCode::Move, target, r, 0));
                        }
                    }
                    VarKind::Upval(u) => {
                        self.emit(Instruction::create_abc(OpCode::GetUpval, target, u, 0));
                    }
                    VarKind::Global => {
                        let env = self.env_upval()?;
                        let id = self.vm.intern(&name);
                        let saved = self.fs().freereg;
                        let kk = self.rk_of_value(LkValue::Str(id))?;
                        self.emit(Instruction::create_abc(OpCode::GetTabUp, target, env, kk));
                        self.fs_mut().freereg = saved;
                    }
                }
            }
            Expr::Index { obj, key } => {
                let saved = self.fs().freereg;
                let rb = self.expr_to_any_reg(obj)?;
                let rc = self.expr_to_rk(key)?;
                self.emit(Instruction::create_abc(OpCode::GetTable, target, rb, rc));
                self.fs_mut().freereg = saved;
            }
            Expr::Call { .. } | Expr::MethodCall { .. } => {
                let saved = self.fs().freereg;
                let fbase = self.compile_call(e, 1, false)?;
                self.fs_mut().freereg = saved;
                if fbase != target {
                    self.emit(Instruction::create_abc(OpCode::Move, target, fbase, 0));
                }
            }
            Expr::Function(body) => {
                let pidx = self.compile_function(body)?;
                self.emit(Instruction::create_abx(OpCode::Closure, target, pidx));
            }
            Expr::Table(items) => {
                self.ctor_to_reg(items, target)?;
            }
            Expr::Array(items) => {
                let items: Vec<TableItem> = items
                    .iter()
                    .cloned()
                    .map(TableItem::Positional)
                    .collect();
                self.ctor_to_reg(&items, target)?;
            }
            Expr::BinOp { op, lhs, rhs, line } => {
                self.set_line(*line);
                self.binop_to_reg(*op, lhs, rhs, target)?;
            }
            Expr::UnOp { op, operand, line } => {
                self.set_line(*line);
                let saved = self.fs().freereg;
                let rb = self.expr_to_any_reg(operand)?;
                let opcode = match op {
                    UnOp::Neg => OpCode::Unm,
                    UnOp::Not => OpCode::Not,
                    UnOp::Len => OpCode::Len,
                    UnOp::BNot => OpCode::BNot,
                };
                self.emit(Instruction::create_abc(opcode, target, rb, 0));
                self.fs_mut().freereg = saved;
            }
            Expr::Ternary {
                cond,
                then_expr,
                else_expr,
            } => {
                let else_jmp = self.cond_false_jump(cond)?;
                self.expr_to_reg(then_expr, target)?;
                let end_jmp = self.emit_jmp();
                let here = self.pc();
                self.patch_jump(else_jmp, here);
                self.expr_to_reg(else_expr, target)?;
                let here = self.pc();
                self.patch_jump(end_jmp, here);
            }
        }
        Ok(())
    }

    fn binop_to_reg(
        &mut self,
        op: BinOp,
        lhs: &Expr,
        rhs: &Expr,
        target: u32,
    ) -> Result<(), String> {
        match op {
            BinOp::Add
            | BinOp::Sub
            | BinOp::Mul
            | BinOp::Div
            | BinOp::IDiv
            | BinOp::Mod
            | BinOp::Pow
            | BinOp::BAnd
            | BinOp::BOr
            | BinOp::BXor
            | BinOp::Shl
            | BinOp::Shr => {
                let opcode = match op {
                    BinOp::Add => OpCode::Add,
                    BinOp::Sub => OpCode::Sub,
                    BinOp::Mul => OpCode::Mul,
                    BinOp::Div => OpCode::Div,
                    BinOp::IDiv => OpCode::IDiv,
                    BinOp::Mod => OpCode::Mod,
                    BinOp::Pow => OpCode::Pow,
                    BinOp::BAnd => OpCode::BAnd,
                    BinOp::BOr => OpCode::BOr,
                    BinOp::BXor => OpCode::BXor,
                    BinOp::Shl => OpCode::Shl,
                    BinOp::Shr => OpCode::Shr,
                    _ => unreachable!(),
                };
                let saved = self.fs().freereg;
                let rb = self.expr_to_rk(lhs)?;
                let rc = self.expr_to_rk(rhs)?;
                self.emit(Instruction::create_abc(opcode, target, rb, rc));
                self.fs_mut().freereg = saved;
            }
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
                // [cmp][Jmp +1][LoadBool false, skip][LoadBool true]
                let (opcode, a, swap) = match op {
                    BinOp::Eq => (OpCode::Eq, 1, false),
                    BinOp::Ne => (OpCode::Eq, 0, false),
                    BinOp::Lt => (OpCode::Lt, 1, false),
                    BinOp::Le => (OpCode::Le, 1, false),
                    BinOp::Gt => (OpCode::Lt, 1, true),
                    BinOp::Ge => (OpCode::Le, 1, true),
                    _ => unreachable!(),
                };
                let saved = self.fs().freereg;
                let (l, r) = if swap { (rhs, lhs) } else { (lhs, rhs) };
                let rb = self.expr_to_rk(l)?;
                let rc = self.expr_to_rk(r)?;
                self.emit(Instruction::create_abc(opcode, a, rb, rc));
                self.fs_mut().freereg = saved;
                let jmp = self.emit_jmp();
                self.emit(Instruction::create_abc(OpCode::LoadBool, target, 0, 1));
                let here = self.pc();
                self.patch_jump(jmp, here);
                self.emit(Instruction::create_abc(OpCode::LoadBool, target, 1, 0));
            }
            BinOp::And | BinOp::Or => {
                let c = if op == BinOp::Or { 1 } else { 0 };
                // A local left operand can feed TESTSET directly.
                let mut used_testset = false;
                if let Expr::Name(n) = lhs {
                    if let VarKind::Local(r) = self.resolve_var(n) {
                        if r != target {
                            self.emit(Instruction::create_abc(OpCode::TestSet, target, r, c));
                            used_testset = true;
                        }
                    }
                }
                if !used_testset {
                    self.expr_to_reg(lhs, target)?;
                    self.emit(Instruction::create_abc(OpCode::Test, target, 0, c));
                }
                let end_jmp = self.emit_jmp();
                self.expr_to_reg(rhs, target)?;
                let here = self.pc();
                self.patch_jump(end_jmp, here);
            }
            BinOp::Coalesce => {
                self.expr_to_reg(lhs, target)?;
                let saved = self.fs().freereg;
                let knil = self.rk_of_value(LkValue::Nil)?;
                self.emit(Instruction::create_abc(OpCode::Eq, 0, target, knil));
                self.fs_mut().freereg = saved;
                let end_jmp = self.emit_jmp();
                self.expr_to_reg(rhs, target)?;
                let here = self.pc();
                self.patch_jump(end_jmp, here);
            }
        }
        Ok(())
    }

    /// Emit a conditional jump taken when the condition is false;
    /// comparisons skip the boolean materialisation.
    fn cond_false_jump(&mut self, cond: &Expr) -> Result<usize, String> {
        if let Expr::BinOp { op, lhs, rhs, line } = cond {
            let mapping = match op {
                BinOp::Eq => Some((OpCode::Eq, 0, false)),
                BinOp::Ne => Some((OpCode::Eq, 1, false)),
                BinOp::Lt => Some((OpCode::Lt, 0, false)),
                BinOp::Le => Some((OpCode::Le, 0, false)),
                BinOp::Gt => Some((OpCode::Lt, 0, true)),
                BinOp::Ge => Some((OpCode::Le, 0, true)),
                _ => None,
            };
            if let Some((opcode, a, swap)) = mapping {
                self.set_line(*line);
                let saved = self.fs().freereg;
                let (l, r) = if swap {
                    (rhs.as_ref(), lhs.as_ref())
                } else {
                    (lhs.as_ref(), rhs.as_ref())
                };
                let rb = self.expr_to_rk(l)?;
                let rc = self.expr_to_rk(r)?;
                self.emit(Instruction::create_abc(opcode, a, rb, rc));
                self.fs_mut().freereg = saved;
                return Ok(self.emit_jmp());
            }
        }
        let saved = self.fs().freereg;
        let r = self.expr_to_any_reg(cond)?;
        self.emit(Instruction::create_abc(OpCode::Test, r, 0, 0));
        self.fs_mut().freereg = saved;
        Ok(self.emit_jmp())
    }

    // ---- calls ----

    fn is_multi(e: &Expr) -> bool {
        matches!(
            e,
            Expr::Call { .. } | Expr::MethodCall { .. } | Expr::Vararg
        )
    }

    /// Compile a call at the top of the register stack. Fixed result
    /// counts are reserved; MULTRET leaves the results open at the top.
    fn compile_call(&mut self, e: &Expr, nresults: i32, tail: bool) -> Result<u32, String> {
        let fbase = self.fs().freereg;
        let (args, extra) = match e {
            Expr::Call { func, args, line } => {
                self.set_line(*line);
                self.reserve(1)?;
                self.expr_to_reg(func, fbase)?;
                (args, 0usize)
            }
            Expr::MethodCall {
                obj,
                name,
                args,
                line,
            } => {
                self.set_line(*line);
                self.reserve(2)?;
                self.expr_to_reg(obj, fbase)?;
                let id = self.vm.intern(name);
                let saved = self.fs().freereg;
                let kk = self.rk_of_value(LkValue::Str(id))?;
                self.emit(Instruction::create_abc(OpCode::Self_, fbase, fbase, kk));
                self.fs_mut().freereg = saved;
                (args, 1usize)
            }
            _ => unreachable!("compile_call on a non-call expression"),
        };

        let n = args.len();
        let mut open = false;
        if n > 0 {
            for arg in &args[..n - 1] {
                self.expr_to_next_reg(arg)?;
            }
            let last = &args[n - 1];
            if Self::is_multi(last) {
                self.compile_multi_open(last)?;
                open = true;
            } else {
                self.expr_to_next_reg(last)?;
            }
        }

        let b = if open { 0 } else { (1 + extra + n) as u32 };
        if tail {
            self.emit(Instruction::create_abc(OpCode::TailCall, fbase, b, 0));
            self.emit(Instruction::create_abc(OpCode::Return, fbase, 0, 0));
        } else {
            let c = if nresults < 0 { 0 } else { nresults as u32 + 1 };
            self.emit(Instruction::create_abc(OpCode::Call, fbase, b, c));
        }
        self.fs_mut().freereg = fbase;
        if nresults > 0 {
            self.reserve(nresults as u32)?;
        }
        Ok(fbase)
    }

    /// Compile a multi-valued expression with all results open at top.
    fn compile_multi_open(&mut self, e: &Expr) -> Result<(), String> {
        match e {
            Expr::Call { .. } | Expr::MethodCall { .. } => {
                self.compile_call(e, MULTRET, false)?;
            }
            Expr::Vararg => {
                let reg = self.fs().freereg;
                self.emit(Instruction::create_abc(OpCode::Vararg, reg, 0, 0));
            }
            _ => unreachable!(),
        }
        Ok(())
    }

    /// Compile an expression list into `want` consecutive registers,
    /// expanding or truncating like an assignment right-hand side.
    fn adjust_explist(&mut self, exprs: &[Expr], want: usize) -> Result<u32, String> {
        let base = self.fs().freereg;
        let n = exprs.len();
        if n == 0 {
            if want > 0 {
                self.reserve(want as u32)?;
                self.emit(Instruction::create_abc(
                    OpCode::LoadNil,
                    base,
                    (want - 1) as u32,
                    0,
                ));
            }
            return Ok(base);
        }
        for e in &exprs[..n - 1] {
            self.expr_to_next_reg(e)?;
        }
        let last = &exprs[n - 1];
        let given = n - 1;
        if want > given {
            let need = want - given;
            if Self::is_multi(last) {
                match last {
                    Expr::Vararg => {
                        let reg = self.fs().freereg;
                        self.emit(Instruction::create_abc(
                            OpCode::Vararg,
                            reg,
                            need as u32 + 1,
                            0,
                        ));
                        self.reserve(need as u32)?;
                    }
                    _ => {
                        self.compile_call(last, need as i32, false)?;
                    }
                }
            } else {
                self.expr_to_next_reg(last)?;
                if need > 1 {
                    let fill = self.fs().freereg;
                    self.reserve((need - 1) as u32)?;
                    self.emit(Instruction::create_abc(
                        OpCode::LoadNil,
                        fill,
                        (need - 2) as u32,
                        0,
                    ));
                }
            }
        } else {
            // Surplus expressions still run for their effects.
            self.expr_to_next_reg(last)?;
            self.fs_mut().freereg = base + want as u32;
        }
        Ok(base)
    }

    // ---- constructors ----

    fn ctor_to_reg(&mut self, items: &[TableItem], target: u32) -> Result<(), String> {
        // Constructors fill consecutive registers above the table; build
        // in place only when the target is the top of the stack.
        if target + 1 == self.fs().freereg {
            return self.ctor_build(items, target);
        }
        let treg = self.fs().freereg;
        self.reserve(1)?;
        self.ctor_build(items, treg)?;
        self.emit(Instruction::create_abc(OpCode::Move, target, treg, 0));
        self.fs_mut().freereg = treg;
        Ok(())
    }

    fn emit_setlist(&mut self, treg: u32, b: u32, block: u32) {
        if block <= Instruction::MAX_C {
            self.emit(Instruction::create_abc(OpCode::SetList, treg, b, block));
        } else {
            self.emit(Instruction::create_abc(OpCode::SetList, treg, b, 0));
            self.emit(Instruction::create_ax(OpCode::ExtraArg, block));
        }
    }

    fn ctor_build(&mut self, items: &[TableItem], treg: u32) -> Result<(), String> {
        let npos = items
            .iter()
            .filter(|i| matches!(i, TableItem::Positional(_)))
            .count();
        let nkeyed = items.len() - npos;
        self.emit(Instruction::create_abc(
            OpCode::NewTable,
            treg,
            Instruction::int2fb(npos as u32),
            Instruction::int2fb(nkeyed as u32),
        ));

        let mut pending = 0u32;
        let mut block = 1u32;
        let last_idx = items.len().saturating_sub(1);
        for (idx, item) in items.iter().enumerate() {
            match item {
                TableItem::Positional(e) => {
                    if idx == last_idx && Self::is_multi(e) {
                        self.compile_multi_open(e)?;
                        self.emit_setlist(treg, 0, block);
                        self.fs_mut().freereg = treg + 1;
                        pending = 0;
                    } else {
                        self.expr_to_next_reg(e)?;
                        pending += 1;
                        if pending as usize == FIELDS_PER_FLUSH {
                            self.emit_setlist(treg, pending, block);
                            self.fs_mut().freereg = treg + 1;
                            pending = 0;
                            block += 1;
                        }
                    }
                }
                TableItem::Named { key, value } => {
                    let id = self.vm.intern(key);
                    let saved = self.fs().freereg;
                    let kk = self.rk_of_value(LkValue::Str(id))?;
                    let vv = self.expr_to_rk(value)?;
                    self.emit(Instruction::create_abc(OpCode::SetTable, treg, kk, vv));
                    self.fs_mut().freereg = saved;
                }
                TableItem::Keyed { key, value } => {
                    let saved = self.fs().freereg;
                    let kk = self.expr_to_rk(key)?;
                    let vv = self.expr_to_rk(value)?;
                    self.emit(Instruction::create_abc(OpCode::SetTable, treg, kk, vv));
                    self.fs_mut().freereg = saved;
                }
            }
        }
        if pending > 0 {
            self.emit_setlist(treg, pending, block);
            self.fs_mut().freereg = treg + 1;
        }
        Ok(())
    }

    // ---- functions ----

    fn compile_function(&mut self, body: &FuncBody) -> Result<u32, String> {
        if body.params.len() > 200 {
            return Err(self.err("too many parameters"));
        }
        self.fstack
            .push(FuncState::new(body.params.len() as u8, body.is_vararg, body.line));
        self.fs_mut().begin_scope(false);
        for (i, p) in body.params.iter().enumerate() {
            self.fs_mut().declare_local(p.clone(), i as u32);
        }
        self.fs_mut().freereg = body.params.len() as u32;
        {
            let fs = self.fs_mut();
            if fs.freereg > fs.max_stack {
                fs.max_stack = fs.freereg;
            }
        }
        self.compile_block_contents(&body.body)?;
        self.fs_mut().end_scope();
        if body.body.ret.is_none() {
            self.emit(Instruction::create_abc(OpCode::Return, 0, 1, 0));
        }
        let fs = self.fstack.pop().unwrap();
        let proto = Rc::new(self.build_proto(fs));
        let parent = self.fs_mut();
        parent.protos.push(proto);
        let idx = (parent.protos.len() - 1) as u32;
        if idx > Instruction::MAX_BX {
            return Err(self.err("too many nested functions"));
        }
        Ok(idx)
    }

    fn build_proto(&self, fs: FuncState) -> Proto {
        Proto {
            source: self.chunk_name.clone(),
            line_defined: fs.line_defined,
            last_line_defined: fs.cur_line,
            num_params: fs.num_params,
            is_vararg: fs.is_vararg,
            max_stack_size: fs.max_stack.min(MAX_REGS) as u8,
            code: fs.code,
            constants: fs.constants,
            upvalues: fs
                .upvalues
                .iter()
                .map(|u| UpvalDesc {
                    in_stack: u.in_stack,
                    index: u.index,
                })
                .collect(),
            protos: fs.protos,
            line_info: fs.line_info,
            locals: fs.local_debug,
            upvalue_names: fs.upvalues.iter().map(|u| u.name.clone()).collect(),
        }
    }

    // ---- statements ----

    fn compile_block_contents(&mut self, block: &Block) -> Result<(), String> {
        for stat in &block.stats {
            self.compile_stat(stat)?;
        }
        if let Some(ret) = &block.ret {
            self.compile_return(ret)?;
        }
        Ok(())
    }

    /// A `{ ... }` block with its own scope.
    fn compile_block(&mut self, block: &Block) -> Result<(), String> {
        self.fs_mut().begin_scope(false);
        self.compile_block_contents(block)?;
        let (breaks, close_a) = self.fs_mut().end_scope();
        debug_assert!(breaks.is_empty());
        if block.ret.is_none() {
            if let Some(a) = close_a {
                self.emit(Instruction::create_asbx(OpCode::Jmp, a, 0));
            }
        }
        Ok(())
    }

    fn compile_stat(&mut self, stat: &Stat) -> Result<(), String> {
        match stat {
            Stat::Expr(e) => {
                let saved = self.fs().freereg;
                self.compile_call(e, 0, false)?;
                self.fs_mut().freereg = saved;
                Ok(())
            }
            Stat::Assign {
                targets,
                values,
                line,
            } => self.compile_assign(targets, values, *line),
            Stat::Local {
                names,
                values,
                line,
            } => {
                self.set_line(*line);
                let base = self.adjust_explist(values, names.len())?;
                for (i, name) in names.iter().enumerate() {
                    self.fs_mut().declare_local(name.clone(), base + i as u32);
                }
                Ok(())
            }
            Stat::LocalFunction { name, body, line } => {
                self.set_line(*line);
                // The local exists before the body compiles, so the
                // function can call itself through its own cell.
                let reg = self.fs().freereg;
                self.reserve(1)?;
                self.fs_mut().declare_local(name.clone(), reg);
                let pidx = self.compile_function(body)?;
                self.emit(Instruction::create_abx(OpCode::Closure, reg, pidx));
                Ok(())
            }
            Stat::If {
                arms,
                else_block,
                line,
            } => {
                self.set_line(*line);
                let mut end_jumps = Vec::new();
                let n = arms.len();
                for (i, (cond, block)) in arms.iter().enumerate() {
                    let else_jmp = self.cond_false_jump(cond)?;
                    self.compile_block(block)?;
                    if i + 1 < n || else_block.is_some() {
                        end_jumps.push(self.emit_jmp());
                    }
                    let here = self.pc();
                    self.patch_jump(else_jmp, here);
                }
                if let Some(b) = else_block {
                    self.compile_block(b)?;
                }
                let here = self.pc();
                for j in end_jumps {
                    self.patch_jump(j, here);
                }
                Ok(())
            }
            Stat::While { cond, body, line } => {
                self.set_line(*line);
                let start = self.pc();
                let exit_jmp = self.cond_false_jump(cond)?;
                self.fs_mut().begin_scope(true);
                self.compile_block_contents(body)?;
                let (breaks, close_a) = self.fs_mut().end_scope();
                if body.ret.is_none() {
                    if let Some(a) = close_a {
                        self.emit(Instruction::create_asbx(OpCode::Jmp, a, 0));
                    }
                    let back = self.emit_jmp();
                    self.patch_jump(back, start);
                }
                let end = self.pc();
                self.patch_jump(exit_jmp, end);
                for b in breaks {
                    self.patch_jump_close(b, end, close_a);
                }
                Ok(())
            }
            Stat::NumericFor {
                var,
                init,
                limit,
                step,
                body,
                line,
            } => self.compile_numeric_for(var, init, limit, step.as_ref(), body, *line),
            Stat::GenericFor {
                names,
                exprs,
                body,
                line,
            } => self.compile_generic_for(names, exprs, body, *line),
            Stat::Break(line) => {
                self.set_line(*line);
                let jmp = self.emit_jmp();
                match self.fs_mut().innermost_breakable() {
                    Some(scope) => {
                        scope.break_jumps.push(jmp);
                        Ok(())
                    }
                    None => Err(self.err("break outside a loop")),
                }
            }
        }
    }

    fn compile_assign(
        &mut self,
        targets: &[Expr],
        values: &[Expr],
        line: u32,
    ) -> Result<(), String> {
        self.set_line(line);
        // Single local target takes the value in place.
        if targets.len() == 1 && values.len() == 1 {
            if let Expr::Name(n) = &targets[0] {
                if let VarKind::Local(r) = self.resolve_var(n) {
                    return self.expr_to_reg(&values[0], r);
                }
            }
        }
        let saved = self.fs().freereg;
        let mut descs = Vec::with_capacity(targets.len());
        for t in targets {
            descs.push(self.prep_target(t)?);
        }
        let vbase = self.adjust_explist(values, targets.len())?;
        for (i, d) in descs.iter().enumerate() {
            self.emit_store(d, vbase + i as u32);
        }
        self.fs_mut().freereg = saved;
        Ok(())
    }

    fn prep_target(&mut self, t: &Expr) -> Result<StoreTarget, String> {
        match t {
            Expr::Name(n) => {
                let name = n.clone();
                match self.resolve_var(&name) {
                    VarKind::Local(r) => Ok(StoreTarget::Local(r)),
                    VarKind::Upval(u) => Ok(StoreTarget::Upval(u)),
                    VarKind::Global => {
                        let env = self.env_upval()?;
                        let id = self.vm.intern(&name);
                        let key = self.rk_of_value(LkValue::Str(id))?;
                        Ok(StoreTarget::Global { env, key })
                    }
                }
            }
            Expr::Index { obj, key } => {
                let obj = self.expr_to_any_reg(obj)?;
                let key = self.expr_to_rk(key)?;
                Ok(StoreTarget::Index { obj, key })
            }
            _ => Err(self.err("cannot assign to this expression")),
        }
    }

    fn emit_store(&mut self, d: &StoreTarget, v: u32) {
        match d {
            StoreTarget::Local(r) => {
                if *r != v {
                    self.emit(Instruction::create_abc(OpCode::Move, *r, v, 0));
                }
            }
            StoreTarget::Upval(u) => {
                self.emit(Instruction::create_abc(OpCode::SetUpval, v, *u, 0));
            }
            StoreTarget::Global { env, key } => {
                self.emit(Instruction::create_abc(OpCode::SetTabUp, *env, *key, v));
            }
            StoreTarget::Index { obj, key } => {
                self.emit(Instruction::create_abc(OpCode::SetTable, *obj, *key, v));
            }
        }
    }

    fn compile_return(&mut self, ret: &Return) -> Result<(), String> {
        self.set_line(ret.line);
        let exprs = &ret.exprs;
        // A lone call in return position becomes a tail call.
        if exprs.len() == 1
            && matches!(exprs[0], Expr::Call { .. } | Expr::MethodCall { .. })
        {
            let saved = self.fs().freereg;
            self.compile_call(&exprs[0], MULTRET, true)?;
            self.fs_mut().freereg = saved;
            return Ok(());
        }
        let base = self.fs().freereg;
        let n = exprs.len();
        let mut b = n as u32 + 1;
        if n > 0 {
            for e in &exprs[..n - 1] {
                self.expr_to_next_reg(e)?;
            }
            let last = &exprs[n - 1];
            if Self::is_multi(last) {
                self.compile_multi_open(last)?;
                b = 0;
            } else {
                self.expr_to_next_reg(last)?;
            }
        }
        self.emit(Instruction::create_abc(OpCode::Return, base, b, 0));
        self.fs_mut().freereg = base;
        Ok(())
    }

    fn compile_numeric_for(
        &mut self,
        var: &SmolStr,
        init: &Expr,
        limit: &Expr,
        step: Option<&Expr>,
        body: &Block,
        line: u32,
    ) -> Result<(), String> {
        self.set_line(line);
        let base = self.fs().freereg;
        self.expr_to_next_reg(init)?;
        self.expr_to_next_reg(limit)?;
        match step {
            Some(s) => {
                self.expr_to_next_reg(s)?;
            }
            None => {
                let reg = self.fs().freereg;
                self.reserve(1)?;
                let idx = self.add_const(LkValue::Int(1));
                self.emit_loadk(reg, idx);
            }
        }
        self.fs_mut().begin_scope(true);
        let var_reg = self.fs().freereg;
        debug_assert_eq!(var_reg, base + 3);
        self.reserve(1)?;
        self.fs_mut().declare_local(var.clone(), var_reg);

        let prep = self.emit(Instruction::create_asbx(OpCode::ForPrep, base, 0));
        let body_start = self.pc();
        self.compile_block_contents(body)?;
        let (breaks, close_a) = self.fs_mut().end_scope();
        if body.ret.is_none() {
            if let Some(a) = close_a {
                self.emit(Instruction::create_asbx(OpCode::Jmp, a, 0));
            }
        }
        let loop_pc = self.pc();
        let sbx = body_start as i32 - loop_pc as i32 - 1;
        self.emit(Instruction::create_asbx(OpCode::ForLoop, base, sbx));
        self.patch_jump(prep, loop_pc);
        let end = self.pc();
        for b in breaks {
            self.patch_jump_close(b, end, close_a);
        }
        self.fs_mut().freereg = base;
        Ok(())
    }

    fn compile_generic_for(
        &mut self,
        names: &[SmolStr],
        exprs: &[Expr],
        body: &Block,
        line: u32,
    ) -> Result<(), String> {
        self.set_line(line);
        let base = self.fs().freereg;
        let nvars = names.len() as u32;

        // The iterator triple comes from the global `iter`, which passes
        // closures through and adapts tables; `for x in t` and
        // `for x in f, s, c` both funnel through it.
        self.reserve(1)?;
        let env = self.env_upval()?;
        let iter_id = self.vm.intern("iter");
        {
            let saved = self.fs().freereg;
            let kk = self.rk_of_value(LkValue::Str(iter_id))?;
            self.emit(Instruction::create_abc(OpCode::GetTabUp, base, env, kk));
            self.fs_mut().freereg = saved;
        }
        let n = exprs.len();
        let mut open = false;
        if n > 0 {
            for e in &exprs[..n - 1] {
                self.expr_to_next_reg(e)?;
            }
            let last = &exprs[n - 1];
            if Self::is_multi(last) {
                self.compile_multi_open(last)?;
                open = true;
            } else {
                self.expr_to_next_reg(last)?;
            }
        }
        let b = if open { 0 } else { n as u32 + 1 };
        self.emit(Instruction::create_abc(OpCode::Call, base, b, 4));
        self.fs_mut().freereg = base;
        self.reserve(3)?;

        self.fs_mut().begin_scope(true);
        self.reserve(nvars)?;
        for (i, name) in names.iter().enumerate() {
            self.fs_mut().declare_local(name.clone(), base + 3 + i as u32);
        }
        let prep = self.emit_jmp();
        let body_start = self.pc();
        self.compile_block_contents(body)?;
        let (breaks, close_a) = self.fs_mut().end_scope();
        if body.ret.is_none() {
            if let Some(a) = close_a {
                self.emit(Instruction::create_asbx(OpCode::Jmp, a, 0));
            }
        }
        let here = self.pc();
        self.patch_jump(prep, here);
        self.emit(Instruction::create_abc(OpCode::TForCall, base, 0, nvars));
        let tfl = self.pc();
        let sbx = body_start as i32 - tfl as i32 - 1;
        self.emit(Instruction::create_asbx(OpCode::TForLoop, base + 2, sbx));
        let end = self.pc();
        for bj in breaks {
            self.patch_jump_close(bj, end, close_a);
        }
        self.fs_mut().freereg = base;
        Ok(())
    }
}
