// Register-machine instruction set.
//
// Instruction format (32-bit):
// - iABC:  [B(9) | C(9) | A(8) | Op(6)]
// - iABx:  [Bx(18)      | A(8) | Op(6)]
// - iAsBx: [sBx(18)     | A(8) | Op(6)]   sBx biased by 131071
// - iAx:   [Ax(26)             | Op(6)]
//
// A B or C operand >= 256 addresses the constant pool at (value - 256).

mod instruction;

pub use instruction::Instruction;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    Move = 0,  // R[A] := R[B]
    LoadK,     // R[A] := K[Bx]
    LoadKx,    // R[A] := K[ExtraArg.Ax]
    LoadBool,  // R[A] := bool(B); if C != 0 skip next
    LoadNil,   // R[A..A+B] := nil
    GetUpval,  // R[A] := U[B]
    GetTabUp,  // R[A] := U[B][RK(C)]
    GetTable,  // R[A] := R[B][RK(C)]
    SetTabUp,  // U[A][RK(B)] := RK(C)
    SetUpval,  // U[B] := R[A]
    SetTable,  // R[A][RK(B)] := RK(C)
    NewTable,  // R[A] := {} with Fb-encoded size hints B, C
    Self_,     // R[A+1] := R[B]; R[A] := R[B][RK(C)]
    Add,       // R[A] := RK(B) + RK(C)
    Sub,
    Mul,
    Mod,
    Pow,
    Div,
    IDiv,
    BAnd,
    BOr,
    BXor,
    Shl,
    Shr,
    Unm,      // R[A] := -R[B]
    BNot,     // R[A] := ~R[B]
    Not,      // R[A] := not R[B]
    Len,      // R[A] := #R[B]
    Jmp,      // pc += sBx; if A != 0, close upvalues with slot >= A-1
    Eq,       // if (RK(B) == RK(C)) != bool(A) then skip next
    Lt,
    Le,
    Test,     // if bool(R[A]) != bool(C) then skip next
    TestSet,  // if bool(R[B]) == bool(C) then R[A] := R[B] else skip next
    Call,     // R[A..A+C-2] := R[A](R[A+1..A+B-1])
    TailCall, // return R[A](R[A+1..A+B-1]), reusing the frame
    Return,   // return R[A..A+B-2]
    ForLoop,  // R[A] += R[A+2]; if loop continues { pc += sBx; R[A+3] := R[A] }
    ForPrep,  // R[A] -= R[A+2]; pc += sBx
    TForCall, // R[A+3..A+2+C] := R[A](R[A+1], R[A+2])
    TForLoop, // if R[A+1] != nil { R[A] := R[A+1]; pc += sBx }
    SetList,  // R[A][(C-1)*50 + i - 1] := R[A+i], i = 1..B
    Closure,  // R[A] := closure(P[Bx])
    Vararg,   // R[A..A+B-2] := varargs
    ExtraArg, // extra 26-bit immediate for the preceding instruction
}

pub const NUM_OPCODES: usize = OpCode::ExtraArg as usize + 1;

/// Bulk factor for SetList: how many array slots one instruction flushes.
pub const FIELDS_PER_FLUSH: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpMode {
    IABC,
    IABx,
    IAsBx,
    IAx,
}

impl OpCode {
    pub const fn from_u8(op: u8) -> OpCode {
        debug_assert!((op as usize) < NUM_OPCODES);
        // Safe by construction: every discriminant in 0..NUM_OPCODES exists.
        unsafe { std::mem::transmute(op) }
    }

    pub const fn mode(self) -> OpMode {
        match self {
            OpCode::LoadK | OpCode::LoadKx | OpCode::Closure => OpMode::IABx,
            OpCode::Jmp | OpCode::ForLoop | OpCode::ForPrep | OpCode::TForLoop => OpMode::IAsBx,
            OpCode::ExtraArg => OpMode::IAx,
            _ => OpMode::IABC,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            OpCode::Move => "MOVE",
            OpCode::LoadK => "LOADK",
            OpCode::LoadKx => "LOADKX",
            OpCode::LoadBool => "LOADBOOL",
            OpCode::LoadNil => "LOADNIL",
            OpCode::GetUpval => "GETUPVAL",
            OpCode::GetTabUp => "GETTABUP",
            OpCode::GetTable => "GETTABLE",
            OpCode::SetTabUp => "SETTABUP",
            OpCode::SetUpval => "SETUPVAL",
            OpCode::SetTable => "SETTABLE",
            OpCode::NewTable => "NEWTABLE",
            OpCode::Self_ => "SELF",
            OpCode::Add => "ADD",
            OpCode::Sub => "SUB",
            OpCode::Mul => "MUL",
            OpCode::Mod => "MOD",
            OpCode::Pow => "POW",
            OpCode::Div => "DIV",
            OpCode::IDiv => "IDIV",
            OpCode::BAnd => "BAND",
            OpCode::BOr => "BOR",
            OpCode::BXor => "BXOR",
            OpCode::Shl => "SHL",
            OpCode::Shr => "SHR",
            OpCode::Unm => "UNM",
            OpCode::BNot => "BNOT",
            OpCode::Not => "NOT",
            OpCode::Len => "LEN",
            OpCode::Jmp => "JMP",
            OpCode::Eq => "EQ",
            OpCode::Lt => "LT",
            OpCode::Le => "LE",
            OpCode::Test => "TEST",
            OpCode::TestSet => "TESTSET",
            OpCode::Call => "CALL",
            OpCode::TailCall => "TAILCALL",
            OpCode::Return => "RETURN",
            OpCode::ForLoop => "FORLOOP",
            OpCode::ForPrep => "FORPREP",
            OpCode::TForCall => "TFORCALL",
            OpCode::TForLoop => "TFORLOOP",
            OpCode::SetList => "SETLIST",
            OpCode::Closure => "CLOSURE",
            OpCode::Vararg => "VARARG",
            OpCode::ExtraArg => "EXTRAARG",
        }
    }
}
