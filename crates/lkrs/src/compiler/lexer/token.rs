use smol_str::SmolStr;

/// Token kinds of the LK surface syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    // keywords
    TkAnd,
    TkOr,
    TkNot,
    TkIf,
    TkElif,
    TkElse,
    TkFor,
    TkIn,
    TkWhile,
    TkBreak,
    TkFn,
    TkShy,
    TkNil,
    TkTrue,
    TkFalse,
    TkRt,
    TkClass,
    // literals and names
    TkName,
    TkNumber,
    /// Quoted or raw string; the token lexeme is the decoded content.
    TkString,
    // operators
    TkPlus,
    TkMinus,
    TkMul,
    TkDiv,
    TkIDiv, // ~/
    TkMod,
    TkPow,
    TkLen, // #
    TkBitAnd,
    TkBitOr,
    TkTilde, // binary xor, unary bnot
    TkShl,
    TkShr,
    TkEq, // ==
    TkNe, // !=
    TkLt,
    TkLe,
    TkGt,
    TkGe,
    TkAssign,   // =
    TkDefine,   // :=
    TkPlusEq,   // +=
    TkMinusEq,  // -=
    TkMulEq,    // *=
    TkDivEq,    // /=
    TkModEq,    // %=
    TkPowEq,    // ^=
    TkCoalEq,   // ??=
    TkPlusPlus, // ++
    TkMinusMinus, // --
    TkCoalesce, // ??
    TkQuestion, // ?
    TkColon,    // :
    TkArrow,    // =>
    TkDots,     // ...
    TkComma,
    TkSemicolon,
    TkDot,
    TkLeftParen,
    TkRightParen,
    TkLeftBrace,
    TkRightBrace,
    TkLeftBracket,
    TkRightBracket,
    TkEof,
}

impl TokenKind {
    /// Display name used in "unexpected token" diagnostics.
    pub fn describe(self) -> &'static str {
        match self {
            TokenKind::TkAnd => "'and'",
            TokenKind::TkOr => "'or'",
            TokenKind::TkNot => "'not'",
            TokenKind::TkIf => "'if'",
            TokenKind::TkElif => "'elif'",
            TokenKind::TkElse => "'else'",
            TokenKind::TkFor => "'for'",
            TokenKind::TkIn => "'in'",
            TokenKind::TkWhile => "'while'",
            TokenKind::TkBreak => "'break'",
            TokenKind::TkFn => "'fn'",
            TokenKind::TkShy => "'shy'",
            TokenKind::TkNil => "'nil'",
            TokenKind::TkTrue => "'true'",
            TokenKind::TkFalse => "'false'",
            TokenKind::TkRt => "'rt'",
            TokenKind::TkClass => "'class'",
            TokenKind::TkName => "name",
            TokenKind::TkNumber => "number",
            TokenKind::TkString => "string",
            TokenKind::TkPlus => "'+'",
            TokenKind::TkMinus => "'-'",
            TokenKind::TkMul => "'*'",
            TokenKind::TkDiv => "'/'",
            TokenKind::TkIDiv => "'~/'",
            TokenKind::TkMod => "'%'",
            TokenKind::TkPow => "'^'",
            TokenKind::TkLen => "'#'",
            TokenKind::TkBitAnd => "'&'",
            TokenKind::TkBitOr => "'|'",
            TokenKind::TkTilde => "'~'",
            TokenKind::TkShl => "'<<'",
            TokenKind::TkShr => "'>>'",
            TokenKind::TkEq => "'=='",
            TokenKind::TkNe => "'!='",
            TokenKind::TkLt => "'<'",
            TokenKind::TkLe => "'<='",
            TokenKind::TkGt => "'>'",
            TokenKind::TkGe => "'>='",
            TokenKind::TkAssign => "'='",
            TokenKind::TkDefine => "':='",
            TokenKind::TkPlusEq => "'+='",
            TokenKind::TkMinusEq => "'-='",
            TokenKind::TkMulEq => "'*='",
            TokenKind::TkDivEq => "'/='",
            TokenKind::TkModEq => "'%='",
            TokenKind::TkPowEq => "'^='",
            TokenKind::TkCoalEq => "'??='",
            TokenKind::TkPlusPlus => "'++'",
            TokenKind::TkMinusMinus => "'--'",
            TokenKind::TkCoalesce => "'??'",
            TokenKind::TkQuestion => "'?'",
            TokenKind::TkColon => "':'",
            TokenKind::TkArrow => "'=>'",
            TokenKind::TkDots => "'...'",
            TokenKind::TkComma => "','",
            TokenKind::TkSemicolon => "';'",
            TokenKind::TkDot => "'.'",
            TokenKind::TkLeftParen => "'('",
            TokenKind::TkRightParen => "')'",
            TokenKind::TkLeftBrace => "'{'",
            TokenKind::TkRightBrace => "'}'",
            TokenKind::TkLeftBracket => "'['",
            TokenKind::TkRightBracket => "']'",
            TokenKind::TkEof => "<eof>",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub line: u32,
    /// Raw lexeme for names and numbers, decoded content for strings.
    pub lexeme: SmolStr,
}

impl Token {
    pub fn new(kind: TokenKind, line: u32, lexeme: SmolStr) -> Self {
        Token { kind, line, lexeme }
    }
}

pub fn keyword_kind(name: &str) -> Option<TokenKind> {
    let kind = match name {
        "and" => TokenKind::TkAnd,
        "or" => TokenKind::TkOr,
        "not" => TokenKind::TkNot,
        "if" => TokenKind::TkIf,
        "elif" => TokenKind::TkElif,
        "else" => TokenKind::TkElse,
        "for" => TokenKind::TkFor,
        "in" => TokenKind::TkIn,
        "while" => TokenKind::TkWhile,
        "break" => TokenKind::TkBreak,
        "fn" => TokenKind::TkFn,
        "shy" => TokenKind::TkShy,
        "nil" => TokenKind::TkNil,
        "true" => TokenKind::TkTrue,
        "false" => TokenKind::TkFalse,
        "rt" => TokenKind::TkRt,
        "class" => TokenKind::TkClass,
        _ => return None,
    };
    Some(kind)
}
