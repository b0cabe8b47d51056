// LK lexer.
//
// Streams the source into (line, kind, lexeme) tokens. Whitespace, `//`
// line comments and `/* */` block comments are skipped; an unterminated
// block comment or string is a fatal lex error. Numeric tokens keep their
// raw lexeme; integer-vs-float classification happens at parse time.

mod token;

pub use token::{Token, TokenKind, keyword_kind};

use smol_str::SmolStr;

pub struct Lexer<'a> {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    chunk_name: &'a str,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &str, chunk_name: &'a str) -> Self {
        Lexer {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            chunk_name,
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, String> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let eof = token.kind == TokenKind::TkEof;
            tokens.push(token);
            if eof {
                break;
            }
        }
        Ok(tokens)
    }

    fn error(&self, msg: impl AsRef<str>) -> String {
        format!("{}:{}: {}", self.chunk_name, self.line, msg.as_ref())
    }

    #[inline]
    fn current(&self) -> char {
        self.chars.get(self.pos).copied().unwrap_or('\0')
    }

    #[inline]
    fn peek(&self, ahead: usize) -> char {
        self.chars.get(self.pos + ahead).copied().unwrap_or('\0')
    }

    #[inline]
    fn bump(&mut self) -> char {
        let c = self.current();
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
        }
        c
    }

    #[inline]
    fn is_eof(&self) -> bool {
        self.pos >= self.chars.len()
    }

    /// Consume the current char if it matches, reporting success.
    fn accept(&mut self, c: char) -> bool {
        if self.current() == c {
            self.bump();
            true
        } else {
            false
        }
    }

    fn skip_trivia(&mut self) -> Result<(), String> {
        loop {
            match self.current() {
                ' ' | '\t' | '\r' | '\n' => {
                    self.bump();
                }
                '/' if self.peek(1) == '/' => {
                    while !self.is_eof() && self.current() != '\n' {
                        self.bump();
                    }
                }
                '/' if self.peek(1) == '*' => {
                    let start_line = self.line;
                    self.bump();
                    self.bump();
                    loop {
                        if self.is_eof() {
                            self.line = start_line;
                            return Err(self.error("unterminated block comment"));
                        }
                        if self.current() == '*' && self.peek(1) == '/' {
                            self.bump();
                            self.bump();
                            break;
                        }
                        self.bump();
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn next_token(&mut self) -> Result<Token, String> {
        self.skip_trivia()?;
        let line = self.line;
        if self.is_eof() {
            return Ok(Token::new(TokenKind::TkEof, line, SmolStr::default()));
        }

        let c = self.current();
        let kind = match c {
            'a'..='z' | 'A'..='Z' | '_' => return self.lex_name(),
            '0'..='9' => return self.lex_number(),
            '"' | '\'' => return self.lex_string(),
            '`' => return self.lex_raw_string(),
            '.' => {
                if self.peek(1).is_ascii_digit() {
                    return self.lex_number();
                }
                self.bump();
                if self.accept('.') {
                    if self.accept('.') {
                        TokenKind::TkDots
                    } else {
                        return Err(self.error("malformed token '..'"));
                    }
                } else {
                    TokenKind::TkDot
                }
            }
            '+' => {
                self.bump();
                if self.accept('+') {
                    TokenKind::TkPlusPlus
                } else if self.accept('=') {
                    TokenKind::TkPlusEq
                } else {
                    TokenKind::TkPlus
                }
            }
            '-' => {
                self.bump();
                if self.accept('-') {
                    TokenKind::TkMinusMinus
                } else if self.accept('=') {
                    TokenKind::TkMinusEq
                } else {
                    TokenKind::TkMinus
                }
            }
            '*' => {
                self.bump();
                if self.accept('=') {
                    TokenKind::TkMulEq
                } else {
                    TokenKind::TkMul
                }
            }
            '/' => {
                self.bump();
                if self.accept('=') {
                    TokenKind::TkDivEq
                } else {
                    TokenKind::TkDiv
                }
            }
            '%' => {
                self.bump();
                if self.accept('=') {
                    TokenKind::TkModEq
                } else {
                    TokenKind::TkMod
                }
            }
            '^' => {
                self.bump();
                if self.accept('=') {
                    TokenKind::TkPowEq
                } else {
                    TokenKind::TkPow
                }
            }
            '#' => {
                self.bump();
                TokenKind::TkLen
            }
            '&' => {
                self.bump();
                TokenKind::TkBitAnd
            }
            '|' => {
                self.bump();
                TokenKind::TkBitOr
            }
            '~' => {
                self.bump();
                if self.accept('/') {
                    TokenKind::TkIDiv
                } else {
                    TokenKind::TkTilde
                }
            }
            '<' => {
                self.bump();
                if self.accept('=') {
                    TokenKind::TkLe
                } else if self.accept('<') {
                    TokenKind::TkShl
                } else {
                    TokenKind::TkLt
                }
            }
            '>' => {
                self.bump();
                if self.accept('=') {
                    TokenKind::TkGe
                } else if self.accept('>') {
                    TokenKind::TkShr
                } else {
                    TokenKind::TkGt
                }
            }
            '=' => {
                self.bump();
                if self.accept('=') {
                    TokenKind::TkEq
                } else if self.accept('>') {
                    TokenKind::TkArrow
                } else {
                    TokenKind::TkAssign
                }
            }
            '!' => {
                self.bump();
                if self.accept('=') {
                    TokenKind::TkNe
                } else {
                    return Err(self.error("unexpected symbol near '!'"));
                }
            }
            '?' => {
                self.bump();
                if self.accept('?') {
                    if self.accept('=') {
                        TokenKind::TkCoalEq
                    } else {
                        TokenKind::TkCoalesce
                    }
                } else {
                    TokenKind::TkQuestion
                }
            }
            ':' => {
                self.bump();
                if self.accept('=') {
                    TokenKind::TkDefine
                } else {
                    TokenKind::TkColon
                }
            }
            ',' => {
                self.bump();
                TokenKind::TkComma
            }
            ';' => {
                self.bump();
                TokenKind::TkSemicolon
            }
            '(' => {
                self.bump();
                TokenKind::TkLeftParen
            }
            ')' => {
                self.bump();
                TokenKind::TkRightParen
            }
            '{' => {
                self.bump();
                TokenKind::TkLeftBrace
            }
            '}' => {
                self.bump();
                TokenKind::TkRightBrace
            }
            '[' => {
                self.bump();
                TokenKind::TkLeftBracket
            }
            ']' => {
                self.bump();
                TokenKind::TkRightBracket
            }
            _ => {
                return Err(self.error(format!("unexpected symbol near '{}'", c)));
            }
        };
        Ok(Token::new(kind, line, SmolStr::default()))
    }

    fn lex_name(&mut self) -> Result<Token, String> {
        let line = self.line;
        let start = self.pos;
        while matches!(self.current(), 'a'..='z' | 'A'..='Z' | '0'..='9' | '_') {
            self.bump();
        }
        let name: String = self.chars[start..self.pos].iter().collect();
        let kind = keyword_kind(&name).unwrap_or(TokenKind::TkName);
        Ok(Token::new(kind, line, SmolStr::new(&name)))
    }

    fn lex_number(&mut self) -> Result<Token, String> {
        let line = self.line;
        let start = self.pos;
        if self.current() == '0' && matches!(self.peek(1), 'x' | 'X') {
            self.bump();
            self.bump();
            let mut any = false;
            while self.current().is_ascii_hexdigit() {
                self.bump();
                any = true;
            }
            if self.accept('.') {
                while self.current().is_ascii_hexdigit() {
                    self.bump();
                    any = true;
                }
            }
            if !any {
                return Err(self.error("malformed number"));
            }
            if matches!(self.current(), 'p' | 'P') {
                self.bump();
                if matches!(self.current(), '+' | '-') {
                    self.bump();
                }
                if !self.current().is_ascii_digit() {
                    return Err(self.error("malformed number"));
                }
                while self.current().is_ascii_digit() {
                    self.bump();
                }
            }
        } else {
            while self.current().is_ascii_digit() {
                self.bump();
            }
            if self.accept('.') {
                while self.current().is_ascii_digit() {
                    self.bump();
                }
            }
            if matches!(self.current(), 'e' | 'E') {
                self.bump();
                if matches!(self.current(), '+' | '-') {
                    self.bump();
                }
                if !self.current().is_ascii_digit() {
                    return Err(self.error("malformed number"));
                }
                while self.current().is_ascii_digit() {
                    self.bump();
                }
            }
        }
        // A number may not run straight into a name.
        if matches!(self.current(), 'a'..='z' | 'A'..='Z' | '_') {
            return Err(self.error("malformed number"));
        }
        let raw: String = self.chars[start..self.pos].iter().collect();
        Ok(Token::new(TokenKind::TkNumber, line, SmolStr::new(&raw)))
    }

    fn lex_string(&mut self) -> Result<Token, String> {
        let line = self.line;
        let quote = self.bump();
        let mut out = String::new();
        loop {
            if self.is_eof() {
                return Err(self.error("unterminated string"));
            }
            let c = self.current();
            if c == quote {
                self.bump();
                break;
            }
            if c == '\n' {
                return Err(self.error("unterminated string"));
            }
            if c == '\\' {
                self.bump();
                self.lex_escape(&mut out)?;
            } else {
                out.push(self.bump());
            }
        }
        Ok(Token::new(TokenKind::TkString, line, SmolStr::new(&out)))
    }

    fn lex_escape(&mut self, out: &mut String) -> Result<(), String> {
        let c = self.bump();
        match c {
            'a' => out.push('\x07'),
            'b' => out.push('\x08'),
            'f' => out.push('\x0c'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'v' => out.push('\x0b'),
            '"' => out.push('"'),
            '\'' => out.push('\''),
            '\\' => out.push('\\'),
            '\n' => out.push('\n'),
            'x' => {
                let mut v = 0u32;
                for _ in 0..2 {
                    let d = self
                        .current()
                        .to_digit(16)
                        .ok_or_else(|| self.error("hexadecimal digit expected"))?;
                    self.bump();
                    v = v * 16 + d;
                }
                out.push(char::from_u32(v).unwrap());
            }
            'u' => {
                if !self.accept('{') {
                    return Err(self.error("missing '{' in \\u{xxxx}"));
                }
                let mut v: u32 = 0;
                let mut any = false;
                while let Some(d) = self.current().to_digit(16) {
                    self.bump();
                    v = v
                        .checked_mul(16)
                        .and_then(|v| v.checked_add(d))
                        .ok_or_else(|| self.error("UTF-8 value too large"))?;
                    any = true;
                }
                if !any || !self.accept('}') {
                    return Err(self.error("hexadecimal digit expected"));
                }
                let ch = char::from_u32(v).ok_or_else(|| self.error("UTF-8 value too large"))?;
                out.push(ch);
            }
            'z' => {
                while matches!(self.current(), ' ' | '\t' | '\r' | '\n') {
                    self.bump();
                }
            }
            '0'..='9' => {
                let mut v = c.to_digit(10).unwrap();
                for _ in 0..2 {
                    if let Some(d) = self.current().to_digit(10) {
                        self.bump();
                        v = v * 10 + d;
                        if v > 255 {
                            return Err(self.error("decimal escape too large"));
                        }
                    } else {
                        break;
                    }
                }
                out.push(char::from_u32(v).unwrap());
            }
            _ => return Err(self.error(format!("invalid escape sequence '\\{}'", c))),
        }
        Ok(())
    }

    fn lex_raw_string(&mut self) -> Result<Token, String> {
        let line = self.line;
        self.bump(); // opening back-tick
        let mut out = String::new();
        // One newline right after the opening back-tick is dropped.
        if self.current() == '\n' {
            self.bump();
        }
        loop {
            if self.is_eof() {
                return Err(self.error("unterminated raw string"));
            }
            let c = self.bump();
            if c == '`' {
                break;
            }
            out.push(c);
        }
        Ok(Token::new(TokenKind::TkString, line, SmolStr::new(&out)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Lexer::new(src, "t")
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn keywords_and_names() {
        assert_eq!(
            kinds("fn shy rt elif classy"),
            vec![
                TokenKind::TkFn,
                TokenKind::TkShy,
                TokenKind::TkRt,
                TokenKind::TkElif,
                TokenKind::TkName,
                TokenKind::TkEof
            ]
        );
    }

    #[test]
    fn compound_operators() {
        assert_eq!(
            kinds("a ??= b ?? c ~/ d != e => f"),
            vec![
                TokenKind::TkName,
                TokenKind::TkCoalEq,
                TokenKind::TkName,
                TokenKind::TkCoalesce,
                TokenKind::TkName,
                TokenKind::TkIDiv,
                TokenKind::TkName,
                TokenKind::TkNe,
                TokenKind::TkName,
                TokenKind::TkArrow,
                TokenKind::TkName,
                TokenKind::TkEof
            ]
        );
    }

    #[test]
    fn define_vs_colon() {
        assert_eq!(
            kinds("x := t:m()"),
            vec![
                TokenKind::TkName,
                TokenKind::TkDefine,
                TokenKind::TkName,
                TokenKind::TkColon,
                TokenKind::TkName,
                TokenKind::TkLeftParen,
                TokenKind::TkRightParen,
                TokenKind::TkEof
            ]
        );
    }

    #[test]
    fn comments_are_trivia() {
        assert_eq!(
            kinds("a // line\n/* block\nstill */ b"),
            vec![TokenKind::TkName, TokenKind::TkName, TokenKind::TkEof]
        );
    }

    #[test]
    fn unterminated_block_comment_is_fatal() {
        assert!(Lexer::new("/* nope", "t").tokenize().is_err());
    }

    #[test]
    fn string_escapes() {
        let toks = Lexer::new(r#"'a\tb' "\x41\65\u{1F600}" '\z   q'"#, "t")
            .tokenize()
            .unwrap();
        assert_eq!(toks[0].lexeme, "a\tb");
        assert_eq!(toks[1].lexeme, "AA\u{1F600}");
        assert_eq!(toks[2].lexeme, "q");
    }

    #[test]
    fn raw_string_drops_leading_newline() {
        let toks = Lexer::new("`\nline1\\n`", "t").tokenize().unwrap();
        // No escapes in raw strings; the backslash is literal.
        assert_eq!(toks[0].lexeme, "line1\\n");
    }

    #[test]
    fn numbers_keep_raw_lexemes() {
        let toks = Lexer::new("42 3.5 0x1F 1e3 0x1p4 .5", "t").tokenize().unwrap();
        let lex: Vec<&str> = toks[..6].iter().map(|t| t.lexeme.as_str()).collect();
        assert_eq!(lex, vec!["42", "3.5", "0x1F", "1e3", "0x1p4", ".5"]);
        assert!(toks[..6].iter().all(|t| t.kind == TokenKind::TkNumber));
    }

    #[test]
    fn line_tracking() {
        let toks = Lexer::new("a\nb\n\nc", "t").tokenize().unwrap();
        assert_eq!(toks[0].line, 1);
        assert_eq!(toks[1].line, 2);
        assert_eq!(toks[2].line, 4);
    }
}
