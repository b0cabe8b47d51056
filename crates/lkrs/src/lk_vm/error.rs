// Error model.
//
// `LkError` is a 1-byte kind; the actual error value (usually a string)
// lives on the faulting thread so `Result` stays small. `LkFullError`
// pairs the kind with the rendered message for host consumption.

/// Lightweight error kind. The payload travels on the thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LkError {
    /// VM-raised failure: type mismatch, nil call, bad key, zero division.
    Runtime,
    /// Lexer/parser/codegen failure, `{chunk}:{line}: message` formatted.
    Syntax,
    /// Raised by a host function through the error primitive.
    Host,
    /// Register exhaustion at compile time or stack overflow at runtime.
    Resource,
    /// Bad coroutine transition: dead resume, yield from the main thread,
    /// yield across a host-call boundary.
    Coroutine,
    /// Internal: a coroutine is suspending. Never escapes to the host.
    Yield,
}

impl std::fmt::Display for LkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LkError::Runtime => "runtime error",
            LkError::Syntax => "syntax error",
            LkError::Host => "host error",
            LkError::Resource => "resource error",
            LkError::Coroutine => "coroutine error",
            LkError::Yield => "yield",
        };
        write!(f, "{}", s)
    }
}

impl std::error::Error for LkError {}

pub type LkResult<T> = Result<T, LkError>;

/// Error kind plus the rendered message, for `?`-friendly embedding.
#[derive(Debug, Clone)]
pub struct LkFullError {
    pub kind: LkError,
    pub message: String,
}

impl std::fmt::Display for LkFullError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

impl std::error::Error for LkFullError {}

/// Host API status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LkStatus {
    Ok,
    Yield,
    ErrRun,
    ErrSyntax,
    ErrMem,
    ErrGcMM,
    ErrErr,
    ErrFile,
}

impl LkStatus {
    pub fn from_error(e: LkError) -> LkStatus {
        match e {
            LkError::Yield => LkStatus::Yield,
            LkError::Syntax => LkStatus::ErrSyntax,
            LkError::Resource => LkStatus::ErrMem,
            LkError::Runtime | LkError::Host | LkError::Coroutine => LkStatus::ErrRun,
        }
    }

    pub fn is_ok(self) -> bool {
        matches!(self, LkStatus::Ok)
    }
}
