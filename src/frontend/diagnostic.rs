use thiserror::Error;

/// 翻译过程中报出的源程序错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Diagnostic {
    #[error("use of undeclared name `{0}`")]
    UnboundName(String),
    #[error("redefinition of `{0}` in the same scope")]
    DuplicateBinding(String),
    #[error("division or remainder by zero in constant expression")]
    DivisionByZero,
    #[error("`break` statement outside of a loop")]
    BreakOutsideLoop,
    #[error("`continue` statement outside of a loop")]
    ContinueOutsideLoop,
    #[error("`{0}` is not a function")]
    NotCallable(String),
    #[error("expression is not a compile-time constant")]
    NonConstant,
    #[error("type mismatch: {0}")]
    TypeMismatch(String),
}
