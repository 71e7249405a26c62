use thiserror::Error;

/// Fatal interpreter failures. `Flow::Return` is control flow, never an
/// error; everything here aborts the program.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("Variable '{name}' not found")]
    UndefinedVariable { name: String },
    #[error("Variable '{name}' is not a class instance")]
    VariableNotAnInstance { name: String },
    #[error("Cannot call method '{method}' on a value of type {type_name}")]
    MethodCallOnNonInstance {
        method: String,
        type_name: &'static str,
    },
    #[error("Class '{class}' has no method '{method}' taking {arity} arguments")]
    MethodNotFound {
        class: String,
        method: String,
        arity: usize,
    },
    #[error("Cannot compare values of types {lhs} and {rhs}")]
    ComparisonTypeMismatch {
        lhs: &'static str,
        rhs: &'static str,
    },
    #[error("Unsupported operand types for '{operation}': {lhs} and {rhs}")]
    UnsupportedOperandTypes {
        operation: char,
        lhs: &'static str,
        rhs: &'static str,
    },
    #[error("Division by zero")]
    DivisionByZero,
    #[error("Return outside of a method body")]
    ReturnOutsideMethod,
    #[error("Failed to write program output: {message}")]
    OutputWrite { message: String },
}
