//! Error types for the block IR generator

use thiserror::Error;

/// Result type for generation operations
pub type CompileResult<T> = Result<T, CompileError>;

/// Generation errors. Every variant is fatal to the whole program.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CompileError {
    #[error("Unknown shape: {name}")]
    UnknownShape { name: String },

    #[error("Non-integer polynomial in integerize: {poly}")]
    NonIntegerPolynomial { poly: String },

    #[error("Unsupported contraction with {count} tensor specs: only 1, 2, or 3 inputs are supported")]
    UnsupportedArity { count: usize },

    #[error("Not implemented: {what}")]
    Unimplemented { what: String },

    #[error("Unable to compute bounds: {message}")]
    BoundsUnsolvable { message: String },

    #[error("Cannot broadcast {name}: input rank {input_rank} exceeds output rank {output_rank}")]
    BroadcastRank {
        name: String,
        input_rank: usize,
        output_rank: usize,
    },

    #[error("Polynomial syntax error at position {position}: {message}")]
    PolynomialSyntax { position: usize, message: String },
}

impl CompileError {
    pub fn unknown_shape(name: impl Into<String>) -> Self {
        CompileError::UnknownShape { name: name.into() }
    }

    pub fn non_integer(poly: impl Into<String>) -> Self {
        CompileError::NonIntegerPolynomial { poly: poly.into() }
    }

    pub fn unimplemented(what: impl Into<String>) -> Self {
        CompileError::Unimplemented { what: what.into() }
    }

    pub fn unsolvable(msg: impl Into<String>) -> Self {
        CompileError::BoundsUnsolvable { message: msg.into() }
    }

    pub fn syntax(position: usize, msg: impl Into<String>) -> Self {
        CompileError::PolynomialSyntax {
            position,
            message: msg.into(),
        }
    }
}
