//! Tensor Program to Block IR Lowering
//!
//! This library lowers a bound, type-checked tensor program (contractions,
//! elementwise functions, reshapes and special whole-tensor functions) into
//! a hierarchical block IR: every op becomes a kernel block with explicit
//! indexes, constraints, memory refinements and a scalar body.
//!
//! # Example
//!
//! ```rust
//! use tensor_to_block::{generate, DataType, Op, RunInfo, TensorShape};
//!
//! let shape = TensorShape::from_sizes(DataType::Float32, &[2, 3]);
//! let runinfo = RunInfo::new("add")
//!     .input("A", shape.clone())
//!     .input("B", shape.clone())
//!     .output("C", shape)
//!     .op(Op::elementwise("C", "add", &["A", "B"]));
//! let program = generate(&runinfo).unwrap();
//! println!("{}", program);
//! ```

pub mod affine;
pub mod ast;
pub mod block;
pub mod bound;
pub mod contraction;
pub mod elementwise;
pub mod error;
pub mod generator;
pub mod lexer;
pub mod observer;
pub mod parser;
pub mod poly;
pub mod scope;

pub use affine::Affine;
pub use ast::*;
pub use block::{Block, ConstValue, Index, Intrinsic, RefDir, Refinement, Special, Statement};
pub use bound::{Bound, BoundSolver, DefaultSolver, IndexBounds, RangeConstraint, SimpleConstraint};
pub use error::{CompileError, CompileResult};
pub use generator::{generate, generate_with, Generator};
pub use observer::{LogObserver, Observer, RecordingObserver};
pub use parser::parse_polynomial;
pub use poly::{Polynomial, Rational};

/// Lower a run description given as JSON text
pub fn generate_from_json(json: &str) -> Result<Block, Box<dyn std::error::Error>> {
    let runinfo: RunInfo = serde_json::from_str(json)?;
    Ok(generate(&runinfo)?)
}
