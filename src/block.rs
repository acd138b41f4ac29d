//! The block IR produced by the generator
//!
//! A [`Block`] is a scope with an iteration domain (indexes and
//! constraints), buffer views (refinements) and an ordered body. The
//! program block owns the whole tree; children are only reachable through
//! their parent.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

use crate::affine::Affine;
use crate::ast::TensorShape;

/// How a block uses the buffer a refinement names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RefDir {
    None,
    In,
    Out,
    InOut,
}

impl fmt::Display for RefDir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RefDir::None => "none",
            RefDir::In => "in",
            RefDir::Out => "out",
            RefDir::InOut => "inout",
        };
        write!(f, "{}", s)
    }
}

/// Placement hint for a buffer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Location {
    pub name: String,
    pub unit: Affine,
}

/// A block-local view of an outer buffer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Refinement {
    pub dir: RefDir,
    /// Name in the enclosing block; empty for a fresh allocation
    pub from: String,
    /// Name inside this block
    pub into: String,
    /// One access expression per dimension of `shape`
    pub access: Vec<Affine>,
    pub shape: TensorShape,
    /// How writes merge with existing contents
    pub agg_op: Option<String>,
    pub location: Option<Location>,
    pub is_const: bool,
    pub bank_dim: Option<usize>,
}

impl Refinement {
    pub fn new(
        dir: RefDir,
        from: impl Into<String>,
        into: impl Into<String>,
        access: Vec<Affine>,
        shape: TensorShape,
    ) -> Self {
        Self {
            dir,
            from: from.into(),
            into: into.into(),
            access,
            shape,
            agg_op: None,
            location: None,
            is_const: false,
            bank_dim: None,
        }
    }

    /// A whole-buffer reference: zero access in every dimension
    pub fn whole(dir: RefDir, from: impl Into<String>, into: impl Into<String>, shape: TensorShape) -> Self {
        let access = vec![Affine::new(); shape.rank()];
        Self::new(dir, from, into, access, shape)
    }

    pub fn with_agg_op(mut self, agg_op: Option<&str>) -> Self {
        self.agg_op = agg_op.map(str::to_string);
        self
    }

    pub fn with_const(mut self, is_const: bool) -> Self {
        self.is_const = is_const;
        self
    }
}

impl fmt::Display for Refinement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.dir, self.into)?;
        if !self.from.is_empty() && self.from != self.into {
            write!(f, " = {}", self.from)?;
        }
        let access: Vec<String> = self.access.iter().map(|a| a.to_string()).collect();
        write!(f, "[{}] {}", access.join(", "), self.shape)?;
        if let Some(agg) = &self.agg_op {
            write!(f, " agg:{}", agg)?;
        }
        if self.is_const {
            write!(f, " const")?;
        }
        Ok(())
    }
}

/// A loop index ranging over `0..range`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Index {
    pub name: String,
    pub range: u64,
}

impl Index {
    pub fn new(name: impl Into<String>, range: u64) -> Self {
        Self {
            name: name.into(),
            range,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ConstValue {
    Int(i64),
    Float(f64),
}

impl fmt::Display for ConstValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstValue::Int(v) => write!(f, "{}", v),
            ConstValue::Float(v) => write!(f, "{:?}", v),
        }
    }
}

/// Read one element of a refined buffer into a scalar
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Load {
    pub from: String,
    pub into: String,
}

/// Write a scalar into a refined buffer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Store {
    pub from: String,
    pub into: String,
}

/// Define a scalar from a literal
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Constant {
    pub name: String,
    pub value: ConstValue,
}

/// Scalar operation over named scalars
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Intrinsic {
    pub name: String,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
}

impl Intrinsic {
    pub const ASSIGN: &'static str = "assign";
    pub const SUM: &'static str = "add";
    pub const MAX: &'static str = "max";
    pub const MIN: &'static str = "min";
    pub const PROD: &'static str = "mul";
    pub const MUL: &'static str = "mul";
    pub const ADD: &'static str = "add";
    pub const EQ: &'static str = "eq";
    pub const COND: &'static str = "cond";
}

/// Whole-buffer operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Special {
    pub name: String,
    pub params: Vec<String>,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
}

impl Special {
    pub const ZERO: &'static str = "zero";
    pub const COPY: &'static str = "copy";
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Statement {
    Block(Box<Block>),
    Load(Load),
    Store(Store),
    Constant(Constant),
    Intrinsic(Intrinsic),
    Special(Special),
}

impl Statement {
    pub fn load(from: impl Into<String>, into: impl Into<String>) -> Self {
        Statement::Load(Load {
            from: from.into(),
            into: into.into(),
        })
    }

    pub fn store(from: impl Into<String>, into: impl Into<String>) -> Self {
        Statement::Store(Store {
            from: from.into(),
            into: into.into(),
        })
    }

    pub fn constant(name: impl Into<String>, value: ConstValue) -> Self {
        Statement::Constant(Constant {
            name: name.into(),
            value,
        })
    }

    pub fn intrinsic(name: impl Into<String>, inputs: Vec<String>, outputs: Vec<String>) -> Self {
        Statement::Intrinsic(Intrinsic {
            name: name.into(),
            inputs,
            outputs,
        })
    }

    pub fn special(
        name: impl Into<String>,
        params: Vec<String>,
        inputs: Vec<String>,
        outputs: Vec<String>,
    ) -> Self {
        Statement::Special(Special {
            name: name.into(),
            params,
            inputs,
            outputs,
        })
    }

    pub fn as_block(&self) -> Option<&Block> {
        match self {
            Statement::Block(block) => Some(block),
            _ => None,
        }
    }

    pub fn as_special(&self) -> Option<&Special> {
        match self {
            Statement::Special(special) => Some(special),
            _ => None,
        }
    }
}

/// A scope node of the IR
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Block {
    pub name: String,
    pub comments: String,
    pub tags: BTreeSet<String>,
    pub idxs: Vec<Index>,
    pub refs: Vec<Refinement>,
    /// Each expression must be nonnegative for the body to run
    pub constraints: Vec<Affine>,
    pub stmts: Vec<Statement>,
}

impl Block {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn set_tag(&mut self, tag: impl Into<String>) {
        self.tags.insert(tag.into());
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    pub fn idx_by_name(&self, name: &str) -> Option<&Index> {
        self.idxs.iter().find(|idx| idx.name == name)
    }

    pub fn ref_by_into(&self, name: &str) -> Option<&Refinement> {
        self.refs.iter().find(|r| r.into == name)
    }

    /// Directly nested blocks, in statement order
    pub fn sub_blocks(&self) -> impl Iterator<Item = &Block> {
        self.stmts.iter().filter_map(Statement::as_block)
    }

    pub fn push(&mut self, stmt: Statement) {
        self.stmts.push(stmt);
    }

    pub fn push_block(&mut self, block: Block) {
        self.stmts.push(Statement::Block(Box::new(block)));
    }

    /// Count of blocks nested anywhere below this one
    pub fn block_count(&self) -> usize {
        self.sub_blocks().map(|b| 1 + b.block_count()).sum()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    fn write_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let pad = "  ".repeat(depth);
        write!(f, "{}block {}", pad, self.name)?;
        for tag in &self.tags {
            write!(f, " #{}", tag)?;
        }
        if !self.comments.is_empty() {
            write!(f, " // {}", self.comments)?;
        }
        writeln!(f)?;
        if !self.idxs.is_empty() {
            let idxs: Vec<String> = self
                .idxs
                .iter()
                .map(|idx| format!("{}:{}", idx.name, idx.range))
                .collect();
            writeln!(f, "{}  idxs {}", pad, idxs.join(", "))?;
        }
        for con in &self.constraints {
            writeln!(f, "{}  require {} >= 0", pad, con)?;
        }
        for r in &self.refs {
            writeln!(f, "{}  {}", pad, r)?;
        }
        for stmt in &self.stmts {
            match stmt {
                Statement::Block(inner) => inner.write_indented(f, depth + 1)?,
                Statement::Load(load) => writeln!(f, "{}  {} = load({})", pad, load.into, load.from)?,
                Statement::Store(store) => {
                    writeln!(f, "{}  {} = store({})", pad, store.into, store.from)?
                }
                Statement::Constant(c) => writeln!(f, "{}  {} = {}", pad, c.name, c.value)?,
                Statement::Intrinsic(op) => writeln!(
                    f,
                    "{}  {} = {}({})",
                    pad,
                    op.outputs.join(", "),
                    op.name,
                    op.inputs.join(", ")
                )?,
                Statement::Special(sp) => {
                    write!(f, "{}  {} = {}", pad, sp.outputs.join(", "), sp.name)?;
                    if !sp.params.is_empty() {
                        write!(f, "<{}>", sp.params.join(", "))?;
                    }
                    writeln!(f, "({})", sp.inputs.join(", "))?
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_indented(f, 0)
    }
}
