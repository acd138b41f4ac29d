//! Input program definitions: bound tensor operations and their bindings
//!
//! These types are produced by the parser and binder stages and are
//! read-only while the block IR is generated.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CompileResult;
use crate::poly::Polynomial;

/// Element type of a tensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Float16,
    Float32,
    Float64,
}

impl DataType {
    pub fn byte_width(&self) -> u64 {
        match self {
            DataType::Bool | DataType::Int8 | DataType::Uint8 => 1,
            DataType::Int16 | DataType::Uint16 | DataType::Float16 => 2,
            DataType::Int32 | DataType::Uint32 | DataType::Float32 => 4,
            DataType::Int64 | DataType::Uint64 | DataType::Float64 => 8,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Bool => "bool",
            DataType::Int8 => "i8",
            DataType::Int16 => "i16",
            DataType::Int32 => "i32",
            DataType::Int64 => "i64",
            DataType::Uint8 => "u8",
            DataType::Uint16 => "u16",
            DataType::Uint32 => "u32",
            DataType::Uint64 => "u64",
            DataType::Float16 => "f16",
            DataType::Float32 => "f32",
            DataType::Float64 => "f64",
        };
        write!(f, "{}", name)
    }
}

/// One dimension of a tensor: extent and element stride
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TensorDimension {
    pub stride: i64,
    pub size: u64,
}

impl TensorDimension {
    pub fn new(stride: i64, size: u64) -> Self {
        Self { stride, size }
    }
}

/// Element type plus ordered dimensions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TensorShape {
    #[serde(rename = "type")]
    pub dtype: DataType,
    pub dims: Vec<TensorDimension>,
}

impl TensorShape {
    pub fn new(dtype: DataType, dims: Vec<TensorDimension>) -> Self {
        Self { dtype, dims }
    }

    /// Dense row-major shape with the given sizes
    pub fn from_sizes(dtype: DataType, sizes: &[u64]) -> Self {
        let mut dims = Vec::with_capacity(sizes.len());
        let mut stride = 1i64;
        for &size in sizes.iter().rev() {
            dims.push(TensorDimension::new(stride, size));
            stride = stride.saturating_mul(i64::try_from(size).unwrap_or(i64::MAX));
        }
        dims.reverse();
        Self { dtype, dims }
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    pub fn sizes(&self) -> Vec<u64> {
        self.dims.iter().map(|d| d.size).collect()
    }

    /// Saturates at `u64::MAX` rather than overflowing
    pub fn elem_count(&self) -> u64 {
        self.dims.iter().fold(1u64, |acc, d| acc.saturating_mul(d.size))
    }

    pub fn byte_size(&self) -> u64 {
        self.elem_count().saturating_mul(self.dtype.byte_width())
    }
}

impl fmt::Display for TensorShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.dtype)?;
        for (i, dim) in self.dims.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}:{}", dim.size, dim.stride)?;
        }
        write!(f, ")")
    }
}

/// What the binder resolved a program variable to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Binding {
    Tensor(TensorShape),
    IntConst(i64),
    FloatConst(f64),
    Tuple,
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Binding::Tensor(shape) => write!(f, "{}", shape),
            Binding::IntConst(v) => write!(f, "int {}", v),
            Binding::FloatConst(v) => write!(f, "float {}", v),
            Binding::Tuple => write!(f, "tuple"),
        }
    }
}

/// Variable name to binding; ordered so generation is deterministic
pub type Bindings = BTreeMap<String, Binding>;

/// Declared program inputs or outputs
pub type ShapeMap = BTreeMap<String, TensorShape>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationOp {
    #[default]
    None,
    Sum,
    Max,
    Min,
    Prod,
    Assign,
}

impl AggregationOp {
    fn symbol(&self) -> &'static str {
        match self {
            AggregationOp::None => "",
            AggregationOp::Sum => "+",
            AggregationOp::Max => ">",
            AggregationOp::Min => "<",
            AggregationOp::Prod => "*",
            AggregationOp::Assign => "=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CombinationOp {
    #[default]
    None,
    Multiply,
    Plus,
    Eq,
    Cond,
}

/// A tensor reference inside a contraction: one index polynomial per dimension
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TensorSpec {
    pub id: String,
    pub spec: Vec<Polynomial>,
}

impl TensorSpec {
    pub fn new(id: impl Into<String>, spec: Vec<Polynomial>) -> Self {
        Self { id: id.into(), spec }
    }

    /// Build a spec from polynomial text, e.g. `TensorSpec::parse("A", &["i", "k + 1"])`
    pub fn parse(id: impl Into<String>, polys: &[&str]) -> CompileResult<Self> {
        let spec = polys
            .iter()
            .map(|p| p.parse())
            .collect::<CompileResult<Vec<Polynomial>>>()?;
        Ok(Self::new(id, spec))
    }
}

impl fmt::Display for TensorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[", self.id)?;
        for (i, poly) in self.spec.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", poly)?;
        }
        write!(f, "]")
    }
}

/// An explicit user constraint `poly < range` on a contraction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintSpec {
    pub poly: Polynomial,
    pub range: u64,
}

impl ConstraintSpec {
    pub fn new(poly: Polynomial, range: u64) -> Self {
        Self { poly, range }
    }
}

/// An Einstein-summation style operation. `specs[0]` is the output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contraction {
    pub agg_op: AggregationOp,
    #[serde(default)]
    pub comb_op: CombinationOp,
    pub specs: Vec<TensorSpec>,
    #[serde(default)]
    pub constraints: Vec<ConstraintSpec>,
    /// Buffer to copy into the output before accumulation
    #[serde(default)]
    pub use_default: Option<String>,
    #[serde(default)]
    pub no_defract: bool,
}

impl Contraction {
    pub fn new(agg_op: AggregationOp, comb_op: CombinationOp, specs: Vec<TensorSpec>) -> Self {
        Self {
            agg_op,
            comb_op,
            specs,
            constraints: Vec::new(),
            use_default: None,
            no_defract: false,
        }
    }

    pub fn with_constraint(mut self, poly: Polynomial, range: u64) -> Self {
        self.constraints.push(ConstraintSpec::new(poly, range));
        self
    }

    pub fn with_default(mut self, name: impl Into<String>) -> Self {
        self.use_default = Some(name.into());
        self
    }
}

impl fmt::Display for Contraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some((output, inputs)) = self.specs.split_first() else {
            return write!(f, "<empty contraction>");
        };
        write!(f, "{} = {}(", output, self.agg_op.symbol())?;
        let rendered: Vec<String> = inputs.iter().map(|s| s.to_string()).collect();
        match (self.comb_op, rendered.as_slice()) {
            (CombinationOp::Cond, [a, b, c]) => write!(f, "{} == {} ? {}", a, b, c)?,
            (op, parts) => {
                let sep = match op {
                    CombinationOp::Multiply => " * ",
                    CombinationOp::Plus => " + ",
                    CombinationOp::Eq => " == ",
                    CombinationOp::Cond => " ? ",
                    CombinationOp::None => ", ",
                };
                write!(f, "{}", parts.join(sep))?;
            }
        }
        write!(f, ")")?;
        for con in &self.constraints {
            write!(f, ", {} < {}", con.poly, con.range)?;
        }
        if let Some(default) = &self.use_default {
            write!(f, " default {}", default)?;
        }
        if self.no_defract {
            write!(f, " no_defract")?;
        }
        Ok(())
    }
}

/// A named function application, elementwise unless flagged otherwise
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    #[serde(rename = "fn")]
    pub name: String,
    #[serde(default)]
    pub params: Vec<String>,
    /// Whole-tensor operation emitted without a per-element kernel
    #[serde(default)]
    pub special: bool,
    #[serde(default)]
    pub reshape: bool,
}

impl Function {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            special: false,
            reshape: false,
        }
    }

    pub fn is_special(&self) -> bool {
        self.special
    }

    pub fn is_reshape(&self) -> bool {
        self.reshape || self.name == "reshape"
    }
}

/// Free-form op annotation, e.g. `pid("my_kernel")`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    #[serde(default)]
    pub params: Vec<String>,
}

impl Attribute {
    pub fn new(name: impl Into<String>, params: Vec<String>) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tag", rename_all = "snake_case")]
pub enum OpKind {
    Contraction(Contraction),
    Function(Function),
    Constant,
}

/// One operation of the parsed program
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Op {
    pub output: String,
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(flatten)]
    pub kind: OpKind,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

impl Op {
    /// A contraction op; output and inputs are taken from the specs
    pub fn contraction(cion: Contraction) -> Self {
        let output = cion.specs.first().map(|s| s.id.clone()).unwrap_or_default();
        let inputs = cion.specs.iter().skip(1).map(|s| s.id.clone()).collect();
        Self {
            output,
            inputs,
            kind: OpKind::Contraction(cion),
            attributes: Vec::new(),
        }
    }

    pub fn function(output: impl Into<String>, f: Function, inputs: &[&str]) -> Self {
        Self {
            output: output.into(),
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            kind: OpKind::Function(f),
            attributes: Vec::new(),
        }
    }

    pub fn elementwise(output: impl Into<String>, name: &str, inputs: &[&str]) -> Self {
        Self::function(output, Function::new(name), inputs)
    }

    pub fn constant(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            inputs: Vec::new(),
            kind: OpKind::Constant,
            attributes: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, attr: Attribute) -> Self {
        self.attributes.push(attr);
        self
    }

    /// Explicit kernel name from a `pid` attribute, if any
    pub fn pid(&self) -> Option<&str> {
        self.attributes
            .iter()
            .filter(|a| a.name == "pid")
            .filter_map(|a| a.params.first())
            .last()
            .map(String::as_str)
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            OpKind::Contraction(cion) => write!(f, "{}", cion),
            OpKind::Function(func) => {
                write!(f, "{} = {}", self.output, func.name)?;
                if !func.params.is_empty() {
                    write!(f, "[{}]", func.params.join(", "))?;
                }
                write!(f, "({})", self.inputs.join(", "))
            }
            OpKind::Constant => write!(f, "{} = constant", self.output),
        }
    }
}

/// A complete parsed program
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub ops: Vec<Op>,
}

/// Everything the generator needs for one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunInfo {
    #[serde(default = "default_program_name")]
    pub program_name: String,
    pub program: Program,
    pub bindings: Bindings,
    #[serde(default)]
    pub input_shapes: ShapeMap,
    #[serde(default)]
    pub output_shapes: ShapeMap,
    /// Inputs whose contents are known not to change between runs
    #[serde(default)]
    pub const_inputs: BTreeSet<String>,
}

fn default_program_name() -> String {
    "program".to_string()
}

impl RunInfo {
    pub fn new(program_name: impl Into<String>) -> Self {
        Self {
            program_name: program_name.into(),
            program: Program::default(),
            bindings: Bindings::new(),
            input_shapes: ShapeMap::new(),
            output_shapes: ShapeMap::new(),
            const_inputs: BTreeSet::new(),
        }
    }

    /// Declare a program input and bind it as a tensor
    pub fn input(mut self, name: &str, shape: TensorShape) -> Self {
        self.bindings.insert(name.to_string(), Binding::Tensor(shape.clone()));
        self.input_shapes.insert(name.to_string(), shape);
        self
    }

    /// Declare a program output and bind it as a tensor
    pub fn output(mut self, name: &str, shape: TensorShape) -> Self {
        self.bindings.insert(name.to_string(), Binding::Tensor(shape.clone()));
        self.output_shapes.insert(name.to_string(), shape);
        self
    }

    pub fn bind(mut self, name: &str, binding: Binding) -> Self {
        self.bindings.insert(name.to_string(), binding);
        self
    }

    pub fn op(mut self, op: Op) -> Self {
        self.program.ops.push(op);
        self
    }

    pub fn const_input(mut self, name: &str) -> Self {
        self.const_inputs.insert(name.to_string());
        self
    }
}
