//! Read-only lookup of variable bindings during generation

use std::collections::BTreeSet;

use crate::ast::{Binding, Bindings, DataType, TensorDimension, TensorShape};
use crate::block::ConstValue;
use crate::error::{CompileError, CompileResult};

/// Binding table plus the set of names declared as program inputs/outputs
pub struct Scope<'a> {
    bindings: &'a Bindings,
    const_inputs: &'a BTreeSet<String>,
    externals: BTreeSet<String>,
}

impl<'a> Scope<'a> {
    pub fn new(bindings: &'a Bindings, const_inputs: &'a BTreeSet<String>) -> Self {
        Self {
            bindings,
            const_inputs,
            externals: BTreeSet::new(),
        }
    }

    pub fn binding(&self, name: &str) -> CompileResult<&'a Binding> {
        self.bindings
            .get(name)
            .ok_or_else(|| CompileError::unknown_shape(name))
    }

    /// Shape of a variable; scalar constants have rank zero
    pub fn shape(&self, name: &str) -> CompileResult<TensorShape> {
        match self.binding(name)? {
            Binding::Tensor(shape) => Ok(shape.clone()),
            Binding::IntConst(_) => Ok(TensorShape::new(DataType::Int64, Vec::new())),
            Binding::FloatConst(_) => Ok(TensorShape::new(DataType::Float64, Vec::new())),
            Binding::Tuple => Err(CompileError::unimplemented(format!(
                "tuple binding '{}' used as a tensor",
                name
            ))),
        }
    }

    /// The per-element view of a variable: same strides, every size one
    pub fn scalar_shape(&self, name: &str) -> CompileResult<TensorShape> {
        let shape = self.shape(name)?;
        let dims = shape
            .dims
            .iter()
            .map(|dim| TensorDimension::new(dim.stride, 1))
            .collect();
        Ok(TensorShape::new(shape.dtype, dims))
    }

    /// Literal value if the variable is bound to a compile-time scalar
    pub fn constant_value(&self, name: &str) -> Option<ConstValue> {
        match self.bindings.get(name) {
            Some(Binding::IntConst(v)) => Some(ConstValue::Int(*v)),
            Some(Binding::FloatConst(v)) => Some(ConstValue::Float(*v)),
            _ => None,
        }
    }

    pub fn is_const(&self, name: &str) -> bool {
        self.const_inputs.contains(name)
    }

    pub fn mark_external(&mut self, name: &str) {
        self.externals.insert(name.to_string());
    }

    pub fn is_external(&self, name: &str) -> bool {
        self.externals.contains(name)
    }

    /// Tensor-typed variables that are neither program inputs nor outputs
    pub fn temporaries(&self) -> impl Iterator<Item = (&'a str, &'a TensorShape)> + '_ {
        let bindings: &'a Bindings = self.bindings;
        bindings.iter().filter_map(move |(name, binding)| match binding {
            Binding::Tensor(shape) if !self.is_external(name) => Some((name.as_str(), shape)),
            _ => None,
        })
    }
}

/// Scalar register name for a buffer
pub fn scalar_name(name: &str) -> String {
    format!("${}", name)
}
