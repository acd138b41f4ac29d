//! Elementwise compiler
//!
//! One kernel per function op: an index per output dimension, broadcast
//! aware loads for tensor inputs, folded literals for scalar inputs, and
//! the function applied as an intrinsic.

use log::Level;

use crate::affine::Affine;
use crate::ast::{Binding, Function, Op};
use crate::block::{Block, Index, RefDir, Refinement, Statement};
use crate::error::{CompileError, CompileResult};
use crate::generator::Generator;
use crate::scope::scalar_name;

/// Access for an input broadcast against the output indexes.
///
/// Dimensions are aligned from the right: missing leading dimensions are
/// omitted, and size-one dimensions are accessed at zero.
pub fn broadcast_access(input_sizes: &[u64], out_idxs: &[Index]) -> Option<Vec<Affine>> {
    let diff = out_idxs.len().checked_sub(input_sizes.len())?;
    let access = input_sizes
        .iter()
        .zip(&out_idxs[diff..])
        .map(|(&size, idx)| {
            if size > 1 {
                Affine::var(&idx.name)
            } else {
                Affine::new()
            }
        })
        .collect();
    Some(access)
}

impl Generator<'_> {
    pub(crate) fn process_elementwise(&self, main: &mut Block, op: &Op, func: &Function) -> CompileResult<()> {
        let mut kernel = self.new_kernel(main, op);
        kernel.set_tag("eltwise");
        kernel.set_tag(format!("eltwise_{}", func.name));

        let out_shape = self.scope.shape(&op.output)?;
        let mut out_access = Vec::with_capacity(out_shape.rank());
        for (i, dim) in out_shape.dims.iter().enumerate() {
            let idx = Index::new(format!("i{}", i + 1), dim.size);
            if dim.size > 1 {
                out_access.push(Affine::var(&idx.name));
            } else {
                out_access.push(Affine::new());
            }
            kernel.idxs.push(idx);
        }

        for input in &op.inputs {
            let binding = self.scope.binding(input)?;
            self.log(Level::Trace, format!("  {}: {}", input, binding));
            match binding {
                Binding::Tensor(shape) => {
                    let access = broadcast_access(&shape.sizes(), &kernel.idxs).ok_or_else(|| {
                        CompileError::BroadcastRank {
                            name: input.clone(),
                            input_rank: shape.rank(),
                            output_rank: out_shape.rank(),
                        }
                    })?;
                    kernel.refs.push(
                        Refinement::new(RefDir::In, input, input, access, self.scope.scalar_shape(input)?)
                            .with_const(self.scope.is_const(input)),
                    );
                    kernel.push(Statement::load(input, scalar_name(input)));
                }
                Binding::IntConst(_) | Binding::FloatConst(_) => {
                    if let Some(value) = self.scope.constant_value(input) {
                        kernel.push(Statement::constant(scalar_name(input), value));
                    }
                }
                Binding::Tuple => {
                    return Err(CompileError::unimplemented(format!(
                        "tuple input '{}' to elementwise {}",
                        input, func.name
                    )));
                }
            }
        }

        // Size-one dimensions never vary
        kernel.idxs.retain(|idx| idx.range != 1);

        kernel.refs.push(Refinement::new(
            RefDir::Out,
            &op.output,
            &op.output,
            out_access,
            self.scope.scalar_shape(&op.output)?,
        ));

        let scalar_inputs = op.inputs.iter().map(|input| scalar_name(input)).collect();
        let out_scalar = scalar_name(&op.output);
        kernel.push(Statement::intrinsic(&func.name, scalar_inputs, vec![out_scalar.clone()]));
        kernel.push(Statement::store(out_scalar, &op.output));

        main.push_block(kernel);
        Ok(())
    }
}
