//! Contraction compiler
//!
//! Turns one contraction op into a kernel block: bounds for every index,
//! integer accesses for every tensor, residual constraints, and a body of
//! loads, a combination intrinsic and a store. Outputs whose kernel might
//! leave elements unwritten get a ZERO (or COPY) special in front of the
//! kernel.

use std::collections::BTreeSet;

use log::Level;

use crate::affine::Affine;
use crate::ast::{AggregationOp, CombinationOp, Contraction, Op, TensorShape};
use crate::block::{Block, Index, Intrinsic, RefDir, Refinement, Special, Statement};
use crate::bound::{constraints_to_string, IndexBounds, RangeConstraint};
use crate::error::{CompileError, CompileResult};
use crate::generator::Generator;
use crate::poly::Polynomial;
use crate::scope::scalar_name;

/// Intrinsic name used to merge writes for an aggregation
pub fn agg_op_name(op: AggregationOp) -> Option<&'static str> {
    match op {
        AggregationOp::Sum => Some(Intrinsic::SUM),
        AggregationOp::Max => Some(Intrinsic::MAX),
        AggregationOp::Min => Some(Intrinsic::MIN),
        AggregationOp::Prod => Some(Intrinsic::PROD),
        AggregationOp::Assign => Some(Intrinsic::ASSIGN),
        AggregationOp::None => None,
    }
}

/// Intrinsic name that combines the input scalars
pub fn comb_op_name(op: CombinationOp) -> Option<&'static str> {
    match op {
        CombinationOp::Multiply => Some(Intrinsic::MUL),
        CombinationOp::Plus => Some(Intrinsic::ADD),
        CombinationOp::Eq => Some(Intrinsic::EQ),
        CombinationOp::Cond => Some(Intrinsic::COND),
        CombinationOp::None => None,
    }
}

/// An output polynomial that cannot be inverted to a plain index
fn is_fancy(poly: &Polynomial) -> bool {
    poly.term_count() > 2 || (poly.term_count() == 2 && poly.constant().is_zero())
}

/// Substitute bound minimums into `poly`, dropping indexes whose bound is tight.
///
/// Kernel indexes run from zero, so an index `v` with bound `[min, max]`
/// contributes `coeff * min` to the constant and keeps `coeff * v` only when
/// `min != max`.
pub fn integerize(poly: &Polynomial, bounds: &IndexBounds) -> CompileResult<Affine> {
    let mut result = Affine::new();
    if !poly.constant().is_integer() {
        return Err(CompileError::non_integer(poly.to_string()));
    }
    result += poly.constant().numer();
    for (name, coeff) in poly.terms() {
        if !coeff.is_integer() {
            return Err(CompileError::non_integer(poly.to_string()));
        }
        let value = coeff.numer();
        let bound = bounds
            .get(name)
            .ok_or_else(|| CompileError::unsolvable(format!("no bound for index {}", name)))?;
        result += value * bound.min;
        if !bound.is_tight() {
            result += Affine::term(name, value);
        }
    }
    Ok(result)
}

/// Whether the output must be initialized before `block` runs.
///
/// The output is assumed to be `block.refs[0]`. It is covered exactly once
/// only if every dimension is either a size-one zero access or a unique unit
/// index spanning the whole dimension, and no constraint restricts output
/// indexes alone. Anything else presumes initialization is needed.
pub fn needs_initialize(block: &Block, out_shape: &TensorShape) -> bool {
    let Some(out_ref) = block.refs.first() else {
        return true;
    };
    let mut out_idxs = BTreeSet::new();
    for (i, dim) in out_shape.dims.iter().enumerate() {
        let Some(affine) = out_ref.access.get(i) else {
            return true;
        };
        if *affine == 0 && dim.size == 1 {
            continue;
        }
        let Some(idx) = affine.as_simple_index() else {
            return true;
        };
        if !out_idxs.insert(idx) {
            return true;
        }
        match block.idx_by_name(idx) {
            Some(index) if index.range == dim.size => {}
            _ => return true,
        }
    }
    // Constraints touching only output indexes shrink the written region.
    // Constraints that also use other indexes only limit which inputs contribute.
    block
        .constraints
        .iter()
        .any(|con| con.vars().all(|name| out_idxs.contains(name)))
}

impl Generator<'_> {
    pub(crate) fn process_contraction(
        &self,
        main: &mut Block,
        op: &Op,
        cion: &Contraction,
    ) -> CompileResult<()> {
        if self.scope.shape(&op.output)?.byte_size() == 0 {
            self.log(
                Level::Debug,
                format!("Contraction output {} size==0; skipping", op.output),
            );
            return Ok(());
        }
        let shapes = cion
            .specs
            .iter()
            .map(|spec| self.scope.shape(&spec.id))
            .collect::<CompileResult<Vec<_>>>()?;
        let (cion, range_cons) = self.compile_contraction(cion, &shapes)?;

        let (bounds, simple_cons) = match self.solver.compute_bounds(&range_cons) {
            Ok(result) => result,
            Err(err) => {
                self.log(
                    Level::Warn,
                    format!("Unable to compute bounds for contraction: {}", cion),
                );
                return Err(err);
            }
        };

        let mut kernel = self.new_kernel(main, op);
        kernel.set_tag("contraction");
        kernel.set_tag(format!("agg_op_{}", agg_op_name(cion.agg_op).unwrap_or("")));

        let mut scalar_inputs = Vec::new();
        for (i, spec) in cion.specs.iter().enumerate() {
            let shape = self.scope.scalar_shape(&spec.id)?;
            let access = spec
                .spec
                .iter()
                .map(|poly| integerize(poly, &bounds))
                .collect::<CompileResult<Vec<_>>>()?;
            if i == 0 {
                kernel.refs.push(
                    Refinement::new(RefDir::Out, &spec.id, &spec.id, access, shape)
                        .with_agg_op(agg_op_name(cion.agg_op)),
                );
                continue;
            }
            let scalar = scalar_name(&spec.id);
            scalar_inputs.push(scalar.clone());
            // Fold compile-time scalars straight into the body
            if let Some(value) = self.scope.constant_value(&spec.id) {
                kernel.push(Statement::constant(scalar, value));
                continue;
            }
            kernel.refs.push(
                Refinement::new(RefDir::In, &spec.id, &spec.id, access, shape)
                    .with_const(self.scope.is_const(&spec.id)),
            );
            kernel.push(Statement::load(&spec.id, scalar));
        }

        for (name, bound) in &bounds {
            let range = bound.range();
            if range != 1 {
                kernel.idxs.push(Index::new(name, range));
            }
        }
        for con in &simple_cons {
            // lhs <= rhs  becomes  rhs - lhs >= 0
            let mut lhs = integerize(&con.poly, &bounds)?;
            lhs -= con.rhs;
            kernel.constraints.push(-lhs);
        }

        if needs_initialize(&kernel, &shapes[0]) {
            let init = match &cion.use_default {
                None => Statement::special(Special::ZERO, vec![], vec![], vec![op.output.clone()]),
                Some(default) => Statement::special(
                    Special::COPY,
                    vec![],
                    vec![default.clone()],
                    vec![op.output.clone()],
                ),
            };
            main.push(init);
        }

        let out_scalar = scalar_name(&op.output);
        if scalar_inputs.len() > 1 {
            if let Some(combo) = comb_op_name(cion.comb_op) {
                kernel.push(Statement::intrinsic(combo, scalar_inputs, vec![out_scalar.clone()]));
                kernel.set_tag(format!("comb_op_{}", combo));
            }
        } else {
            kernel.push(Statement::intrinsic(
                Intrinsic::ASSIGN,
                scalar_inputs,
                vec![out_scalar.clone()],
            ));
        }
        kernel.push(Statement::store(out_scalar, &op.output));

        main.push_block(kernel);
        Ok(())
    }

    /// Normalize a contraction and derive its range constraints
    fn compile_contraction(
        &self,
        cion: &Contraction,
        shapes: &[TensorShape],
    ) -> CompileResult<(Contraction, Vec<RangeConstraint>)> {
        if !(2..=4).contains(&cion.specs.len()) {
            return Err(CompileError::UnsupportedArity {
                count: cion.specs.len(),
            });
        }
        self.log(Level::Trace, format!("Original: {}", cion));
        let integral = self.solver.constrain_index_vars_to_ints(cion);
        self.log(Level::Trace, format!("With index variables made integral: {}", integral));

        let fancy = cion.specs[0].spec.iter().any(is_fancy);
        let mut cons = self.solver.gather_constraints(&integral, shapes);
        self.log(Level::Trace, format!("Constraints: {}", constraints_to_string(&cons)));

        let reduced = if fancy && !cion.no_defract {
            let reduced = self.solver.reduce_output_polynomials(&integral, &cons)?;
            self.log(Level::Trace, format!("Reduced: {}", reduced));
            cons = self.solver.gather_constraints(&reduced, shapes);
            reduced
        } else {
            integral
        };
        self.solver.merge_parallel_constraints(&mut cons);
        self.log(
            Level::Trace,
            format!("Merged parallel constraints: {}", constraints_to_string(&cons)),
        );

        let defracted = self.solver.defract(&reduced, &cons)?;
        self.log(Level::Trace, format!("Defracted: {}", defracted));
        // Defract may introduce new parallel constraints
        let mut cons = self.solver.gather_constraints(&defracted, shapes);
        self.solver.merge_parallel_constraints(&mut cons);
        Ok((defracted, cons))
    }
}
