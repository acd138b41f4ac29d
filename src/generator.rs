//! Generator orchestrator
//!
//! Builds the program block and its `main` entry block, declares the
//! program's inputs and outputs, lowers every op in order, and finally
//! declares storage for the temporaries that flow between kernels.

use log::Level;

use crate::ast::{AggregationOp, Function, Op, OpKind, RunInfo, ShapeMap};
use crate::block::{Block, RefDir, Refinement, Statement};
use crate::bound::{BoundSolver, DefaultSolver};
use crate::contraction::agg_op_name;
use crate::error::CompileResult;
use crate::observer::{LogObserver, Observer};
use crate::scope::Scope;

/// Lower a bound program with the default solver, logging through `log`
pub fn generate(runinfo: &RunInfo) -> CompileResult<Block> {
    generate_with(runinfo, &DefaultSolver, &LogObserver)
}

/// Lower a bound program with an injected solver and observer
pub fn generate_with(
    runinfo: &RunInfo,
    solver: &dyn BoundSolver,
    observer: &dyn Observer,
) -> CompileResult<Block> {
    Generator::new(runinfo, solver, observer).run()
}

/// State for one generation; consumed by [`Generator::run`]
pub struct Generator<'a> {
    runinfo: &'a RunInfo,
    pub(crate) scope: Scope<'a>,
    pub(crate) solver: &'a dyn BoundSolver,
    observer: &'a dyn Observer,
}

impl<'a> Generator<'a> {
    pub fn new(runinfo: &'a RunInfo, solver: &'a dyn BoundSolver, observer: &'a dyn Observer) -> Self {
        Self {
            runinfo,
            scope: Scope::new(&runinfo.bindings, &runinfo.const_inputs),
            solver,
            observer,
        }
    }

    pub(crate) fn log(&self, level: Level, message: String) {
        self.observer.log(level, &message);
    }

    pub fn run(mut self) -> CompileResult<Block> {
        let runinfo = self.runinfo;
        let mut program = Block::new(&runinfo.program_name);
        program.set_tag("program");
        self.log(Level::Info, format!("Compiling {} ops", runinfo.program.ops.len()));

        // In/Out refinements on main are the caller's buffers; kernels are
        // the blocks nested directly in main.
        let mut main = Block::new("main");
        main.set_tag("main");
        self.add_decls(&mut program, &mut main, &runinfo.input_shapes, true);
        self.add_decls(&mut program, &mut main, &runinfo.output_shapes, false);

        for op in &runinfo.program.ops {
            self.log(Level::Debug, format!("Processing: {}", op));
            match &op.kind {
                OpKind::Contraction(cion) => self.process_contraction(&mut main, op, cion)?,
                OpKind::Function(func) if func.is_special() => self.process_special(&mut main, op, func),
                OpKind::Function(func) if func.is_reshape() => self.process_reshape(&mut main, op, func),
                OpKind::Function(func) => self.process_elementwise(&mut main, op, func)?,
                // Already folded by the binder
                OpKind::Constant => {}
            }
        }
        program.push_block(main);

        for (name, shape) in self.scope.temporaries() {
            program.refs.push(
                Refinement::whole(RefDir::None, "", name, shape.clone()).with_const(self.scope.is_const(name)),
            );
        }
        self.log(Level::Debug, "Done".to_string());
        Ok(program)
    }

    /// Declare external buffers: storage on the program, a view on main
    fn add_decls(&mut self, program: &mut Block, main: &mut Block, shapes: &ShapeMap, is_input: bool) {
        for (name, shape) in shapes {
            self.scope.mark_external(name);
            let is_const = self.scope.is_const(name);
            program
                .refs
                .push(Refinement::whole(RefDir::None, "", name, shape.clone()).with_const(is_const));
            let view = if is_input {
                Refinement::whole(RefDir::In, name, name, shape.clone()).with_const(is_const)
            } else {
                Refinement::whole(RefDir::Out, name, name, shape.clone())
                    .with_agg_op(agg_op_name(AggregationOp::Assign))
            };
            main.refs.push(view);
        }
    }

    fn process_special(&self, main: &mut Block, op: &Op, func: &Function) {
        main.push(Statement::special(
            &func.name,
            func.params.clone(),
            op.inputs.clone(),
            vec![op.output.clone()],
        ));
    }

    /// The shape argument of a reshape is metadata, so only the first input is data
    fn process_reshape(&self, main: &mut Block, op: &Op, func: &Function) {
        main.push(Statement::special(
            &func.name,
            func.params.clone(),
            op.inputs.iter().take(1).cloned().collect(),
            vec![op.output.clone()],
        ));
    }

    /// A fresh kernel named after its position in `parent`
    pub(crate) fn new_kernel(&self, parent: &Block, op: &Op) -> Block {
        let name = match op.pid() {
            Some(pid) => pid.to_string(),
            None => format!("kernel_{}", parent.stmts.len()),
        };
        let mut block = Block::new(name);
        block.comments = op.to_string();
        block.set_tag("kernel");
        block
    }
}
