//! End-to-end lowering tests

use log::Level;
use pretty_assertions::assert_eq;

use tensor_to_block::{
    generate, generate_from_json, generate_with, Affine, AggregationOp, Binding, Block,
    CombinationOp, CompileError, ConstValue, Contraction, DataType, DefaultSolver, Function, Op,
    RecordingObserver, RefDir, RunInfo, Special, Statement, TensorShape, TensorSpec,
};

fn f32(sizes: &[u64]) -> TensorShape {
    TensorShape::from_sizes(DataType::Float32, sizes)
}

fn spec(id: &str, polys: &[&str]) -> TensorSpec {
    TensorSpec::parse(id, polys).unwrap()
}

fn main_block(program: &Block) -> &Block {
    program.sub_blocks().next().expect("program has a main block")
}

fn kernels(program: &Block) -> Vec<&Block> {
    main_block(program).sub_blocks().collect()
}

fn idx_list(kernel: &Block) -> Vec<(String, u64)> {
    kernel
        .idxs
        .iter()
        .map(|idx| (idx.name.clone(), idx.range))
        .collect()
}

fn matmul() -> RunInfo {
    let cion = Contraction::new(
        AggregationOp::Sum,
        CombinationOp::Multiply,
        vec![
            spec("C", &["i", "j"]),
            spec("A", &["i", "k"]),
            spec("B", &["k", "j"]),
        ],
    );
    RunInfo::new("matmul")
        .input("A", f32(&[3, 4]))
        .input("B", f32(&[4, 5]))
        .output("C", f32(&[3, 5]))
        .op(Op::contraction(cion))
}

/// O[i] = +(X[i + 1, j]) leaves the last row of O unwritten
fn shifted_row_sum(default: Option<&str>) -> RunInfo {
    let mut cion = Contraction::new(
        AggregationOp::Sum,
        CombinationOp::None,
        vec![spec("O", &["i"]), spec("X", &["i + 1", "j"])],
    );
    if let Some(name) = default {
        cion = cion.with_default(name);
    }
    RunInfo::new("row_sum")
        .input("X", f32(&[4, 6]))
        .input("D", f32(&[4]))
        .output("O", f32(&[4]))
        .op(Op::contraction(cion))
}

fn conv1d() -> RunInfo {
    let cion = Contraction::new(
        AggregationOp::Sum,
        CombinationOp::Multiply,
        vec![
            spec("O", &["x", "co"]),
            spec("I", &["x + k - 1", "ci"]),
            spec("K", &["k", "ci", "co"]),
        ],
    );
    RunInfo::new("conv1d")
        .input("I", f32(&[16, 8]))
        .input("K", f32(&[3, 8, 4]))
        .output("O", f32(&[16, 4]))
        .op(Op::contraction(cion))
}

fn check_access_lengths(block: &Block) {
    for r in &block.refs {
        assert_eq!(r.access.len(), r.shape.rank(), "refinement {} in {}", r.into, block.name);
    }
    for inner in block.sub_blocks() {
        check_access_lengths(inner);
    }
}

#[test]
fn test_input_and_output_declarations() {
    let runinfo = matmul();
    let program = generate(&runinfo).unwrap();
    let main = main_block(&program);

    for (name, shape) in &runinfo.input_shapes {
        let on_main: Vec<_> = main.refs.iter().filter(|r| &r.into == name).collect();
        assert_eq!(on_main.len(), 1);
        assert_eq!(on_main[0].dir, RefDir::In);
        assert_eq!(&on_main[0].shape, shape);
        let on_program: Vec<_> = program.refs.iter().filter(|r| &r.into == name).collect();
        assert_eq!(on_program.len(), 1);
        assert_eq!(on_program[0].dir, RefDir::None);
        assert_eq!(&on_program[0].shape, shape);
    }

    for name in runinfo.output_shapes.keys() {
        let outs: Vec<_> = main.refs.iter().filter(|r| &r.into == name).collect();
        assert_eq!(outs.len(), 1);
        assert_eq!(outs[0].dir, RefDir::Out);
        assert_eq!(outs[0].agg_op.as_deref(), Some("assign"));
        assert!(!outs[0].is_const);
        let on_program = program.refs.iter().filter(|r| &r.into == name).count();
        assert_eq!(on_program, 1);
    }
    let out_count = main.refs.iter().filter(|r| r.dir == RefDir::Out).count();
    assert_eq!(out_count, runinfo.output_shapes.len());
}

#[test]
fn test_matmul_kernel() {
    let program = generate(&matmul()).unwrap();
    let main = main_block(&program);
    // No initialization: each C[i, j] is covered exactly once
    assert_eq!(main.stmts.len(), 1);

    let kernel = kernels(&program)[0];
    assert_eq!(kernel.name, "kernel_0");
    assert_eq!(kernel.comments, "C[i, j] = +(A[i, k] * B[k, j])");
    for tag in ["kernel", "contraction", "agg_op_add", "comb_op_mul"] {
        assert!(kernel.has_tag(tag), "missing tag {}", tag);
    }
    assert_eq!(
        idx_list(kernel),
        vec![("i".to_string(), 3), ("j".to_string(), 5), ("k".to_string(), 4)]
    );
    assert!(kernel.constraints.is_empty());

    let c = &kernel.refs[0];
    assert_eq!(c.dir, RefDir::Out);
    assert_eq!(c.agg_op.as_deref(), Some("add"));
    assert_eq!(c.access, vec![Affine::var("i"), Affine::var("j")]);
    let a = kernel.ref_by_into("A").unwrap();
    assert_eq!(a.dir, RefDir::In);
    assert_eq!(a.access, vec![Affine::var("i"), Affine::var("k")]);
    assert!(a.shape.sizes().iter().all(|&s| s == 1));

    assert_eq!(
        kernel.stmts,
        vec![
            Statement::load("A", "$A"),
            Statement::load("B", "$B"),
            Statement::intrinsic("mul", vec!["$A".to_string(), "$B".to_string()], vec!["$C".to_string()]),
            Statement::store("$C", "C"),
        ]
    );
}

#[test]
fn test_partial_write_gets_zero_fill() {
    let program = generate(&shifted_row_sum(None)).unwrap();
    let main = main_block(&program);
    assert_eq!(main.stmts.len(), 2);
    let init = main.stmts[0].as_special().unwrap();
    assert_eq!(init.name, Special::ZERO);
    assert!(init.inputs.is_empty());
    assert_eq!(init.outputs, vec!["O".to_string()]);
    assert!(main.stmts[1].as_block().is_some());

    let kernel = kernels(&program)[0];
    assert_eq!(idx_list(kernel), vec![("i".to_string(), 3), ("j".to_string(), 6)]);
    let x = kernel.ref_by_into("X").unwrap();
    assert_eq!(x.access, vec![Affine::var("i") + Affine::from(1), Affine::var("j")]);
    // A single input is assigned, not combined
    assert!(kernel
        .stmts
        .iter()
        .any(|s| *s == Statement::intrinsic("assign", vec!["$X".to_string()], vec!["$O".to_string()])));
}

#[test]
fn test_partial_write_with_default_gets_copy() {
    let program = generate(&shifted_row_sum(Some("D"))).unwrap();
    let main = main_block(&program);
    let specials: Vec<_> = main.stmts.iter().filter_map(Statement::as_special).collect();
    assert_eq!(specials.len(), 1);
    assert_eq!(specials[0].name, Special::COPY);
    assert_eq!(specials[0].inputs, vec!["D".to_string()]);
    assert_eq!(specials[0].outputs, vec!["O".to_string()]);
    assert!(main.stmts[1].as_block().is_some());
}

#[test]
fn test_output_only_constraint_flips_initialization() {
    let base = || {
        Contraction::new(
            AggregationOp::Sum,
            CombinationOp::None,
            vec![spec("C", &["i", "j"]), spec("A", &["i", "j"])],
        )
    };
    let runinfo = |cion: Contraction| {
        RunInfo::new("triangle")
            .input("A", f32(&[3, 3]))
            .output("C", f32(&[3, 3]))
            .op(Op::contraction(cion))
    };

    let program = generate(&runinfo(base())).unwrap();
    assert_eq!(main_block(&program).stmts.len(), 1);

    let constrained = base().with_constraint("i + j".parse().unwrap(), 4);
    let program = generate(&runinfo(constrained)).unwrap();
    let main = main_block(&program);
    assert_eq!(main.stmts.len(), 2);
    assert_eq!(main.stmts[0].as_special().unwrap().name, Special::ZERO);
    let kernel = kernels(&program)[0];
    assert_eq!(
        kernel.constraints,
        vec![Affine::from(3) - Affine::var("i") - Affine::var("j")]
    );
}

#[test]
fn test_conv_residual_constraints() {
    let program = generate(&conv1d()).unwrap();
    let main = main_block(&program);
    // Constraints mix output and reduction indexes, so no fill
    assert_eq!(main.stmts.len(), 1);

    let kernel = kernels(&program)[0];
    assert_eq!(
        idx_list(kernel),
        vec![
            ("ci".to_string(), 8),
            ("co".to_string(), 4),
            ("k".to_string(), 3),
            ("x".to_string(), 16),
        ]
    );
    let one = || Affine::from(1);
    let x_plus_k = || Affine::var("x") + Affine::var("k");
    assert_eq!(
        kernel.constraints,
        vec![x_plus_k() - one(), Affine::from(16) - x_plus_k()]
    );
    let input = kernel.ref_by_into("I").unwrap();
    assert_eq!(input.access[0], x_plus_k() - one());
}

#[test]
fn test_contraction_constant_folding() {
    let cion = Contraction::new(
        AggregationOp::Sum,
        CombinationOp::Multiply,
        vec![spec("C", &["i"]), spec("A", &["i"]), spec("s", &[])],
    );
    let runinfo = RunInfo::new("scale")
        .input("A", f32(&[8]))
        .output("C", f32(&[8]))
        .bind("s", Binding::FloatConst(2.0))
        .op(Op::constant("s"))
        .op(Op::contraction(cion));
    let program = generate(&runinfo).unwrap();
    let kernel = kernels(&program)[0];

    assert_eq!(kernel.refs.len(), 2);
    assert!(kernel.ref_by_into("s").is_none());
    assert!(!kernel.stmts.contains(&Statement::load("s", "$s")));
    assert!(kernel.stmts.contains(&Statement::constant("$s", ConstValue::Float(2.0))));
    assert!(kernel.stmts.contains(&Statement::intrinsic(
        "mul",
        vec!["$A".to_string(), "$s".to_string()],
        vec!["$C".to_string()],
    )));
}

#[test]
fn test_elementwise_equal_shapes() {
    let runinfo = RunInfo::new("add")
        .input("A", f32(&[2, 3]))
        .input("B", f32(&[2, 3]))
        .output("C", f32(&[2, 3]))
        .op(Op::elementwise("C", "add", &["A", "B"]));
    let program = generate(&runinfo).unwrap();
    let kernel = kernels(&program)[0];

    assert!(kernel.has_tag("eltwise"));
    assert!(kernel.has_tag("eltwise_add"));
    assert_eq!(idx_list(kernel), vec![("i1".to_string(), 2), ("i2".to_string(), 3)]);
    let ins: Vec<_> = kernel.refs.iter().filter(|r| r.dir == RefDir::In).collect();
    assert_eq!(ins.len(), 2);
    assert_eq!(ins[0].access, ins[1].access);
    assert_eq!(ins[0].access, vec![Affine::var("i1"), Affine::var("i2")]);
    let outs: Vec<_> = kernel.refs.iter().filter(|r| r.dir == RefDir::Out).collect();
    assert_eq!(outs.len(), 1);
    assert_eq!(outs[0].access, vec![Affine::var("i1"), Affine::var("i2")]);
}

#[test]
fn test_elementwise_unit_output_dimension() {
    let runinfo = RunInfo::new("neg")
        .input("A", f32(&[1, 4]))
        .output("C", f32(&[1, 4]))
        .op(Op::elementwise("C", "neg", &["A"]));
    let program = generate(&runinfo).unwrap();
    let kernel = kernels(&program)[0];
    assert_eq!(idx_list(kernel), vec![("i2".to_string(), 4)]);
    let out = kernel.ref_by_into("C").unwrap();
    assert_eq!(out.access, vec![Affine::new(), Affine::var("i2")]);
}

#[test]
fn test_elementwise_broadcast() {
    let with_bias = |bias: TensorShape| {
        RunInfo::new("bias")
            .input("A", f32(&[3, 4]))
            .input("B", bias)
            .output("C", f32(&[3, 4]))
            .op(Op::elementwise("C", "add", &["A", "B"]))
    };

    let program = generate(&with_bias(f32(&[4]))).unwrap();
    let b = kernels(&program)[0].ref_by_into("B").unwrap().clone();
    assert_eq!(b.access, vec![Affine::var("i2")]);

    let program = generate(&with_bias(f32(&[1, 4]))).unwrap();
    let b = kernels(&program)[0].ref_by_into("B").unwrap().clone();
    assert_eq!(b.access, vec![Affine::new(), Affine::var("i2")]);
}

#[test]
fn test_elementwise_scalar_constant() {
    let runinfo = RunInfo::new("offset")
        .input("A", f32(&[5]))
        .output("C", f32(&[5]))
        .bind("one", Binding::IntConst(1))
        .op(Op::elementwise("C", "add", &["A", "one"]));
    let program = generate(&runinfo).unwrap();
    let kernel = kernels(&program)[0];
    assert!(kernel.ref_by_into("one").is_none());
    assert!(kernel.stmts.contains(&Statement::constant("$one", ConstValue::Int(1))));
    assert!(kernel.stmts.contains(&Statement::intrinsic(
        "add",
        vec!["$A".to_string(), "$one".to_string()],
        vec!["$C".to_string()],
    )));
}

#[test]
fn test_access_lengths_match_shapes() {
    let reshape = Function::new("reshape");
    let runinfo = conv1d()
        .bind("R", Binding::Tensor(f32(&[64])))
        .bind("E", Binding::Tensor(f32(&[16, 4])))
        .bind("half", Binding::FloatConst(0.5))
        .op(Op::elementwise("E", "mul", &["O", "half"]))
        .op(Op::function("R", reshape, &["E", "shape"]));
    let program = generate(&runinfo).unwrap();
    check_access_lengths(&program);

    let temps: Vec<&str> = program
        .refs
        .iter()
        .filter(|r| r.from.is_empty() && !runinfo.input_shapes.contains_key(&r.into))
        .filter(|r| !runinfo.output_shapes.contains_key(&r.into))
        .map(|r| r.into.as_str())
        .collect();
    assert_eq!(temps, vec!["E", "R"]);
}

#[test]
fn test_zero_size_output_is_skipped() {
    let cion = Contraction::new(
        AggregationOp::Sum,
        CombinationOp::None,
        vec![spec("O", &["i", "j"]), spec("X", &["i", "j"])],
    );
    let runinfo = RunInfo::new("empty")
        .input("X", f32(&[0, 4]))
        .output("O", f32(&[0, 4]))
        .op(Op::contraction(cion));
    let obs = RecordingObserver::new();
    let program = generate_with(&runinfo, &DefaultSolver, &obs).unwrap();
    assert!(main_block(&program).stmts.is_empty());
    assert!(obs
        .at(Level::Debug)
        .iter()
        .any(|m| m.contains("size==0; skipping")));
}

#[test]
fn test_unknown_shape() {
    let runinfo = RunInfo::new("missing")
        .input("A", f32(&[4]))
        .output("C", f32(&[4]))
        .op(Op::elementwise("C", "add", &["A", "Q"]));
    assert_eq!(
        generate(&runinfo).unwrap_err(),
        CompileError::UnknownShape { name: "Q".to_string() }
    );
}

#[test]
fn test_unsupported_arity() {
    let cion = Contraction::new(AggregationOp::Sum, CombinationOp::None, vec![spec("C", &["i"])]);
    let runinfo = RunInfo::new("lonely")
        .output("C", f32(&[4]))
        .op(Op::contraction(cion));
    assert_eq!(
        generate(&runinfo).unwrap_err(),
        CompileError::UnsupportedArity { count: 1 }
    );

    let specs = ["C", "A", "A", "A", "A"].iter().map(|id| spec(id, &["i"])).collect();
    let runinfo = RunInfo::new("crowded")
        .input("A", f32(&[4]))
        .output("C", f32(&[4]))
        .op(Op::contraction(Contraction::new(
            AggregationOp::Sum,
            CombinationOp::Multiply,
            specs,
        )));
    assert_eq!(
        generate(&runinfo).unwrap_err(),
        CompileError::UnsupportedArity { count: 5 }
    );
}

#[test]
fn test_tuple_binding_is_unimplemented() {
    let runinfo = RunInfo::new("tuple")
        .input("A", f32(&[4]))
        .output("C", f32(&[4]))
        .bind("T", Binding::Tuple)
        .op(Op::elementwise("C", "add", &["A", "T"]));
    assert!(matches!(
        generate(&runinfo),
        Err(CompileError::Unimplemented { .. })
    ));
}

#[test]
fn test_unsolvable_bounds_are_logged() {
    let cion = Contraction::new(
        AggregationOp::Sum,
        CombinationOp::None,
        vec![spec("C", &["i"]), spec("A", &["j - k"])],
    );
    let runinfo = RunInfo::new("unbounded")
        .input("A", f32(&[4]))
        .output("C", f32(&[4]))
        .op(Op::contraction(cion));
    let obs = RecordingObserver::new();
    let err = generate_with(&runinfo, &DefaultSolver, &obs).unwrap_err();
    assert!(matches!(err, CompileError::BoundsUnsolvable { .. }));
    let warnings = obs.at(Level::Warn);
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].starts_with("Unable to compute bounds for contraction: C[i] = +(A["));
}

#[test]
fn test_fractional_offset_is_rejected() {
    let cion = Contraction::new(
        AggregationOp::Sum,
        CombinationOp::None,
        vec![spec("C", &["i"]), spec("A", &["i + 1/2"])],
    );
    let runinfo = RunInfo::new("fraction")
        .input("A", f32(&[4]))
        .output("C", f32(&[4]))
        .op(Op::contraction(cion));
    assert!(matches!(
        generate(&runinfo),
        Err(CompileError::NonIntegerPolynomial { .. })
    ));
}

#[test]
fn test_generate_from_json() {
    let json = r#"{
        "program_name": "json_matmul",
        "program": {
            "ops": [
                {
                    "output": "C",
                    "inputs": ["A", "B"],
                    "tag": "contraction",
                    "agg_op": "sum",
                    "comb_op": "multiply",
                    "specs": [
                        {"id": "C", "spec": ["i", "j"]},
                        {"id": "A", "spec": ["i", "k"]},
                        {"id": "B", "spec": ["k", "j"]}
                    ]
                },
                {
                    "output": "D",
                    "inputs": ["C"],
                    "tag": "function",
                    "fn": "relu",
                    "attributes": [{"name": "pid", "params": ["activation"]}]
                }
            ]
        },
        "bindings": {
            "A": {"kind": "tensor", "value": {"type": "float32", "dims": [{"stride": 4, "size": 2}, {"stride": 1, "size": 4}]}},
            "B": {"kind": "tensor", "value": {"type": "float32", "dims": [{"stride": 3, "size": 4}, {"stride": 1, "size": 3}]}},
            "C": {"kind": "tensor", "value": {"type": "float32", "dims": [{"stride": 3, "size": 2}, {"stride": 1, "size": 3}]}},
            "D": {"kind": "tensor", "value": {"type": "float32", "dims": [{"stride": 3, "size": 2}, {"stride": 1, "size": 3}]}}
        },
        "input_shapes": {
            "A": {"type": "float32", "dims": [{"stride": 4, "size": 2}, {"stride": 1, "size": 4}]},
            "B": {"type": "float32", "dims": [{"stride": 3, "size": 4}, {"stride": 1, "size": 3}]}
        },
        "output_shapes": {
            "D": {"type": "float32", "dims": [{"stride": 3, "size": 2}, {"stride": 1, "size": 3}]}
        },
        "const_inputs": ["B"]
    }"#;
    let program = generate_from_json(json).unwrap();
    assert_eq!(program.name, "json_matmul");
    let names: Vec<&str> = kernels(&program).iter().map(|k| k.name.as_str()).collect();
    assert_eq!(names, vec!["kernel_0", "activation"]);
    let b = kernels(&program)[0].ref_by_into("B").unwrap().clone();
    assert!(b.is_const);
    // C flows between the kernels, so it is declared as a temporary
    let c = program.ref_by_into("C").unwrap();
    assert_eq!(c.dir, RefDir::None);
}

/// O[i + j] = >(A[i] + B[j]): every (i, j) pair lands on some output element
fn diagonal_max(no_defract: bool) -> RunInfo {
    let mut cion = Contraction::new(
        AggregationOp::Max,
        CombinationOp::Plus,
        vec![spec("O", &["i + j"]), spec("A", &["i"]), spec("B", &["j"])],
    );
    cion.no_defract = no_defract;
    RunInfo::new("diagonal_max")
        .input("A", f32(&[3]))
        .input("B", f32(&[4]))
        .output("O", f32(&[6]))
        .op(Op::contraction(cion))
}

#[test]
fn test_multi_index_output_is_reduced() {
    let program = generate(&diagonal_max(false)).unwrap();
    let main = main_block(&program);
    // The fresh output index covers O exactly, so a max is not clobbered by a zero fill
    assert_eq!(main.stmts.len(), 1);

    let kernel = kernels(&program)[0];
    assert_eq!(idx_list(kernel), vec![("j".to_string(), 4), ("v0".to_string(), 6)]);
    let out = &kernel.refs[0];
    assert_eq!(out.access, vec![Affine::var("v0")]);
    assert_eq!(out.agg_op.as_deref(), Some("max"));
    let a = kernel.ref_by_into("A").unwrap();
    assert_eq!(a.access, vec![Affine::var("v0") - Affine::var("j")]);
    assert_eq!(
        kernel.constraints,
        vec![
            Affine::var("v0") - Affine::var("j"),
            Affine::var("j") - Affine::var("v0") + Affine::from(2),
        ]
    );
}

#[test]
fn test_no_defract_keeps_multi_index_output() {
    let program = generate(&diagonal_max(true)).unwrap();
    let main = main_block(&program);
    assert_eq!(main.stmts.len(), 2);
    assert_eq!(main.stmts[0].as_special().unwrap().name, Special::ZERO);

    let kernel = kernels(&program)[0];
    assert_eq!(idx_list(kernel), vec![("i".to_string(), 3), ("j".to_string(), 4)]);
    assert_eq!(kernel.refs[0].access, vec![Affine::var("i") + Affine::var("j")]);
    assert!(kernel.constraints.is_empty());

    let reduced = generate(&diagonal_max(false)).unwrap();
    assert_ne!(kernels(&reduced)[0].refs[0].access, kernel.refs[0].access);
}

#[test]
fn test_select_contraction_with_three_inputs() {
    let cion = Contraction::new(
        AggregationOp::Assign,
        CombinationOp::Cond,
        vec![spec("O", &["i"]), spec("A", &["i"]), spec("B", &["i"]), spec("C", &["i"])],
    );
    let runinfo = RunInfo::new("select")
        .input("A", f32(&[4]))
        .input("B", f32(&[4]))
        .input("C", f32(&[4]))
        .output("O", f32(&[4]))
        .op(Op::contraction(cion));
    let program = generate(&runinfo).unwrap();
    assert_eq!(main_block(&program).stmts.len(), 1);

    let kernel = kernels(&program)[0];
    assert!(kernel.has_tag("comb_op_cond"));
    assert!(kernel.has_tag("agg_op_assign"));
    assert_eq!(kernel.refs.len(), 4);
    assert_eq!(kernel.refs[0].agg_op.as_deref(), Some("assign"));
    assert!(kernel.stmts.contains(&Statement::intrinsic(
        "cond",
        vec!["$A".to_string(), "$B".to_string(), "$C".to_string()],
        vec!["$O".to_string()],
    )));
}

#[test]
fn test_equality_contraction() {
    let cion = Contraction::new(
        AggregationOp::Max,
        CombinationOp::Eq,
        vec![spec("O", &["i"]), spec("A", &["i", "j"]), spec("B", &["i", "j"])],
    );
    let runinfo = RunInfo::new("any_equal")
        .input("A", f32(&[3, 5]))
        .input("B", f32(&[3, 5]))
        .output("O", f32(&[3]))
        .op(Op::contraction(cion));
    let program = generate(&runinfo).unwrap();
    let kernel = kernels(&program)[0];
    assert!(kernel.has_tag("comb_op_eq"));
    assert!(kernel.has_tag("agg_op_max"));
    assert_eq!(kernel.refs[0].agg_op.as_deref(), Some("max"));
    assert!(kernel.stmts.contains(&Statement::intrinsic(
        "eq",
        vec!["$A".to_string(), "$B".to_string()],
        vec!["$O".to_string()],
    )));
}

#[test]
fn test_aggregation_tags() {
    let cases = [
        (AggregationOp::Max, "max"),
        (AggregationOp::Min, "min"),
        (AggregationOp::Prod, "mul"),
        (AggregationOp::Sum, "add"),
    ];
    for (agg_op, name) in cases {
        let cion = Contraction::new(agg_op, CombinationOp::None, vec![spec("O", &["i"]), spec("X", &["i", "j"])]);
        let runinfo = RunInfo::new("reduce")
            .input("X", f32(&[2, 7]))
            .output("O", f32(&[2]))
            .op(Op::contraction(cion));
        let program = generate(&runinfo).unwrap();
        let kernel = kernels(&program)[0];
        assert!(kernel.has_tag(&format!("agg_op_{}", name)), "{:?}", kernel.tags);
        assert_eq!(kernel.refs[0].agg_op.as_deref(), Some(name));
        // A single input never gets a combination tag
        assert!(!kernel.tags.iter().any(|t| t.starts_with("comb_op_")));
    }
}

#[test]
fn test_contraction_integer_constant_folding() {
    let cion = Contraction::new(
        AggregationOp::Sum,
        CombinationOp::Plus,
        vec![spec("C", &["i"]), spec("A", &["i"]), spec("n", &[])],
    );
    let runinfo = RunInfo::new("offset")
        .input("A", f32(&[6]))
        .output("C", f32(&[6]))
        .bind("n", Binding::IntConst(3))
        .op(Op::contraction(cion));
    let program = generate(&runinfo).unwrap();
    let kernel = kernels(&program)[0];

    assert!(kernel.ref_by_into("n").is_none());
    assert!(!kernel.stmts.contains(&Statement::load("n", "$n")));
    assert!(kernel.stmts.contains(&Statement::constant("$n", ConstValue::Int(3))));
    assert!(kernel.has_tag("comb_op_add"));
    assert!(kernel.stmts.contains(&Statement::intrinsic(
        "add",
        vec!["$A".to_string(), "$n".to_string()],
        vec!["$C".to_string()],
    )));
}
