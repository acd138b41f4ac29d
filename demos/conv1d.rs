//! Example: One-Dimensional Convolution
//!
//! Lowers O[x, co] = +(I[x + k - 1, ci] * K[k, ci, co]) with "same" padding.
//! The input access can run off either end, which shows up as residual
//! constraints on the kernel.
//!
//! Run with: cargo run --example conv1d

use tensor_to_block::{
    generate_with, AggregationOp, CombinationOp, Contraction, DataType, DefaultSolver, Op,
    RecordingObserver, RunInfo, TensorShape, TensorSpec,
};

fn main() {
    println!("=== 1D Convolution Example ===\n");

    let f32 = |sizes: &[u64]| TensorShape::from_sizes(DataType::Float32, sizes);
    let cion = Contraction::new(
        AggregationOp::Sum,
        CombinationOp::Multiply,
        vec![
            TensorSpec::parse("O", &["x", "co"]).unwrap(),
            TensorSpec::parse("I", &["x + k - 1", "ci"]).unwrap(),
            TensorSpec::parse("K", &["k", "ci", "co"]).unwrap(),
        ],
    );
    println!("Contraction: {}\n", cion);

    let runinfo = RunInfo::new("conv1d")
        .input("I", f32(&[16, 8]))
        .input("K", f32(&[3, 8, 4]))
        .output("O", f32(&[16, 4]))
        .const_input("K")
        .op(Op::contraction(cion));

    let observer = RecordingObserver::new();
    let program = generate_with(&runinfo, &DefaultSolver, &observer).unwrap();
    println!("{}", program);

    let kernel = program
        .sub_blocks()
        .next()
        .and_then(|main| main.sub_blocks().next())
        .unwrap();
    println!("Residual constraints (each must be >= 0):");
    for con in &kernel.constraints {
        println!("  {}", con);
    }
    println!();
    println!("Compiler log:");
    for (level, message) in observer.records() {
        println!("  [{}] {}", level, message);
    }
}
