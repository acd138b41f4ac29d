//! Example: Matrix Multiplication
//!
//! Lowers C[i, j] = +(A[i, k] * B[k, j]) for a 3x4 by 4x5 product and
//! prints the resulting kernel.
//!
//! Run with: cargo run --example matmul

use tensor_to_block::{
    generate, AggregationOp, CombinationOp, Contraction, DataType, Op, RunInfo, TensorShape,
    TensorSpec,
};

fn main() {
    println!("=== Matrix Multiplication Example ===\n");

    let f32 = |sizes: &[u64]| TensorShape::from_sizes(DataType::Float32, sizes);
    let cion = Contraction::new(
        AggregationOp::Sum,
        CombinationOp::Multiply,
        vec![
            TensorSpec::parse("C", &["i", "j"]).unwrap(),
            TensorSpec::parse("A", &["i", "k"]).unwrap(),
            TensorSpec::parse("B", &["k", "j"]).unwrap(),
        ],
    );
    let runinfo = RunInfo::new("matmul")
        .input("A", f32(&[3, 4]))
        .input("B", f32(&[4, 5]))
        .output("C", f32(&[3, 5]))
        .op(Op::contraction(cion));

    let program = generate(&runinfo).unwrap();
    println!("{}", program);

    let main = program.sub_blocks().next().unwrap();
    let kernel = main.sub_blocks().next().unwrap();
    println!("Kernel '{}' iterates over:", kernel.name);
    for idx in &kernel.idxs {
        println!("  {} in [0, {})", idx.name, idx.range);
    }
    println!();
    println!("Every output element is written by exactly one (i, j), so no");
    println!("initialization special precedes the kernel: {} statement(s) in main", main.stmts.len());
}
