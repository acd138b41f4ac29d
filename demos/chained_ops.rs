//! Example: Chained Operations
//!
//! Demonstrates a small program mixing a reduction, a broadcast
//! elementwise op, a folded scalar constant and a reshape:
//!
//!   S[i]    = +(X[i, j])          row sums
//!   Y       = sub(X, S2)          S2 is S viewed as (4, 1), broadcast
//!   Z       = mul(Y, scale)       scale is a compile-time constant
//!   O       = reshape(Z)
//!
//! Run with: cargo run --example chained_ops

use tensor_to_block::{
    generate, AggregationOp, Binding, CombinationOp, Contraction, DataType, Function, Op,
    RunInfo, Statement, TensorShape, TensorSpec,
};

fn main() {
    println!("=== Chained Operations Example ===\n");

    let f32 = |sizes: &[u64]| TensorShape::from_sizes(DataType::Float32, sizes);
    let row_sum = Contraction::new(
        AggregationOp::Sum,
        CombinationOp::None,
        vec![
            TensorSpec::parse("S", &["i"]).unwrap(),
            TensorSpec::parse("X", &["i", "j"]).unwrap(),
        ],
    );

    let runinfo = RunInfo::new("chained")
        .input("X", f32(&[4, 6]))
        .output("O", f32(&[24]))
        .bind("S", Binding::Tensor(f32(&[4])))
        .bind("S2", Binding::Tensor(f32(&[4, 1])))
        .bind("Y", Binding::Tensor(f32(&[4, 6])))
        .bind("Z", Binding::Tensor(f32(&[4, 6])))
        .bind("scale", Binding::FloatConst(0.5))
        .op(Op::constant("scale"))
        .op(Op::contraction(row_sum))
        .op(Op::function("S2", Function::new("reshape"), &["S", "shape"]))
        .op(Op::elementwise("Y", "sub", &["X", "S2"]))
        .op(Op::elementwise("Z", "mul", &["Y", "scale"]))
        .op(Op::function("O", Function::new("reshape"), &["Z", "shape"]));

    let program = generate(&runinfo).unwrap();
    println!("{}", program);

    let main = program.sub_blocks().next().unwrap();
    println!("Main body:");
    for stmt in &main.stmts {
        match stmt {
            Statement::Block(kernel) => println!("  kernel {} // {}", kernel.name, kernel.comments),
            Statement::Special(sp) => println!("  special {} -> {}", sp.name, sp.outputs.join(", ")),
            other => println!("  {:?}", other),
        }
    }
    println!();
    println!("Temporaries declared on the program block:");
    for r in program.refs.iter().filter(|r| r.from.is_empty()) {
        println!("  {}", r);
    }
}
