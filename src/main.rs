//! Tensor Program to Block IR CLI
//!
//! Usage:
//!   tensor2block program.json
//!   tensor2block --json < program.json
//!   tensor2block program.json --summary -v

use clap::Parser as ClapParser;
use colored::Colorize;
use std::fs;
use std::io::{self, Read};

use tensor_to_block::{generate, Block, RunInfo, Statement};

#[derive(ClapParser, Debug)]
#[command(name = "tensor2block")]
#[command(author = "Tile Team")]
#[command(version = "0.1.0")]
#[command(about = "Lowers a bound tensor program (JSON) into the block IR")]
struct Args {
    /// Run description to read; stdin when omitted
    #[arg(value_name = "FILE")]
    input_file: Option<String>,

    /// Output the block tree as JSON
    #[arg(short = 'j', long = "json")]
    json_output: bool,

    /// Print one line per kernel instead of the full tree
    #[arg(short = 's', long = "summary")]
    summary: bool,

    /// Verbose output (debug logging)
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,
}

fn main() {
    let args = Args::parse();

    let level = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    // Get the run description from a file or stdin
    let source = if let Some(file) = &args.input_file {
        fs::read_to_string(file).unwrap_or_else(|e| {
            eprintln!("{}: Failed to read file '{}': {}", "Error".red(), file, e);
            std::process::exit(1);
        })
    } else {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer).unwrap_or_else(|e| {
            eprintln!("{}: Failed to read stdin: {}", "Error".red(), e);
            std::process::exit(1);
        });
        buffer
    };

    let runinfo: RunInfo = match serde_json::from_str(&source) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("{}: {}", "Parse error".red(), e);
            std::process::exit(1);
        }
    };

    if args.verbose {
        println!("{}", "Tensor Program to Block IR".bold().blue());
        println!("{}", "=".repeat(35));
        println!();
        println!("{}: {}", "Program".green(), runinfo.program_name);
        println!("{}: {}", "Ops".green(), runinfo.program.ops.len());
        for op in &runinfo.program.ops {
            println!("  {}", op);
        }
        println!();
    }

    let program = match generate(&runinfo) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("{}: {}", "Compilation error".red(), e);
            std::process::exit(1);
        }
    };

    if args.json_output {
        match program.to_json() {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("{}: Failed to serialize to JSON: {}", "Error".red(), e);
                std::process::exit(1);
            }
        }
    } else if args.summary {
        print_summary(&program);
    } else {
        println!("{}", program);
    }
}

fn print_summary(program: &Block) {
    println!("{}", "Lowering Results".bold().green());
    println!("{}", "=".repeat(50));
    println!();

    println!("{}: {}", "Program".cyan(), program.name);
    println!("{}: {}", "Declared buffers".cyan(), program.refs.len());
    println!("{}: {}", "Kernels".cyan(), program.block_count().saturating_sub(1));
    println!();

    let Some(main) = program.sub_blocks().next() else {
        return;
    };
    println!("{}", "Main Body".bold().yellow());
    println!("{}", "-".repeat(50));
    for stmt in &main.stmts {
        match stmt {
            Statement::Block(kernel) => {
                let tags: Vec<&str> = kernel.tags.iter().map(|t| t.as_str()).collect();
                let idxs: Vec<String> = kernel
                    .idxs
                    .iter()
                    .map(|idx| format!("{}:{}", idx.name, idx.range))
                    .collect();
                println!(
                    "{} [{}] {}",
                    kernel.name.bold(),
                    tags.join(", "),
                    kernel.comments
                );
                println!("  {}: {}", "Indexes".cyan(), idxs.join(", "));
                if !kernel.constraints.is_empty() {
                    println!("  {}: {}", "Constraints".cyan(), kernel.constraints.len());
                }
            }
            Statement::Special(sp) => {
                println!(
                    "{} {} -> {}",
                    sp.name.magenta(),
                    sp.inputs.join(", "),
                    sp.outputs.join(", ")
                );
            }
            other => println!("{:?}", other),
        }
    }
}
