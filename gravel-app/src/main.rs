//! The `gvs` command-line tool: runs a Gravel script, or starts the interactive
//! shell when invoked with no arguments.

use gravel::Interp;
use std::env;
use std::path::Path;
use std::process::ExitCode;

fn main() -> ExitCode {
    // Diagnostics go to stderr so script output on stdout stays clean.
    // RUST_LOG=gravel=debug traces lexing, parsing, and call dispatch.
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();
    let mut interp = Interp::new();

    match args.get(1).map(String::as_str) {
        None => {
            gravel_shell::repl(&mut interp);
            ExitCode::SUCCESS
        }
        Some("-h") => {
            print_help();
            ExitCode::SUCCESS
        }
        Some("-v") => {
            println!("gvs {}", env!("CARGO_PKG_VERSION"));
            ExitCode::SUCCESS
        }
        Some(flag) if flag.starts_with('-') => {
            eprintln!("could not recognize argument: {}", flag);
            ExitCode::FAILURE
        }
        Some(path) => {
            if args.len() > 2 {
                eprintln!("unexpected arguments after script path");
                return ExitCode::FAILURE;
            }
            // Exits with code 1 itself on any lex/parse/runtime error.
            gravel_shell::script(&mut interp, Path::new(path));
            ExitCode::SUCCESS
        }
    }
}

fn print_help() {
    println!();
    println!("Usage: gvs <PATH> | <ARG>");
    println!();
    println!("Args:");
    println!("\t-h : Shows the list of available arguments.");
    println!("\t-v : Show the version of the program.");
    println!();
}
