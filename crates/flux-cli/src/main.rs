// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! `compile-hcl`: parse and compile a patch file, report program shape.
//!
//! # Usage
//! ```text
//! compile-hcl <file> [--json] [--verbose]
//! ```
//!
//! Exits 0 on success, 1 on error. Without `--json` the output is a
//! one-line human summary; with `--json` a stable machine schema.

#![deny(rust_2018_idioms)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro
)]
// The CLI is expected to print to stdout/stderr.
#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::process::ExitCode;

use serde::Serialize;

use flux_core::{compile, register_builtins, BlockRegistry, CompileOptions, Severity};

#[derive(Serialize)]
struct JsonReport {
    file: String,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    blocks: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "scheduleSteps")]
    schedule_steps: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    slots: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "parseErrors")]
    parse_errors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "compileErrors")]
    compile_errors: Option<Vec<String>>,
}

struct Args {
    file: String,
    json: bool,
    verbose: bool,
}

fn parse_args() -> Result<Args, String> {
    let mut file = None;
    let mut json = false;
    let mut verbose = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--json" => json = true,
            "--verbose" => verbose = true,
            flag if flag.starts_with("--") => {
                return Err(format!("unknown flag `{flag}`"));
            }
            path => {
                if file.replace(path.to_owned()).is_some() {
                    return Err("expected exactly one input file".to_owned());
                }
            }
        }
    }
    file.map(|file| Args {
        file,
        json,
        verbose,
    })
    .ok_or_else(|| "usage: compile-hcl <file> [--json] [--verbose]".to_owned())
}

fn emit_json(report: &JsonReport) {
    match serde_json::to_string_pretty(report) {
        Ok(body) => println!("{body}"),
        Err(err) => eprintln!("internal: failed to encode report: {err}"),
    }
}

fn main() -> ExitCode {
    let args = match parse_args() {
        Ok(args) => args,
        Err(message) => {
            eprintln!("{message}");
            return ExitCode::from(1);
        }
    };

    let source = match std::fs::read_to_string(&args.file) {
        Ok(s) => s,
        Err(err) => {
            if args.json {
                emit_json(&JsonReport {
                    file: args.file.clone(),
                    status: "error",
                    blocks: None,
                    schedule_steps: None,
                    slots: None,
                    parse_errors: Some(vec![format!("cannot read file: {err}")]),
                    compile_errors: None,
                });
            } else {
                println!("FAIL {}", args.file);
                println!("  cannot read file: {err}");
            }
            return ExitCode::from(1);
        }
    };

    let (patch, parse_errors) = flux_hcl::load(&source);
    let parse_errors: Vec<String> = parse_errors.iter().map(ToString::to_string).collect();
    let Some(patch) = patch else {
        if args.json {
            emit_json(&JsonReport {
                file: args.file.clone(),
                status: "error",
                blocks: None,
                schedule_steps: None,
                slots: None,
                parse_errors: Some(parse_errors),
                compile_errors: None,
            });
        } else {
            println!("FAIL {}", args.file);
            for err in &parse_errors {
                println!("  {err}");
            }
        }
        return ExitCode::from(1);
    };

    let mut registry = BlockRegistry::new();
    if let Err(err) = register_builtins(&mut registry) {
        eprintln!("internal: builtin registration failed: {err}");
        return ExitCode::from(1);
    }
    let result = compile(&patch, &registry, &CompileOptions::default());

    let compile_errors: Vec<String> = result
        .diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Error)
        .map(|d| format!("{}: {}", d.code, d.message))
        .collect();

    match &result.program {
        Some(program) => {
            if args.json {
                emit_json(&JsonReport {
                    file: args.file.clone(),
                    status: "ok",
                    blocks: Some(program.stats.blocks),
                    schedule_steps: Some(program.stats.steps),
                    slots: Some(program.stats.slots),
                    parse_errors: None,
                    compile_errors: None,
                });
            } else {
                println!(
                    "OK  {} — compiled ({} blocks, {} steps, {} slots)",
                    args.file, program.stats.blocks, program.stats.steps, program.stats.slots
                );
                if args.verbose {
                    for diag in &result.diagnostics {
                        println!("  {}: {}", diag.code, diag.message);
                    }
                }
            }
            ExitCode::SUCCESS
        }
        None => {
            if args.json {
                emit_json(&JsonReport {
                    file: args.file.clone(),
                    status: "error",
                    blocks: None,
                    schedule_steps: None,
                    slots: None,
                    parse_errors: None,
                    compile_errors: Some(compile_errors),
                });
            } else {
                println!("FAIL {}", args.file);
                for err in &compile_errors {
                    println!("  {err}");
                }
            }
            ExitCode::from(1)
        }
    }
}
