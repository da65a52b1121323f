//! CLI entry point for terminal-vn
//!
//! Plays, validates and inspects dialogue scripts.

use std::path::PathBuf;
use std::process;
use terminal_vn::cli::{check, play};

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    let command = &args[1];

    match command.as_str() {
        "play" => {
            let play_args = match play::PlayArgs::parse(&args[2..]) {
                Ok(play_args) => play_args,
                Err(err) => {
                    eprintln!("Error: {}", err);
                    eprintln!();
                    print_usage();
                    process::exit(1);
                }
            };
            run_play(play_args);
        }
        "check" => {
            let path = script_path(&args);
            match check::run_check(&path) {
                Ok((report, parsed)) => {
                    print!("{}", report);
                    if !parsed {
                        process::exit(1);
                    }
                }
                Err(err) => fail(err),
            }
        }
        "nodes" => {
            let path = script_path(&args);
            match check::run_nodes(&path) {
                Ok(listing) => print!("{}", listing),
                Err(err) => fail(err),
            }
        }
        "--help" | "-h" => {
            print_usage();
        }
        _ => {
            eprintln!("Error: Unknown command '{}'", command);
            eprintln!();
            print_usage();
            process::exit(1);
        }
    }
}

fn print_usage() {
    println!("terminal-vn - Terminal dialogue engine");
    println!();
    println!("USAGE:");
    println!("    terminal-vn <command> <script.vn> [options]");
    println!();
    println!("COMMANDS:");
    println!("    play <file>     Play a script interactively");
    println!("    check <file>    Parse a script and report warnings");
    println!("    nodes <file>    List the nodes of a script");
    println!("    --help, -h      Show this help message");
    println!();
    println!("PLAY OPTIONS:");
    println!("    --auto            Advance automatically after each line");
    println!("    --debug           Log engine internals and state snapshots");
    println!("    --speed <ms>      Delay between revealed characters");
    println!("    --save <file>     Keep progress in a JSON save file");
    println!("    --fresh           Forget saved progress before playing");
    println!("    --config <file>   Engine options as JSON");
    println!();
    println!("EXAMPLES:");
    println!("    terminal-vn play demos/vessel.vn");
    println!("    terminal-vn play demos/vessel.vn --save vessel.json --speed 15");
    println!("    terminal-vn check demos/vessel.vn");
}

fn script_path(args: &[String]) -> PathBuf {
    match args.get(2) {
        Some(path) => PathBuf::from(path),
        None => {
            eprintln!("Error: Missing script file path");
            eprintln!();
            print_usage();
            process::exit(1);
        }
    }
}

fn fail(err: anyhow::Error) -> ! {
    eprintln!("Error: {:#}", err);
    process::exit(1);
}

fn run_play(args: play::PlayArgs) {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => fail(err.into()),
    };

    let result = runtime.block_on(play::run_play(&args));
    // A pending stdin read would otherwise keep the process alive
    runtime.shutdown_background();

    match result {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(err) => fail(err),
    }
}
