use std::path::{Path, PathBuf};
use strsim::jaro_winkler;

use crate::config::{self, CONFIG_FILE};
use crate::transpiler::Transpiler;
use crate::watch;

const COMMANDS: &[&str] = &["build", "watch", "clean", "status"];

pub fn run_cli<I>(args: I) -> i32
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    let command = match args.next() {
        Some(arg) => arg,
        None => {
            print_usage();
            return 1;
        }
    };
    // Reject a bad command before requiring a project root, so typos get the
    // suggestion even outside any project.
    if !COMMANDS.contains(&command.as_str()) {
        eprintln!("unknown command: {}", command);
        if let Some(best) = best_command_match(&command) {
            eprintln!("did you mean `{}`?", best);
        }
        print_usage();
        return 1;
    }
    let mut project = None;
    let mut clean_first = false;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--project" => match args.next() {
                Some(dir) => project = Some(PathBuf::from(dir)),
                None => {
                    eprintln!("expected directory after --project");
                    return 1;
                }
            },
            "--clean" if command == "build" => clean_first = true,
            _ => {
                eprintln!("unknown argument: {}", arg);
                return 1;
            }
        }
    }
    let start = project.unwrap_or_else(|| PathBuf::from("."));
    let root = match config::find_project_root(&start) {
        Some(root) => root,
        None => {
            eprintln!(
                "{} not found in {} or any parent directory",
                CONFIG_FILE,
                start.display()
            );
            return 1;
        }
    };
    match command.as_str() {
        "build" => run_build(&root, clean_first),
        "watch" => run_watch(&root),
        "clean" => run_clean(&root),
        "status" => run_status(&root),
        _ => {
            print_usage();
            1
        }
    }
}

fn run_build(root: &Path, clean_first: bool) -> i32 {
    let mut transpiler = match Transpiler::open(root) {
        Ok(t) => t,
        Err(err) => {
            eprintln!("jolt: {:#}", err);
            return 1;
        }
    };
    if clean_first {
        if let Err(err) = transpiler.clean() {
            eprintln!("jolt: {:#}", err);
            return 1;
        }
    }
    match transpiler.pass() {
        Ok(summary) => {
            println!(
                "compiled {} pruned {} fresh {} failed {}",
                summary.compiled, summary.pruned, summary.fresh, summary.failed
            );
            if summary.failed > 0 { 1 } else { 0 }
        }
        Err(err) => {
            eprintln!("jolt: {:#}", err);
            1
        }
    }
}

fn run_watch(root: &Path) -> i32 {
    let mut transpiler = match Transpiler::open(root) {
        Ok(t) => t,
        Err(err) => {
            eprintln!("jolt: {:#}", err);
            return 1;
        }
    };
    watch::run(&mut transpiler)
}

fn run_clean(root: &Path) -> i32 {
    let mut transpiler = match Transpiler::open(root) {
        Ok(t) => t,
        Err(err) => {
            eprintln!("jolt: {:#}", err);
            return 1;
        }
    };
    match transpiler.clean() {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("jolt: {:#}", err);
            1
        }
    }
}

fn run_status(root: &Path) -> i32 {
    let transpiler = match Transpiler::open(root) {
        Ok(t) => t,
        Err(err) => {
            eprintln!("jolt: {:#}", err);
            return 1;
        }
    };
    match transpiler.report() {
        Ok(report) => {
            println!(
                "tracked {} fresh {} stale {}",
                report.tracked, report.fresh, report.stale
            );
            if let Some(ms) = transpiler.cache_layer().last_changed() {
                println!("last changed {} ms", ms);
            }
            0
        }
        Err(err) => {
            eprintln!("jolt: {:#}", err);
            1
        }
    }
}

fn print_usage() {
    eprintln!("usage: jolt build [--project DIR] [--clean]");
    eprintln!("   or: jolt watch [--project DIR]");
    eprintln!("   or: jolt clean [--project DIR]");
    eprintln!("   or: jolt status [--project DIR]");
}

fn best_command_match(needle: &str) -> Option<&'static str> {
    let mut best: Option<(&str, f64)> = None;
    for c in COMMANDS {
        let score = jaro_winkler(needle, c);
        if best.map(|(_, s)| score > s).unwrap_or(true) {
            best = Some((c, score));
        }
    }
    match best {
        Some((name, score)) if score >= 0.84 => Some(name),
        _ => None,
    }
}
