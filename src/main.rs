// Purpose: Provide default binary entry for transpile-cache CLI execution.
// Inputs/Outputs: Reads process args and returns process exit code from CLI dispatcher.
// Invariants: Main must not bypass centralized CLI argument/diagnostic handling.
// Gotchas: Keep behavior aligned with run_cli so embedding callers see identical semantics.

fn main() {
    let code = jolt::cli::run_cli(std::env::args().skip(1));
    std::process::exit(code);
}
