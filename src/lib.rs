// Purpose: Define crate-level module surface for the transpile cache and tooling components.
// Inputs/Outputs: Re-exports internal modules for the binary, tests, and embedding callers.
// Invariants: Public module boundaries should remain stable for internal callers.
// Gotchas: Keep module wiring consistent with the src/main.rs entry path.

pub mod cache;
pub mod cache_layer;
pub mod cli;
pub mod config;
pub mod paths;
pub mod status;
pub mod transpiler;
pub mod watch;
