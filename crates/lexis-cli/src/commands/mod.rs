// crates/lexis-cli/src/commands/mod.rs
//
// Command module declarations for the lexis CLI.

pub mod plan;
pub mod prune;
pub mod query;
pub mod run;
pub mod trace;
