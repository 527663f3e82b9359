// crates/lexis-clients/src/lib.rs
//
// lexis-clients: Tool client implementations for Lexis.
//
// Every client implements the `ToolClient` contract from lexis-core and
// records transport failures as status codes instead of returning errors:
//   - HTTP (reqwest) for scraper and CGI backends;
//   - subprocess (tokio::process) for local dictionary binaries;
//   - file (tokio::fs) for file-backed indices;
//   - fixture, a canned-response double for tests and offline runs.

pub mod file;
pub mod fixture;
pub mod http;
pub mod subprocess;

pub use file::FileToolClient;
pub use fixture::FixtureToolClient;
pub use http::{HttpMethod, HttpToolClient};
pub use subprocess::SubprocessToolClient;
