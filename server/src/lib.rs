//! smartctx server — process entry point library half. `main.rs` wires
//! `smartctx-core`'s indexer into the `smartctx-http` and `smartctx-mcp`
//! routers; this crate otherwise only hosts `init`/`doctor`.

pub mod init;
