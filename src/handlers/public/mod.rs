// handlers/public/mod.rs - Public handlers (no authentication required)
//
// Token acquisition, service info and the public position list.
// Middleware: none.

pub mod auth;
pub mod positions;
pub mod system;
