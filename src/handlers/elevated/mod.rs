// handlers/elevated/mod.rs - Elevated handlers (admin role required)
//
// Every mutation of the hierarchy lives here.
// Middleware: jwt_auth_middleware + require_admin_middleware.

pub mod positions;
