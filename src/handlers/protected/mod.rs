// handlers/protected/mod.rs - Protected handlers (JWT authentication required)
//
// Read access to the hierarchy for any authenticated user.
// Middleware: jwt_auth_middleware.

pub mod positions;
