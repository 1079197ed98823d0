pub mod auth_service;
pub mod position_service;
pub mod tree;

pub use auth_service::{AuthError, AuthService, LoginResponse};
pub use position_service::{HierarchyError, HierarchyResult, PositionService};
