pub mod position;
pub mod user;

pub use position::{
    NewPosition, Position, PositionKind, PositionPatch, PositionRow, PositionWithChildren,
    PublicPositionView, TreeNode,
};
pub use user::User;
