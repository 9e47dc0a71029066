pub mod accounts;
pub mod points_history;
pub mod swap_history;
pub mod tokens;

pub use sea_orm;
