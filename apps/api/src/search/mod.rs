pub mod handlers;
pub mod progressive;
