pub mod assignment;
pub mod auth;
pub mod clinic;
pub mod product;
pub mod structure;
pub mod template;
