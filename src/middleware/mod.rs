pub mod auth;
pub mod super_admin;
pub mod tenant;
