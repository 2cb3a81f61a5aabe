pub mod assignments;
pub mod catalog;
pub mod import;
pub mod metrics;
pub mod publish;
pub mod structures;
pub mod templates;
