pub mod clinics;
pub mod health;
pub mod metrics;
pub mod product_forms;
pub mod structures;
pub mod templates;
