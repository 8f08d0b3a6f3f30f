pub mod builder;
pub mod label;
pub mod step_model;
