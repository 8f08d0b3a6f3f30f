pub mod change_tracker;
pub mod input_types;
