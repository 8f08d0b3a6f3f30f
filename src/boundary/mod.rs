pub mod boundary_model;
pub mod resolver;
pub mod watcher;
