pub mod config;
pub mod history;
pub mod node;
pub mod ordering;
pub mod panes;
pub mod save;
pub mod tree;
