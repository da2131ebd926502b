pub mod binding;
pub mod dialogue;
pub mod ids;
