pub mod file;
pub mod network;
