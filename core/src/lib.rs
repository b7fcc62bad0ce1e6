pub mod checker;
pub mod network;
pub mod scanner;
pub mod system;
