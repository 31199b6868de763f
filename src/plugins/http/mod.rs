pub mod cli;
pub mod transfer;
