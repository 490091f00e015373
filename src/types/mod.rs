pub mod config;
pub mod ens;
