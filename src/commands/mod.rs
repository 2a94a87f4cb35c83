pub mod bundle;
pub mod config;
pub mod deploy;
pub mod doctor;
pub mod provision;
pub mod status;
