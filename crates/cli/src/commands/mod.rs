pub mod config_cmd;
pub mod doctor;
pub mod serve;
pub mod syncs;
