pub mod audit;
pub mod config;
pub mod decision;
pub mod identity;
pub mod idp;
pub mod logs;
pub mod rebac;
pub mod server;
