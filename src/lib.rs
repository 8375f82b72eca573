pub mod config;
pub mod env_utils;
pub mod ingress;
pub mod logging;
pub mod monitor;
pub mod notify;
pub mod replay;
pub mod runtime;
pub mod sensor;
