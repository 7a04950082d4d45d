pub mod config;
pub mod error;
pub mod input;
pub mod link;
pub mod messages;
pub mod motor;
pub mod registry;
pub mod robot;
pub mod runtime;
pub mod teleop;
