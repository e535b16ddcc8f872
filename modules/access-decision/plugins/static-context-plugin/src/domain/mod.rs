pub mod client;
pub mod credential;
pub mod network;
pub mod service;
