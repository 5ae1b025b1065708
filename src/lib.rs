pub mod config;
pub mod errors;
pub mod gateway;
pub mod media_server;
pub mod models;
pub mod playback;
pub mod proxy;
pub mod redirect;
pub mod routing;
pub mod services;
pub mod storage;
pub mod streaming;
pub mod subtitle;
pub mod utils;
pub mod web;
