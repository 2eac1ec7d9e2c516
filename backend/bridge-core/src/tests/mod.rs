mod config;
mod pending;
mod protocol;
