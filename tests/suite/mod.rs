mod await_bridge;
mod chain;
mod config;
mod interop;
