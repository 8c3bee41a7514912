pub mod app;
pub mod backend;
pub mod config;
pub mod doclinks;
pub mod router;
pub mod runtime;
pub mod shared;
