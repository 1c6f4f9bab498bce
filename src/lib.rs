pub mod error;
pub mod path;
pub mod config;
pub mod snapshot;
pub mod accounts;
pub mod context;
pub mod resolve;
pub mod links;
pub mod favorites;
pub mod hooks;
pub mod quota;
pub mod item;
pub mod state;
pub mod ops;
pub mod cli;
