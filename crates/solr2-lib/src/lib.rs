//! solr2: TCP-controlled LED server for the SOL-R2 left/right boards.

pub mod address_map;
pub mod client;
pub mod color;
pub mod command;
pub mod config;
pub mod device;
pub mod effect;
pub mod engine;
pub mod error;
pub mod packet;
pub mod protocol;
pub mod server;
pub mod session;
pub mod state;
pub mod stream;

pub use error::Solr2Error;
