//! D-Bus publication of networks.
//!
//! Each registered network is exported as a `net.connman.Network` object
//! with a `GetProperties` method and a `PropertyChanged` signal.

mod network;
mod transport;

pub use transport::DbusTransport;
