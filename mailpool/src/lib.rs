pub mod controller;

pub use controller::{Mailpool, SHUTDOWN_BROADCAST};
