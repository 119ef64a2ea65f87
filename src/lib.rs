pub mod clock;
pub mod console;
pub mod control;
pub mod diff;
pub mod engine;
pub mod error;
pub mod events;
pub mod inject;
pub mod keyboard;
pub mod model;
pub mod session;
pub mod sim;
pub mod timing;
pub mod typo;
