//! Session Controller. [state::Session] holds the lifecycle rules, [controller::SessionController]
//! drives them from a 1 second timer and a command channel.

pub mod controller;
pub mod schedule;
pub mod shutdown;
pub mod state;
