#![allow(clippy::needless_range_loop, clippy::too_many_arguments, clippy::manual_range_contains)]

pub mod q_shared;
pub mod qfiles;
pub mod cmd;
pub mod cvar;
pub mod common;
pub mod files;
