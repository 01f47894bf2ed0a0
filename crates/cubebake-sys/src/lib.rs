//! The `cubebake` tool: the console command set wired to a BSP-backed host
//! and the ray-traced renderer.

pub mod console;
