//! End-to-end scenarios through the `meld` facade
//!
//! Each module walks one caller-visible story: singleton handoff,
//! teardown under load, and error surfacing.

#[path = "../common/mod.rs"]
mod common;

mod errors;
mod singleton;
mod teardown;
