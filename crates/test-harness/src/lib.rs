//! Test harness for the windowing backend
//!
//! Drives the window system without a compositor: every collaborator is a
//! mock recording into a shared call log.
//!
//! # Modules
//!
//! - `mocks`: Test doubles for shell, render, surfaces, settings and input
//! - `headless`: Window system wired to the mocks
//! - `assertions`: Common test assertions
//! - `fixtures`: Output descriptions and ready-made window systems

pub mod assertions;
pub mod fixtures;
pub mod headless;
pub mod mocks;

pub use headless::{HarnessOptions, ShellFlavor, TestWinSystem, WinSystemSnapshot};
pub use mocks::{Call, CallLog};
