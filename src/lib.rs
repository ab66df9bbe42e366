//! Terminal client for four-paddle Pong played against a shared room server.
//!
//! The frame loop in [`game_modes`] drives a [`game::SimulationClock`]: each tick
//! drains messages from the [`network`] thread into the [`sync`] store, moves the
//! local paddle, then merges prediction and authority into the state [`ui`] draws.

pub mod ai;
pub mod config;
pub mod debug;
pub mod game;
pub mod game_modes;
pub mod network;
pub mod sync;
pub mod ui;
