#![no_std]

// Shared logic for the volume dial.
//
// Everything here is portable across the MCU firmware and host tooling: the
// wire codec, the mirrored mixer state, liveness tracking, optimistic command
// reconciliation, power policy and the UI state machine.

pub mod codec;
pub mod commands;
pub mod dispatch;
pub mod link;
pub mod pending;
pub mod power;
pub mod settings;
pub mod state;
pub mod time;
pub mod ui;
