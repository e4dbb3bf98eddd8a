//! Gridline Core -- shared primitives for the power-distribution subsystem.
//!
//! This crate holds the small, dependency-light building blocks every other
//! Gridline crate uses:
//!
//! - [`id`] -- runtime device handles ([`id::DeviceId`], slotmap keys) and the
//!   stable numeric ids that survive save/load ([`id::GridId`],
//!   [`id::DeviceSerial`], [`id::LocationId`]).
//! - [`fixed`] -- Q32.32 fixed-point [`fixed::Watts`] and [`fixed::Joules`]
//!   so capacity accounting is deterministic.
//! - [`event`] -- a buffered event bus; notifications are queued during a
//!   call and delivered after it returns.
//! - [`command_queue`] -- commands submitted from outside the simulation tick
//!   (console, network) and applied at the next tick boundary.

pub mod command_queue;
pub mod event;
pub mod fixed;
pub mod id;
