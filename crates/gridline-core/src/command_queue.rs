//! Command queue for mutations submitted from outside the simulation tick.
//!
//! Console commands, scripts and network handlers may run on other threads.
//! They never touch simulation state directly: they submit commands through a
//! cloneable [`CommandSender`], and the tick thread drains the queue at the
//! next tick boundary, applying commands in submission order.

use crossbeam_channel::{Receiver, Sender, TrySendError};

use crate::fixed::Ticks;

// ---------------------------------------------------------------------------
// Sender
// ---------------------------------------------------------------------------

/// Cloneable, `Send` handle for submitting commands from any thread.
#[derive(Debug)]
pub struct CommandSender<C> {
    sender: Sender<C>,
}

impl<C> Clone for CommandSender<C> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<C> CommandSender<C> {
    /// Submit a command. Returns `false` if the owning queue no longer exists.
    pub fn submit(&self, command: C) -> bool {
        match self.sender.try_send(command) {
            Ok(()) => true,
            Err(TrySendError::Disconnected(_)) | Err(TrySendError::Full(_)) => false,
        }
    }
}

// ---------------------------------------------------------------------------
// CommandQueue
// ---------------------------------------------------------------------------

/// A queue of commands waiting to be executed at the next tick boundary.
///
/// Supports optional history tracking for replay and debugging.
#[derive(Debug)]
pub struct CommandQueue<C> {
    sender: Sender<C>,
    receiver: Receiver<C>,
    /// History of executed commands: (tick, command).
    history: Vec<(Ticks, C)>,
    /// Maximum history entries to retain. 0 = no history.
    max_history: usize,
}

impl<C: Clone> Default for CommandQueue<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clone> CommandQueue<C> {
    /// Create a new empty command queue with no history tracking.
    pub fn new() -> Self {
        Self::with_max_history(0)
    }

    /// Create a new command queue that retains up to `max_history` entries.
    pub fn with_max_history(max_history: usize) -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        Self {
            sender,
            receiver,
            history: Vec::new(),
            max_history,
        }
    }

    /// A handle other threads can use to submit commands.
    pub fn sender(&self) -> CommandSender<C> {
        CommandSender {
            sender: self.sender.clone(),
        }
    }

    /// Push a single command from the tick thread.
    pub fn push(&mut self, command: C) {
        // The queue owns a receiver, so the channel cannot be disconnected here.
        let _ = self.sender.send(command);
    }

    /// Push multiple commands onto the queue at once.
    pub fn push_batch(&mut self, commands: impl IntoIterator<Item = C>) {
        for command in commands {
            self.push(command);
        }
    }

    /// Drain all pending commands, recording them in history under `tick`.
    /// Returns the drained commands in submission order.
    pub fn drain(&mut self, tick: Ticks) -> Vec<C> {
        let commands: Vec<C> = self.receiver.try_iter().collect();

        if self.max_history > 0 {
            for cmd in &commands {
                self.history.push((tick, cmd.clone()));
            }
            let excess = self.history.len().saturating_sub(self.max_history);
            if excess > 0 {
                self.history.drain(..excess);
            }
        }

        commands
    }

    /// Number of commands waiting to be executed.
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    /// The command history as (tick, command) pairs.
    pub fn history(&self) -> &[(Ticks, C)] {
        &self.history
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }
}

// ===========================================================================
// Tests
// ===========================================================================
