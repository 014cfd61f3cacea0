use std::sync::mpsc::{self, Receiver, Sender};

use crate::math::Vec2;

/// Intents produced by input handling and applied by the frame loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SandboxCommand {
    /// Spawns an energetic shape, at `at` (pixels) when given.
    AddShape { at: Option<Vec2> },
    AddCalmShape { at: Option<Vec2> },
    DeleteOne,
    DeleteAll,
    IncreaseStepRate,
    DecreaseStepRate,
    ToggleDebugLines,
    ToggleInterpolation,
    ToggleBullet,
    /// Adds `dy` units/s^2 to the vertical gravity component.
    AdjustGravity { dy: f32 },
}

/// Cloneable producer half of the command queue.
#[derive(Debug, Clone)]
pub struct CommandSender {
    inner: Sender<SandboxCommand>,
}

impl CommandSender {
    /// Returns false once the receiving loop has gone away.
    pub fn send(&self, command: SandboxCommand) -> bool {
        self.inner.send(command).is_ok()
    }
}

#[derive(Debug)]
pub struct CommandQueue {
    receiver: Receiver<SandboxCommand>,
}

impl CommandQueue {
    /// Everything queued so far, oldest first.
    pub fn drain(&self) -> Vec<SandboxCommand> {
        self.receiver.try_iter().collect()
    }
}

pub fn command_channel() -> (CommandSender, CommandQueue) {
    let (inner, receiver) = mpsc::channel();
    (CommandSender { inner }, CommandQueue { receiver })
}
