use std::collections::VecDeque;

use crate::engine::Command;

/// The entry of output from Engine to the runtime.
#[derive(Debug, Default)]
pub(crate) struct EngineOutput {
    /// Command queue that need to be executed by the runtime.
    pub(crate) commands: VecDeque<Command>,
}

impl EngineOutput {
    /// Push a command to the queue.
    pub(crate) fn push_command(&mut self, cmd: Command) {
        tracing::debug!("push command: {}", cmd);
        self.commands.push_back(cmd)
    }

    /// Pop the first command to run from the queue.
    pub(crate) fn pop_command(&mut self) -> Option<Command> {
        self.commands.pop_front()
    }

    /// Take all queued commands and clear the queue.
    #[cfg(test)]
    pub(crate) fn take_commands(&mut self) -> Vec<Command> {
        self.commands.drain(..).collect()
    }

    /// Clear all queued commands.
    #[cfg(test)]
    pub(crate) fn clear_commands(&mut self) {
        self.commands.clear()
    }
}
