use bevy::prelude::*;

// ---------------------------------------------------------------------------
// EditorCommand trait
// ---------------------------------------------------------------------------

/// A reversible edit over the world.
///
/// Commands hold the deltas they apply, so `execute` followed by `unexecute`
/// must leave the world exactly as it was, any number of times.
pub trait EditorCommand: Send + Sync + 'static {
    /// Applies the edit and returns the entity it actually affected. This may
    /// differ from the entity the command was built for when the edit has to
    /// re-create a helper entity.
    fn execute(&mut self, world: &mut World) -> Entity;
    fn unexecute(&mut self, world: &mut World);
    fn description(&self) -> &str;
}

// ---------------------------------------------------------------------------
// CommandHistory resource
// ---------------------------------------------------------------------------

/// Undo/redo ledger.
///
/// Undo and redo requests are only counted when they arrive
/// (`levels_to_undo` / `levels_to_redo`); the commands are replayed later by
/// [`CommandHistory::flush`], once per frame.
#[derive(Resource)]
pub struct CommandHistory<C: EditorCommand> {
    undo_stack: Vec<C>,
    redo_stack: Vec<C>,
    /// Redo entries dropped by a new edit, kept until the owner has cleaned
    /// up after them.
    discarded: Vec<C>,
    levels_to_undo: usize,
    levels_to_redo: usize,
}

impl<C: EditorCommand> Default for CommandHistory<C> {
    fn default() -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            discarded: Vec::new(),
            levels_to_undo: 0,
            levels_to_redo: 0,
        }
    }
}

impl<C: EditorCommand> CommandHistory<C> {
    /// Records a command that has already been executed. Any redo history is
    /// moved to the discarded list, see [`CommandHistory::take_discarded`].
    pub fn add_executed_command(&mut self, command: C) {
        self.undo_stack.push(command);
        self.discarded.append(&mut self.redo_stack);
        self.levels_to_redo = 0;
    }

    pub fn execute(&mut self, mut command: C, world: &mut World) -> Entity {
        let affected = command.execute(world);
        self.add_executed_command(command);
        affected
    }

    pub fn can_undo(&self) -> bool {
        self.undo_stack.len() > self.levels_to_undo
    }

    pub fn request_undo(&mut self) {
        if self.can_undo() {
            self.levels_to_undo += 1;
        }
    }

    pub fn can_redo(&self) -> bool {
        self.redo_stack.len() > self.levels_to_redo
    }

    pub fn request_redo(&mut self) {
        if self.can_redo() {
            self.levels_to_redo += 1;
        }
    }

    /// Replays every queued undo, then every queued redo.
    pub fn flush(&mut self, world: &mut World) {
        for _ in 0..std::mem::take(&mut self.levels_to_undo) {
            let Some(mut command) = self.undo_stack.pop() else {
                break;
            };
            debug!("Undo: {}", command.description());
            command.unexecute(world);
            self.redo_stack.push(command);
        }

        for _ in 0..std::mem::take(&mut self.levels_to_redo) {
            let Some(mut command) = self.redo_stack.pop() else {
                break;
            };
            debug!("Redo: {}", command.description());
            command.execute(world);
            self.undo_stack.push(command);
        }
    }

    pub fn reset(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.discarded.clear();
        self.levels_to_undo = 0;
        self.levels_to_redo = 0;
    }

    pub fn levels_to_undo(&self) -> usize {
        self.levels_to_undo
    }

    pub fn levels_to_redo(&self) -> usize {
        self.levels_to_redo
    }

    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo_stack.len()
    }

    /// Commands that can still be undone, oldest first.
    pub fn undo_commands(&self) -> impl Iterator<Item = &C> {
        self.undo_stack.iter()
    }

    /// Redo entries invalidated by new edits since the last call. They can
    /// never run again.
    pub fn take_discarded(&mut self) -> Vec<C> {
        std::mem::take(&mut self.discarded)
    }

    /// The most recently executed command, if any.
    pub fn last_executed(&self) -> Option<&C> {
        self.undo_stack.last()
    }
}

/// Exclusive system that flushes the queued undo/redo requests.
pub fn flush_command_history<C: EditorCommand>(world: &mut World) {
    if !world.contains_resource::<CommandHistory<C>>() {
        return;
    }
    world.resource_scope(|world, mut history: Mut<CommandHistory<C>>| {
        history.flush(world);
    });
}
