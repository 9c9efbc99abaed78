//! LIFO teardown of an engine's owned resources. Each resource registers a
//! closure when it's acquired; disposing runs them in reverse acquisition
//! order, continuing past failures so every resource gets a chance to shut
//! down cleanly, and reports the first error encountered.

use parking_lot::Mutex;

use crate::error::Result;

type Teardown = Box<dyn FnOnce() -> Result<()> + Send>;

pub struct Disposer {
    actions: Mutex<Vec<Teardown>>,
}

impl Disposer {
    pub fn new() -> Self {
        Disposer { actions: Mutex::new(Vec::new()) }
    }

    /// Registers a teardown action. Actions run in the reverse of the
    /// order they were pushed.
    pub fn push(&self, action: impl FnOnce() -> Result<()> + Send + 'static) {
        self.actions.lock().push(Box::new(action));
    }

    /// Runs every registered action, most-recently-pushed first, and
    /// returns the first error encountered (if any), having still run
    /// every remaining action.
    pub fn dispose(&self) -> Result<()> {
        let actions = std::mem::take(&mut *self.actions.lock());
        let mut first_err = None;
        for action in actions.into_iter().rev() {
            if let Err(e) = action() {
                if first_err.is_none() {
                    first_err = Some(e);
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Default for Disposer {
    fn default() -> Self {
        Disposer::new()
    }
}
