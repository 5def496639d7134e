//! Ordered collection of script instances.

use crate::script::instance::ScriptInstance;

/// Scripts in the order the operator requested them. That order is part of
/// the observable contract: hooks run in registry order for every record and
/// every lifecycle phase. The registry owns its instances; dropping it
/// releases every interpreter exactly once, however the run ended.
#[derive(Default)]
pub struct ScriptRegistry {
    scripts: Vec<ScriptInstance>,
}

impl ScriptRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a script; only called during setup, never during dispatch.
    pub fn push(&mut self, script: ScriptInstance) {
        self.scripts.push(script);
    }

    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }

    /// The first-registered script; target of the `sigaction` hook.
    pub fn primary(&self) -> Option<&ScriptInstance> {
        self.scripts.first()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScriptInstance> {
        self.scripts.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ScriptInstance> {
        self.scripts.iter_mut()
    }
}
