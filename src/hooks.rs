//! extension points invoked around storage operations. a hook receives the
//! arguments of the operation as json and may write a result back.

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use strum::AsRefStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr)]
pub enum Event {
    GetFile,
    CreateFile,
    CreateFolder,
    Rename,
    Move,
    Copy,
    Delete,
    /// asked for a link name when creating a link to an external url
    CheckUrl,
    CreatePublicLink,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr)]
pub enum Stage {
    Before,
    After,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// let the remaining hooks and the operation run
    Pass,
    /// stop here. `true` reports the operation as done without applying it,
    /// `false` vetoes it.
    Handled(bool),
}

pub type HookFn = Arc<dyn Fn(&Value, &mut Value) -> Outcome + Send + Sync>;

#[derive(Default)]
pub struct Hooks {
    registered: DashMap<(Event, Stage), Vec<HookFn>>,
}

impl std::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hooks")
            .field("registered", &self.registered.len())
            .finish()
    }
}

impl Hooks {
    pub fn new() -> Self {
        Default::default()
    }

    /// hooks run in registration order
    pub fn register<F>(&self, event: Event, stage: Stage, hook: F)
    where
        F: Fn(&Value, &mut Value) -> Outcome + Send + Sync + 'static
    {
        self.registered.entry((event, stage))
            .or_default()
            .push(Arc::new(hook));
    }

    fn list(&self, event: Event, stage: Stage) -> Vec<HookFn> {
        self.registered.get(&(event, stage))
            .map(|found| found.value().clone())
            .unwrap_or_default()
    }

    /// runs before hooks until one reports handled. returns the handled
    /// outcome if there was one.
    pub fn before(&self, event: Event, args: &Value, result: &mut Value) -> Outcome {
        for hook in self.list(event, Stage::Before) {
            let outcome = hook(args, result);

            if let Outcome::Handled(done) = outcome {
                tracing::debug!("{}::before handled by hook. result: {done}", event.as_ref());

                return outcome;
            }
        }

        Outcome::Pass
    }

    /// runs every after hook
    pub fn after(&self, event: Event, args: &Value) {
        let mut result = Value::Null;

        for hook in self.list(event, Stage::After) {
            hook(args, &mut result);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn before_short_circuits() {
        let hooks = Hooks::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = calls.clone();
        hooks.register(Event::Rename, Stage::Before, move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Outcome::Pass
        });
        hooks.register(Event::Rename, Stage::Before, |_, result| {
            *result = Value::from("stopped");
            Outcome::Handled(false)
        });
        let counter = calls.clone();
        hooks.register(Event::Rename, Stage::Before, move |_, _| {
            counter.fetch_add(100, Ordering::SeqCst);
            Outcome::Pass
        });

        let mut result = Value::Null;
        let outcome = hooks.before(Event::Rename, &Value::Null, &mut result);

        assert_eq!(outcome, Outcome::Handled(false));
        assert_eq!(result, Value::from("stopped"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(hooks.before(Event::Move, &Value::Null, &mut result), Outcome::Pass);
    }

    #[test]
    fn after_runs_all() {
        let hooks = Hooks::new();
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let counter = calls.clone();
            hooks.register(Event::Delete, Stage::After, move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
                Outcome::Handled(true)
            });
        }

        hooks.after(Event::Delete, &Value::Null);

        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
