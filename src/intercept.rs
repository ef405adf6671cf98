//! Reversible overrides of host entry points.
//!
//! The host routes each replaceable entry point through a [`Hook`]. An
//! [`OverrideRegistry`] installs wrappers that may call through to the previous
//! implementation and remembers what it replaced, so [`OverrideRegistry::unwrap_all`]
//! puts every hook back exactly as it found it.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use log::trace;

pub type HookFn<A, R> = Rc<dyn Fn(A) -> R>;

pub struct Hook<A, R = ()> {
    current: RefCell<HookFn<A, R>>,
}

impl<A, R> Hook<A, R> {
    pub fn new(f: impl Fn(A) -> R + 'static) -> Self {
        Self {
            current: RefCell::new(Rc::new(f)),
        }
    }

    /// Invokes the current implementation.
    ///
    /// The implementation is cloned out first, so it may replace the hook or
    /// call it again.
    pub fn call(&self, args: A) -> R {
        let f = self.current();
        f(args)
    }

    pub fn current(&self) -> HookFn<A, R> {
        self.current.borrow().clone()
    }

    /// Installs `f` and returns the implementation it replaced.
    pub fn replace(&self, f: HookFn<A, R>) -> HookFn<A, R> {
        self.current.replace(f)
    }
}

impl<A, R> fmt::Debug for Hook<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hook").finish_non_exhaustive()
    }
}

trait Restore {
    fn name(&self) -> &str;
    fn restore(&self);
}

struct Record<A, R> {
    name: String,
    hook: Rc<Hook<A, R>>,
    original: HookFn<A, R>,
}

impl<A, R> Restore for Record<A, R> {
    fn name(&self) -> &str {
        &self.name
    }

    fn restore(&self) {
        self.hook.replace(self.original.clone());
    }
}

#[derive(Default)]
pub struct OverrideRegistry {
    records: Vec<Box<dyn Restore>>,
}

impl OverrideRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the hook's implementation with `wrapper`, which receives the
    /// previous implementation as its first argument.
    pub fn wrap<A, R>(
        &mut self,
        name: &str,
        hook: &Rc<Hook<A, R>>,
        wrapper: impl Fn(&dyn Fn(A) -> R, A) -> R + 'static,
    ) where
        A: 'static,
        R: 'static,
    {
        let original = hook.current();
        let inner = original.clone();
        hook.replace(Rc::new(move |args| wrapper(&*inner, args)));

        trace!("wrapped {name}");
        self.records.push(Box::new(Record {
            name: name.to_string(),
            hook: hook.clone(),
            original,
        }));
    }

    /// Restores every wrapped hook, most recent first.
    pub fn unwrap_all(&mut self) {
        while let Some(record) = self.records.pop() {
            record.restore();
            trace!("unwrapped {}", record.name());
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Drop for OverrideRegistry {
    fn drop(&mut self) {
        self.unwrap_all();
    }
}
