//! Diagnostic listener registry.
//!
//! Two ordered listener sets (output and error). Registering returns a
//! [`Subscription`] that removes the listener again. Emitting snapshots the set
//! first, so a callback may register or unsubscribe without deadlocking.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

/// Which stream a listener follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    /// Regular output lines.
    Output,
    /// Error lines and abnormal termination.
    Error,
}

/// One event forwarded from the loaded runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    Output(String),
    Error(String),
    /// The runtime terminated abnormally; delivered to error listeners.
    Abort(String),
}

impl Diagnostic {
    pub fn kind(&self) -> DiagnosticKind {
        match self {
            Diagnostic::Output(_) => DiagnosticKind::Output,
            Diagnostic::Error(_) | Diagnostic::Abort(_) => DiagnosticKind::Error,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Diagnostic::Output(m) | Diagnostic::Error(m) | Diagnostic::Abort(m) => m,
        }
    }
}

pub type Listener = Arc<dyn Fn(&Diagnostic) + Send + Sync>;

#[derive(Default)]
struct Sets {
    output: Vec<(u64, Listener)>,
    error: Vec<(u64, Listener)>,
}

impl Sets {
    fn set_mut(&mut self, kind: DiagnosticKind) -> &mut Vec<(u64, Listener)> {
        match kind {
            DiagnosticKind::Output => &mut self.output,
            DiagnosticKind::Error => &mut self.error,
        }
    }
}

#[derive(Default)]
struct Inner {
    next_id: AtomicU64,
    sets: Mutex<Sets>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Sets> {
        // Listener panics never happen while the lock is held, but stay usable if one did.
        self.sets.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Shared handle to the listener sets. Cloning shares the same sets.
#[derive(Clone, Default)]
pub struct Listeners {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Listeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sets = self.inner.lock();
        f.debug_struct("Listeners")
            .field("output", &sets.output.len())
            .field("error", &sets.error.len())
            .finish()
    }
}

impl Listeners {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `callback` to the set for `kind`.
    pub fn subscribe<F>(&self, kind: DiagnosticKind, callback: F) -> Subscription
    where
        F: Fn(&Diagnostic) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.lock().set_mut(kind).push((id, Arc::new(callback)));
        Subscription {
            inner: Arc::downgrade(&self.inner),
            kind,
            id,
        }
    }

    pub fn len(&self, kind: DiagnosticKind) -> usize {
        self.inner.lock().set_mut(kind).len()
    }

    pub fn is_empty(&self) -> bool {
        let sets = self.inner.lock();
        sets.output.is_empty() && sets.error.is_empty()
    }

    /// Invokes every listener of the event's set, in registration order.
    pub fn emit(&self, event: &Diagnostic) {
        let snapshot: Vec<Listener> = self
            .inner
            .lock()
            .set_mut(event.kind())
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in snapshot {
            listener(event);
        }
    }
}

/// Registration token returned by [`Listeners::subscribe`].
///
/// Dropping it keeps the listener registered; call [`Subscription::unsubscribe`]
/// to remove it.
#[derive(Debug)]
pub struct Subscription {
    inner: Weak<Inner>,
    kind: DiagnosticKind,
    id: u64,
}

impl Subscription {
    pub fn kind(&self) -> DiagnosticKind {
        self.kind
    }

    /// Removes the listener. Returns false if it was already gone.
    pub fn unsubscribe(self) -> bool {
        let Some(inner) = self.inner.upgrade() else {
            return false;
        };
        let mut sets = inner.lock();
        let set = sets.set_mut(self.kind);
        let before = set.len();
        set.retain(|(id, _)| *id != self.id);
        set.len() != before
    }
}
