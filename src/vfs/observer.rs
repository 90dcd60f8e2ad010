use std::sync::Arc;

use camino::Utf8Path;
use parking_lot::Mutex;
use tracing::{Level, event};

use super::ops::Op;

/// A callback handed every `(path, operation)` pair a backend intercepts.
pub type UsedPathObserver = Box<dyn Fn(&Utf8Path, Op) + Send + Sync>;

/// The observer list owned by each backend.
///
/// Emission is a direct synchronous call to each registered observer, in
/// registration order, exactly once per intercepted operation. The list is
/// snapshotted before calling out, so an observer may subscribe further
/// observers from inside a callback; those see only later notifications.
#[derive(Default)]
pub(super) struct UsedPathObservers {
    observers: Mutex<Vec<Arc<dyn Fn(&Utf8Path, Op) + Send + Sync>>>,
}

impl UsedPathObservers {
    pub(super) fn subscribe(&self, observer: UsedPathObserver) {
        self.observers.lock().push(Arc::from(observer));
    }

    pub(super) fn notify(&self, path: &Utf8Path, op: Op) {
        event!(Level::TRACE, %path, op = op.name(), "used path");

        let snapshot = self.observers.lock().clone();

        for observer in &snapshot {
            observer(path, op);
        }
    }
}
