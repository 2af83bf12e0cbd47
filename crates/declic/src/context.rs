use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Execution context threaded through bodies, validation and completion.
///
/// Clones share the same cancellation flag.
#[derive(Clone, Default)]
pub struct Context {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
    values: Vec<Arc<dyn Any + Send + Sync>>,
}

/// Cancels every [`Context`] cloned from the one it was taken from.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Attach a typed value. A later value of the same type shadows earlier ones.
    pub fn with_value<T: Any + Send + Sync>(mut self, value: T) -> Self {
        self.values.push(Arc::new(value));
        self
    }

    pub fn value<T: Any>(&self) -> Option<&T> {
        self.values
            .iter()
            .rev()
            .find_map(|v| (**v).downcast_ref::<T>())
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            cancelled: Arc::clone(&self.cancelled),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
            || self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("cancelled", &self.is_cancelled())
            .field("deadline", &self.deadline)
            .field("values", &self.values.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_is_shared_between_clones() {
        let ctx = Context::new();
        let child = ctx.clone().with_value(7u32);
        assert!(!child.is_cancelled());
        ctx.cancel_handle().cancel();
        assert!(child.is_cancelled());
    }

    #[test]
    fn expired_deadline_counts_as_cancelled() {
        let ctx = Context::new().with_deadline(Instant::now());
        assert!(ctx.is_cancelled());
        assert!(!Context::new().with_timeout(Duration::from_secs(3_600)).is_cancelled());
    }

    #[test]
    fn latest_value_of_a_type_wins() {
        let ctx = Context::new()
            .with_value("first".to_string())
            .with_value(1u8)
            .with_value("second".to_string());
        assert_eq!(ctx.value::<String>().map(String::as_str), Some("second"));
        assert_eq!(ctx.value::<u8>(), Some(&1));
        assert_eq!(ctx.value::<i64>(), None);
    }
}
