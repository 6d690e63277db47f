//! Debug diagnostics channel.
//!
//! With the `debug-diagnostics` feature every failure path reports through
//! `tracing::debug!` under the `vailed` target. Without it `diag!` expands
//! to nothing and its arguments are never evaluated.

macro_rules! diag {
    ($($arg:tt)*) => {{
        #[cfg(feature = "debug-diagnostics")]
        tracing::debug!(target: "vailed", $($arg)*);
    }};
}

#[cfg(all(test, feature = "debug-diagnostics"))]
mod tests {
    use std::fmt::{self, Write as _};
    use std::sync::{Arc, Mutex};

    use tracing::field::{Field, Visit};
    use tracing::{Event, Subscriber};
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
    use vailed_test_utils::{FailingAllocator, TrackingAllocator};

    use crate::{VailedVec, VecError};

    /// Records `(target, message)` for every event it sees.
    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<(String, String)>>>);

    struct Message<'m>(&'m mut String);

    impl Visit for Message<'_> {
        fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
            if field.name() == "message" {
                let _ = write!(self.0, "{value:?}");
            }
        }
    }

    impl<S: Subscriber> Layer<S> for Captured {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            let mut message = String::new();
            event.record(&mut Message(&mut message));
            let target = event.metadata().target().to_owned();
            self.0.lock().unwrap().push((target, message));
        }
    }

    impl Captured {
        fn during(&self, f: impl FnOnce()) -> Vec<(String, String)> {
            let subscriber = tracing_subscriber::registry().with(self.clone());
            tracing::subscriber::with_default(subscriber, f);
            self.0.lock().unwrap().clone()
        }
    }

    #[test]
    fn failures_are_reported_under_the_vailed_target() {
        let alloc = FailingAllocator::after(1);
        let events = Captured::default().during(|| {
            let mut v: VailedVec<'_, u32, _> = VailedVec::with_capacity_in(1, &alloc).unwrap();
            assert_eq!(v.pop_back(), Err(VecError::Empty));
            let v = v.push_back(1).unwrap();
            let (v, _) = v.push_back(2).unwrap_err().into_parts();
            assert_eq!(&v[..], &[1]);
        });
        assert!(events.iter().all(|(target, _)| target == "vailed"));
        assert!(events.iter().any(|(_, m)| m == "pop_back: empty vector"));
        assert!(events.iter().any(|(_, m)| m.contains("bytes failed")));
        alloc.tracker().assert_no_leaks();
    }

    #[test]
    fn successful_operations_stay_quiet() {
        let alloc = TrackingAllocator::new();
        let events = Captured::default().during(|| {
            let v: VailedVec<'_, u8, _> = VailedVec::with_capacity_in(1, &alloc).unwrap();
            let mut v = v.push_many(&[1, 2, 3]).unwrap();
            assert_eq!(v.pop_back(), Ok(3));
            v.free().unwrap();
        });
        assert!(events.is_empty(), "unexpected events: {events:?}");
        alloc.assert_no_leaks();
    }
}
