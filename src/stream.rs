//! Push-based observable cells.
//!
//! A [`Stream`] holds an optional current value and a list of observers.
//! `set` stores the value and calls every observer synchronously, in
//! subscription order, before returning. Derived streams created with
//! [`map`](Stream::map), [`filter`](Stream::filter), [`merge`](Stream::merge)
//! and [`combine`](Stream::combine) are ordinary observers of their sources,
//! so propagation is depth-first in definition order.
//!
//! Streams are single-threaded (`Rc`/`RefCell`). Cloning a `Stream` clones
//! the handle, not the cell.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};

struct Observer<T> {
    id: u64,
    active: Cell<bool>,
    callback: Box<dyn Fn(&T)>,
}

impl<T> Observer<T> {
    /// Run the callback, containing any panic so later observers still run.
    fn notify(&self, value: &T) {
        if !self.active.get() {
            return;
        }
        if panic::catch_unwind(AssertUnwindSafe(|| (self.callback)(value))).is_err() {
            log::error!(
                "stream observer {} panicked; remaining observers still notified",
                self.id
            );
        }
    }
}

struct Inner<T> {
    value: RefCell<Option<T>>,
    observers: RefCell<Vec<Rc<Observer<T>>>>,
    next_id: Cell<u64>,
}

/// A mutable observable cell.
///
/// A stream starts either empty or with an initial value. An empty stream
/// does not call new subscribers until the first [`set`](Stream::set).
///
/// # Examples
///
/// ```
/// use contactfold::Stream;
/// use std::cell::RefCell;
/// use std::rc::Rc;
///
/// let count = Stream::with_value(1);
/// let doubled = count.map(|n| n * 2);
///
/// let seen = Rc::new(RefCell::new(Vec::new()));
/// let sink = Rc::clone(&seen);
/// let sub = doubled.subscribe(move |n| sink.borrow_mut().push(*n));
///
/// count.set(5).set(7);
/// sub.unsubscribe();
/// count.set(9);
///
/// assert_eq!(*seen.borrow(), vec![2, 10, 14]);
/// assert_eq!(doubled.get(), Some(18));
/// ```
pub struct Stream<T> {
    inner: Rc<Inner<T>>,
}

impl<T> Clone for Stream<T> {
    fn clone(&self) -> Self {
        Stream {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Stream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream")
            .field("value", &self.inner.value.borrow())
            .field("observers", &self.inner.observers.borrow().len())
            .finish()
    }
}

impl<T: Clone + 'static> Default for Stream<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + 'static> Stream<T> {
    /// Create a stream with no value.
    pub fn new() -> Self {
        Self::from_option(None)
    }

    /// Create a stream holding `value`.
    pub fn with_value(value: T) -> Self {
        Self::from_option(Some(value))
    }

    fn from_option(value: Option<T>) -> Self {
        Stream {
            inner: Rc::new(Inner {
                value: RefCell::new(value),
                observers: RefCell::new(Vec::new()),
                next_id: Cell::new(0),
            }),
        }
    }

    /// The current value, if one has been set.
    pub fn get(&self) -> Option<T> {
        self.inner.value.borrow().clone()
    }

    /// Whether a value has been set.
    pub fn has_value(&self) -> bool {
        self.inner.value.borrow().is_some()
    }

    /// Replace the value and notify every current observer in subscription
    /// order. Returns `self` so calls can be chained.
    ///
    /// An observer that panics is logged and skipped; the others still run.
    /// Observers may call back into this stream.
    pub fn set(&self, value: T) -> &Self {
        *self.inner.value.borrow_mut() = Some(value.clone());
        let observers = self.inner.observers.borrow().clone();
        for observer in &observers {
            observer.notify(&value);
        }
        self
    }

    /// Register an observer.
    ///
    /// If the stream already holds a value, `observer` is called with it
    /// before `subscribe` returns. The returned [`Subscription`] removes
    /// exactly this observer.
    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&T) + 'static,
    {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);

        let observer = Rc::new(Observer {
            id,
            active: Cell::new(true),
            callback: Box::new(observer),
        });
        self.inner.observers.borrow_mut().push(Rc::clone(&observer));

        if let Some(current) = self.get() {
            observer.notify(&current);
        }

        let weak: Weak<Inner<T>> = Rc::downgrade(&self.inner);
        Subscription::new(move || {
            observer.active.set(false);
            if let Some(inner) = weak.upgrade() {
                inner.observers.borrow_mut().retain(|o| o.id != id);
            }
        })
    }

    /// Number of registered observers, derived streams included.
    pub fn observer_count(&self) -> usize {
        self.inner.observers.borrow().len()
    }

    /// Derive a stream holding `transform` of every value this stream takes.
    pub fn map<U, F>(&self, transform: F) -> Stream<U>
    where
        U: Clone + 'static,
        F: Fn(&T) -> U + 'static,
    {
        let mapped = Stream::new();
        let target = mapped.clone();
        self.subscribe(move |value| {
            target.set(transform(value));
        });
        mapped
    }

    /// Derive a stream that only takes values passing `predicate`.
    ///
    /// Rejected values leave the derived stream's value as it was and do not
    /// notify its observers.
    pub fn filter<P>(&self, predicate: P) -> Stream<T>
    where
        P: Fn(&T) -> bool + 'static,
    {
        let filtered = Stream::new();
        let target = filtered.clone();
        self.subscribe(move |value| {
            if predicate(value) {
                target.set(value.clone());
            }
        });
        filtered
    }

    /// Derive a stream that takes whichever of `self` and `other` was set last.
    pub fn merge(&self, other: &Stream<T>) -> Stream<T> {
        let merged = Stream::new();
        for source in [self, other] {
            let target = merged.clone();
            source.subscribe(move |value: &T| {
                target.set(value.clone());
            });
        }
        merged
    }

    /// Derive a stream recomputed from the latest values of `self` and
    /// `other` whenever either changes, once both have a value.
    pub fn combine<U, V, F>(&self, other: &Stream<U>, combiner: F) -> Stream<V>
    where
        U: Clone + 'static,
        V: Clone + 'static,
        F: Fn(&T, &U) -> V + 'static,
    {
        let combined = Stream::new();
        let combiner = Rc::new(combiner);

        // Sources reference each other weakly.
        let target = combined.clone();
        let right = Rc::downgrade(&other.inner);
        let f = Rc::clone(&combiner);
        self.subscribe(move |left_value| {
            let right_value = right.upgrade().and_then(|inner| Stream { inner }.get());
            if let Some(right_value) = right_value {
                target.set(f(left_value, &right_value));
            }
        });

        let target = combined.clone();
        let left = Rc::downgrade(&self.inner);
        other.subscribe(move |right_value| {
            let left_value = left.upgrade().and_then(|inner| Stream { inner }.get());
            if let Some(left_value) = left_value {
                target.set(combiner(&left_value, right_value));
            }
        });

        combined
    }
}

/// Handle returned by [`Stream::subscribe`].
///
/// Dropping it does not unsubscribe; call [`unsubscribe`](Self::unsubscribe)
/// on teardown to release the observer.
pub struct Subscription {
    cancel: Cell<Option<Box<dyn FnOnce()>>>,
}

impl Subscription {
    fn new(cancel: impl FnOnce() + 'static) -> Self {
        Subscription {
            cancel: Cell::new(Some(Box::new(cancel))),
        }
    }

    /// Remove the observer. Calling this more than once is a no-op.
    pub fn unsubscribe(&self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }

    /// Whether [`unsubscribe`](Self::unsubscribe) has been called.
    pub fn is_closed(&self) -> bool {
        let cancel = self.cancel.take();
        let closed = cancel.is_none();
        self.cancel.set(cancel);
        closed
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("closed", &self.is_closed())
            .finish()
    }
}
