//! Failure classification predicates.
//!
//! A tracker decides whether an error returned by the wrapped function
//! should count as a failure in the window. Trackers form a small algebra:
//! leaves are [`Tracker::all`], [`Tracker::type_of`], and
//! [`Tracker::custom`], and trees compose with `&`, `|`, and `!` (or the
//! named [`Tracker::and`], [`Tracker::or`], [`Tracker::negate`]).
//!
//! Evaluation is purely functional: the verdict depends only on the error
//! value.

use std::any::type_name;
use std::error::Error as StdError;
use std::fmt;
use std::ops::{BitAnd, BitOr, Not};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use smallvec::SmallVec;
use tracing::warn;

type CustomFn<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

type MatchFn = fn(&(dyn StdError + 'static)) -> bool;

/// Matches one concrete error type by downcast.
#[derive(Clone, Copy)]
pub struct TypeMatcher {
    name: &'static str,
    matches: MatchFn,
}

impl TypeMatcher {
    fn of<T: StdError + 'static>() -> Self {
        TypeMatcher {
            name: type_name::<T>(),
            matches: |err| err.is::<T>(),
        }
    }
}

impl fmt::Debug for TypeMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Predicate deciding whether an error counts as a failure.
pub enum Tracker<E> {
    /// Every error is a failure.
    All,
    /// Failures are errors matching one of the registered concrete types,
    /// either directly or anywhere along the `source()` chain.
    TypeOf(SmallVec<[TypeMatcher; 2]>),
    /// Failures are errors for which the user predicate returns true.
    Custom(CustomFn<E>),
    /// Both operands classify the error as a failure.
    And(Box<Tracker<E>>, Box<Tracker<E>>),
    /// Either operand classifies the error as a failure.
    Or(Box<Tracker<E>>, Box<Tracker<E>>),
    /// Inverts the inner verdict.
    Not(Box<Tracker<E>>),
}

impl<E> Tracker<E> {
    /// Tracker that counts every error as a failure.
    pub fn all() -> Self {
        Tracker::All
    }

    /// Tracker that counts errors of type `T` as failures.
    ///
    /// An error matches when it is a `T` itself or when any error reachable
    /// through its [`StdError::source`] chain is a `T`.
    pub fn type_of<T: StdError + 'static>() -> Self {
        let mut matchers = SmallVec::new();
        matchers.push(TypeMatcher::of::<T>());
        Tracker::TypeOf(matchers)
    }

    /// Adds another matched type to a [`Tracker::type_of`] leaf.
    ///
    /// On any other tree shape this is equivalent to `self | type_of::<T>()`.
    pub fn or_type<T: StdError + 'static>(self) -> Self {
        match self {
            Tracker::TypeOf(mut matchers) => {
                matchers.push(TypeMatcher::of::<T>());
                Tracker::TypeOf(matchers)
            }
            other => other.or(Tracker::type_of::<T>()),
        }
    }

    /// Tracker delegating to a user predicate.
    ///
    /// A panic inside the predicate is caught, logged, and treated as
    /// "not a failure"; it never propagates to the caller.
    pub fn custom<F>(predicate: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        Tracker::Custom(Arc::new(predicate))
    }

    /// Both `self` and `other` must classify the error as a failure.
    pub fn and(self, other: Tracker<E>) -> Self {
        Tracker::And(Box::new(self), Box::new(other))
    }

    /// Either `self` or `other` classifies the error as a failure.
    pub fn or(self, other: Tracker<E>) -> Self {
        Tracker::Or(Box::new(self), Box::new(other))
    }

    /// Inverts this tracker's verdict.
    pub fn negate(self) -> Self {
        Tracker::Not(Box::new(self))
    }
}

impl<E: StdError + 'static> Tracker<E> {
    /// Returns true when `error` should count as a failure.
    pub fn eval(&self, error: &E) -> bool {
        match self {
            Tracker::All => true,
            Tracker::TypeOf(matchers) => {
                let mut current: Option<&(dyn StdError + 'static)> = Some(error);
                while let Some(err) = current {
                    if matchers.iter().any(|m| (m.matches)(err)) {
                        return true;
                    }
                    current = err.source();
                }
                false
            }
            Tracker::Custom(predicate) => {
                match catch_unwind(AssertUnwindSafe(|| predicate(error))) {
                    Ok(verdict) => verdict,
                    Err(_) => {
                        warn!("custom tracker predicate panicked; treating error as success");
                        false
                    }
                }
            }
            Tracker::And(lhs, rhs) => lhs.eval(error) && rhs.eval(error),
            Tracker::Or(lhs, rhs) => lhs.eval(error) || rhs.eval(error),
            Tracker::Not(inner) => !inner.eval(error),
        }
    }
}

impl<E> Clone for Tracker<E> {
    fn clone(&self) -> Self {
        match self {
            Tracker::All => Tracker::All,
            Tracker::TypeOf(matchers) => Tracker::TypeOf(matchers.clone()),
            Tracker::Custom(predicate) => Tracker::Custom(Arc::clone(predicate)),
            Tracker::And(lhs, rhs) => Tracker::And(lhs.clone(), rhs.clone()),
            Tracker::Or(lhs, rhs) => Tracker::Or(lhs.clone(), rhs.clone()),
            Tracker::Not(inner) => Tracker::Not(inner.clone()),
        }
    }
}

impl<E> fmt::Debug for Tracker<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tracker::All => f.write_str("All"),
            Tracker::TypeOf(matchers) => f.debug_tuple("TypeOf").field(matchers).finish(),
            Tracker::Custom(_) => f.write_str("Custom(<predicate>)"),
            Tracker::And(lhs, rhs) => f.debug_tuple("And").field(lhs).field(rhs).finish(),
            Tracker::Or(lhs, rhs) => f.debug_tuple("Or").field(lhs).field(rhs).finish(),
            Tracker::Not(inner) => f.debug_tuple("Not").field(inner).finish(),
        }
    }
}

impl<E> BitAnd for Tracker<E> {
    type Output = Tracker<E>;

    fn bitand(self, rhs: Tracker<E>) -> Tracker<E> {
        self.and(rhs)
    }
}

impl<E> BitOr for Tracker<E> {
    type Output = Tracker<E>;

    fn bitor(self, rhs: Tracker<E>) -> Tracker<E> {
        self.or(rhs)
    }
}

impl<E> Not for Tracker<E> {
    type Output = Tracker<E>;

    fn not(self) -> Tracker<E> {
        self.negate()
    }
}
