//! Results that may or may not need awaiting
//!
//! Resolution completes synchronously whenever every involved pointer is
//! already resident, and only falls back to a future when the runtime has to
//! fetch something. [`MaybeAsync`] carries either outcome so callers on the
//! synchronous path never pay for a future.

use std::fmt;

use futures_util::future::{self, FutureExt, LocalBoxFuture};

use crate::error::{DifError, Result};

/// A value that is either ready now or will be produced by a future.
pub enum MaybeAsync<T> {
    /// Available immediately
    Ready(T),
    /// Must be awaited
    Pending(LocalBoxFuture<'static, Result<T>>),
}

impl<T: 'static> MaybeAsync<T> {
    /// Wrap a future
    pub fn pending(fut: impl std::future::Future<Output = Result<T>> + 'static) -> Self {
        MaybeAsync::Pending(fut.boxed_local())
    }

    /// Whether the value is available without awaiting
    pub fn is_ready(&self) -> bool {
        matches!(self, MaybeAsync::Ready(_))
    }

    /// Transform the eventual value
    pub fn map<U: 'static>(self, f: impl FnOnce(T) -> Result<U> + 'static) -> Result<MaybeAsync<U>> {
        Ok(match self {
            MaybeAsync::Ready(value) => MaybeAsync::Ready(f(value)?),
            MaybeAsync::Pending(fut) => MaybeAsync::pending(async move { f(fut.await?) }),
        })
    }

    /// Chain a step that may itself need awaiting
    pub fn and_then<U: 'static>(
        self,
        f: impl FnOnce(T) -> Result<MaybeAsync<U>> + 'static,
    ) -> Result<MaybeAsync<U>> {
        match self {
            MaybeAsync::Ready(value) => f(value),
            MaybeAsync::Pending(fut) => Ok(MaybeAsync::pending(async move {
                f(fut.await?)?.into_future().await
            })),
        }
    }

    /// Combine many values, staying synchronous if all of them are ready
    pub fn all(items: Vec<MaybeAsync<T>>) -> MaybeAsync<Vec<T>> {
        if items.iter().all(MaybeAsync::is_ready) {
            let values = items
                .into_iter()
                .filter_map(|item| match item {
                    MaybeAsync::Ready(value) => Some(value),
                    MaybeAsync::Pending(_) => None,
                })
                .collect();
            return MaybeAsync::Ready(values);
        }
        let futures = items.into_iter().map(MaybeAsync::into_future);
        MaybeAsync::pending(future::try_join_all(futures))
    }

    /// The value, or [`DifError::RequiresAsync`] naming `operation`
    pub fn into_ready(self, operation: &str) -> Result<T> {
        match self {
            MaybeAsync::Ready(value) => Ok(value),
            MaybeAsync::Pending(_) => Err(DifError::requires_async(operation)),
        }
    }

    /// A future producing the value either way
    pub fn into_future(self) -> LocalBoxFuture<'static, Result<T>> {
        match self {
            MaybeAsync::Ready(value) => future::ready(Ok(value)).boxed_local(),
            MaybeAsync::Pending(fut) => fut,
        }
    }

    /// Await the value
    pub async fn resolve(self) -> Result<T> {
        self.into_future().await
    }
}

impl<T> From<T> for MaybeAsync<T> {
    fn from(value: T) -> Self {
        MaybeAsync::Ready(value)
    }
}

impl<T: fmt::Debug> fmt::Debug for MaybeAsync<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaybeAsync::Ready(value) => f.debug_tuple("Ready").field(value).finish(),
            MaybeAsync::Pending(_) => write!(f, "Pending(..)"),
        }
    }
}
