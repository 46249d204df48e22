//! Bridges between Harmony values and Rust `async`.
//!
//! - `Future<T>` implements [`IntoFuture`], so it can be `.await`ed.
//! - [`Observable::stream`] yields every emission as a tokio [`Stream`].
//! - [`Future::spawn`] runs a Rust future on a tokio runtime and resolves a
//!   Harmony future with its output.
//!
//! Dropping the awaiting side only drops the receiver; the producer keeps
//! running.

use std::future::{Future as StdFuture, IntoFuture};
use std::pin::Pin;
use std::task::{Context, Poll};

use harmony_core::{HarmonyError, HarmonyResult};
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::Stream;

use crate::{Future, Observable, Subscription};

/// Awaitable view of a [`Future`], returned by `into_future`.
#[derive(Debug)]
pub struct FutureAwait<T> {
    receiver: oneshot::Receiver<HarmonyResult<T>>,
}

impl<T> StdFuture for FutureAwait<T> {
    type Output = HarmonyResult<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver).poll(cx).map(|received| {
            received.unwrap_or_else(|_| {
                Err(HarmonyError::failed(
                    "future was dropped by its producer without being resolved",
                ))
            })
        })
    }
}

impl<T> IntoFuture for Future<T>
where
    T: Clone + Send + 'static,
{
    type Output = HarmonyResult<T>;
    type IntoFuture = FutureAwait<T>;

    fn into_future(self) -> Self::IntoFuture {
        let (sender, receiver) = oneshot::channel();
        self.subscribe(move |result| {
            // The awaiting task may have been cancelled
            let _ = sender.send(result);
        });
        FutureAwait { receiver }
    }
}

impl<T> Future<T>
where
    T: Clone + Send + 'static,
{
    /// Run `task` on `handle` and resolve the returned future with its output.
    pub fn spawn<F>(handle: &tokio::runtime::Handle, task: F) -> Future<T>
    where
        F: StdFuture<Output = HarmonyResult<T>> + Send + 'static,
    {
        let (future, resolver) = Future::pending();
        let _detached = handle.spawn(async move {
            resolver.complete(task.await);
        });
        future
    }
}

/// Stream of every emission of an [`Observable`], from subscription on.
///
/// Dropping the stream unsubscribes it.
#[derive(Debug)]
pub struct ObservableStream<T> {
    inner: UnboundedReceiverStream<HarmonyResult<T>>,
    subscription: Subscription,
}

impl<T> Drop for ObservableStream<T> {
    fn drop(&mut self) {
        self.subscription.cancel_now();
    }
}

impl<T> Stream for ObservableStream<T> {
    type Item = HarmonyResult<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

impl<T> Observable<T>
where
    T: Clone + Send + 'static,
{
    /// Subscribe and receive emissions as a stream.
    ///
    /// The stream never ends on its own.
    pub fn stream(&self) -> ObservableStream<T> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let subscription = self.subscribe(move |result| {
            // Closed once the stream is dropped mid-delivery
            let _ = sender.send(result);
        });
        ObservableStream {
            inner: UnboundedReceiverStream::new(receiver),
            subscription,
        }
    }
}
