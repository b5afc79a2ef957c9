use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;
use parking_lot::Mutex;
use tokio::sync::oneshot;

type ReturnHook = Box<dyn FnOnce() + Send>;

struct State<T> {
    buffer: VecDeque<T>,
    waiters: VecDeque<oneshot::Sender<T>>,
    done: bool,
    on_return: Option<ReturnHook>,
}

/// Pull-based queue bridging a callback-driven subscription to a consumer
/// loop.
///
/// Clones share the same queue, so one clone can be handed to the callback
/// while another is polled. [`end`](Self::end) is the only way to release
/// the subscription; wrap the consumer in [`end_guard`](Self::end_guard) to
/// cover early returns.
pub struct AsyncStream<T> {
    state: Arc<Mutex<State<T>>>,
    pending: Option<oneshot::Receiver<T>>,
}

impl<T: Send + 'static> AsyncStream<T> {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                buffer: VecDeque::new(),
                waiters: VecDeque::new(),
                done: false,
                on_return: None,
            })),
            pending: None,
        }
    }

    /// Stream whose `hook` runs exactly once when the stream ends,
    /// typically to unsubscribe from the source.
    pub fn with_on_return(hook: impl FnOnce() + Send + 'static) -> Self {
        let stream = Self::new();
        stream.state.lock().on_return = Some(Box::new(hook));
        stream
    }

    /// Hand `value` to the oldest waiting consumer, or buffer it.
    /// Ignored once the stream has ended.
    pub fn push(&self, value: T) {
        let mut state = self.state.lock();
        if state.done {
            tracing::trace!("push after end ignored");
            return;
        }
        let mut value = value;
        while let Some(waiter) = state.waiters.pop_front() {
            match waiter.send(value) {
                Ok(()) => return,
                // Consumer went away before the value arrived
                Err(returned) => value = returned,
            }
        }
        state.buffer.push_back(value);
    }

    /// Next value, waiting for a push if none is buffered. `None` once the
    /// stream has ended.
    pub async fn next(&mut self) -> Option<T> {
        futures::future::poll_fn(|cx| Pin::new(&mut *self).poll_next(cx)).await
    }

    /// End the stream: wake every waiter with `None`, drop buffered values,
    /// and run the return hook. Idempotent.
    pub fn end(&self) {
        let (waiters, hook) = {
            let mut state = self.state.lock();
            if state.done {
                return;
            }
            state.done = true;
            state.buffer.clear();
            (std::mem::take(&mut state.waiters), state.on_return.take())
        };
        // Dropping the senders resolves each pending receiver as closed
        drop(waiters);
        if let Some(hook) = hook {
            hook();
        }
        tracing::trace!("async stream ended");
    }

    pub fn is_done(&self) -> bool {
        self.state.lock().done
    }

    /// Number of values pushed but not yet consumed.
    pub fn buffered(&self) -> usize {
        self.state.lock().buffer.len()
    }

    /// Guard that ends the stream when dropped.
    pub fn end_guard(&self) -> EndGuard<T> {
        EndGuard {
            stream: self.clone(),
        }
    }
}

impl<T: Send + 'static> Default for AsyncStream<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for AsyncStream<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            pending: None,
        }
    }
}

impl<T> Unpin for AsyncStream<T> {}

impl<T> Stream for AsyncStream<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        let this = self.get_mut();
        loop {
            if let Some(rx) = this.pending.as_mut() {
                return match Pin::new(rx).poll(cx) {
                    Poll::Ready(result) => {
                        this.pending = None;
                        Poll::Ready(result.ok())
                    }
                    Poll::Pending => Poll::Pending,
                };
            }
            let mut state = this.state.lock();
            if let Some(value) = state.buffer.pop_front() {
                return Poll::Ready(Some(value));
            }
            if state.done {
                return Poll::Ready(None);
            }
            let (tx, rx) = oneshot::channel();
            state.waiters.push_back(tx);
            drop(state);
            this.pending = Some(rx);
        }
    }
}

/// Ends its stream on drop.
pub struct EndGuard<T: Send + 'static> {
    stream: AsyncStream<T>,
}

impl<T: Send + 'static> Drop for EndGuard<T> {
    fn drop(&mut self) {
        self.stream.end();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn buffered_values_come_out_in_order() {
        let mut stream = AsyncStream::new();
        stream.push(1);
        stream.push(2);
        assert_eq!(stream.buffered(), 2);
        assert_eq!(stream.next().await, Some(1));
        assert_eq!(stream.next().await, Some(2));
    }

    #[tokio::test]
    async fn push_wakes_waiting_consumer() {
        let mut stream = AsyncStream::new();
        let producer = stream.clone();
        let handle = tokio::spawn(async move { stream.next().await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        producer.push("hello");
        assert_eq!(handle.await.unwrap(), Some("hello"));
        assert_eq!(producer.buffered(), 0);
    }

    #[tokio::test]
    async fn end_flushes_waiters_and_runs_hook_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let hook_calls = Arc::clone(&calls);
        let mut stream = AsyncStream::<u32>::with_on_return(move || {
            hook_calls.fetch_add(1, Ordering::SeqCst);
        });
        let producer = stream.clone();
        let handle = tokio::spawn(async move { stream.next().await });
        tokio::time::sleep(Duration::from_millis(20)).await;

        producer.end();
        producer.end();
        assert_eq!(handle.await.unwrap(), None);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(producer.is_done());
    }

    #[tokio::test]
    async fn push_after_end_is_ignored() {
        let mut stream = AsyncStream::new();
        stream.end();
        stream.push(5);
        assert_eq!(stream.buffered(), 0);
        assert_eq!(stream.next().await, None);
    }

    #[tokio::test]
    async fn cancelled_next_does_not_lose_values() {
        let mut stream = AsyncStream::new();
        let timed_out = tokio::time::timeout(Duration::from_millis(10), stream.next()).await;
        assert!(timed_out.is_err());

        stream.push(7);
        assert_eq!(stream.next().await, Some(7));
    }

    #[tokio::test]
    async fn works_as_futures_stream() {
        use futures::StreamExt;

        let stream = AsyncStream::new();
        for i in 0..3 {
            stream.push(i);
        }
        let collected: Vec<i32> = stream.clone().take(3).collect().await;
        assert_eq!(collected, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn guard_ends_on_drop() {
        let stream = AsyncStream::<u8>::new();
        {
            let _guard = stream.end_guard();
            assert!(!stream.is_done());
        }
        assert!(stream.is_done());
    }
}
