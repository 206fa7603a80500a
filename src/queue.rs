//! Bounded FIFO queues with close semantics, built on `tokio::sync::mpsc`.
//!
//! A queue is a single-producer, single-consumer pair. The producer side
//! is used from synchronous, `spawn_blocking` stages (Parser, Packetizer)
//! via `blocking_send`; the consumer side is used either the same way
//! (Packetizer reading the NAL queue) or from an async stage (Sender
//! reading the packet queue) via `recv().await`. Dropping (or explicitly
//! closing) the sender is the only close signal: `tokio::sync::mpsc`
//! already drains whatever is buffered before a `recv` reports `None`, so
//! no separate closed-flag bookkeeping is needed.

use tokio::sync::mpsc;

/// Default bounded capacity for both the NAL queue and the packet queue.
pub const DEFAULT_CAPACITY: usize = 1024;

pub struct QueueSender<T> {
    inner: mpsc::Sender<T>,
}

pub struct QueueReceiver<T> {
    inner: mpsc::Receiver<T>,
}

pub fn channel<T>(capacity: usize) -> (QueueSender<T>, QueueReceiver<T>) {
    let (tx, rx) = mpsc::channel(capacity);
    (QueueSender { inner: tx }, QueueReceiver { inner: rx })
}

impl<T> QueueSender<T> {
    /// Blocking `put`, for use from synchronous (non-async) producer code
    /// running inside `spawn_blocking`. Blocks the calling thread while the
    /// queue is full.
    pub fn put(&self, item: T) -> Result<(), T> {
        self.inner.blocking_send(item).map_err(|e| e.0)
    }

    /// Async `put`, for use from async producer code.
    pub async fn put_async(&self, item: T) -> Result<(), T> {
        self.inner.send(item).await.map_err(|e| e.0)
    }

    /// Closes the queue. Producers call this exactly once when done; `get`
    /// then drains remaining buffered items before reporting closed.
    pub fn close(self) {
        drop(self);
    }
}

impl<T> QueueReceiver<T> {
    /// Blocking `get`, for use from synchronous consumer code running
    /// inside `spawn_blocking`.
    pub fn get(&mut self) -> Option<T> {
        self.inner.blocking_recv()
    }

    /// Async `get`, for use from async consumer code.
    pub async fn get_async(&mut self) -> Option<T> {
        self.inner.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drains_then_reports_closed() {
        let (tx, mut rx) = channel::<u32>(4);
        tx.put(1).unwrap();
        tx.put(2).unwrap();
        tx.close();
        assert_eq!(rx.get(), Some(1));
        assert_eq!(rx.get(), Some(2));
        assert_eq!(rx.get(), None);
    }

    #[tokio::test]
    async fn async_get_drains_then_closes() {
        let (tx, mut rx) = channel::<u32>(4);
        tx.put_async(7).await.unwrap();
        tx.close();
        assert_eq!(rx.get_async().await, Some(7));
        assert_eq!(rx.get_async().await, None);
    }

    #[test]
    fn put_blocks_when_full_and_unblocks_on_drain() {
        let (tx, mut rx) = channel::<u32>(1);
        tx.put(1).unwrap();
        let handle = std::thread::spawn(move || {
            // Would block forever if capacity weren't respected and drained.
            tx.put(2).unwrap();
        });
        assert_eq!(rx.get(), Some(1));
        handle.join().unwrap();
        assert_eq!(rx.get(), Some(2));
    }
}
