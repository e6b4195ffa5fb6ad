//! Bounded event buffer

use super::{DeliveryClient, Loader};

/// Outcome of one flush
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Flush {
    /// Number of events handed to the delivery client
    pub events: usize,
    /// Whether the destination accepted them
    pub delivered: bool,
}

/// Accumulates events until `batch_size` is reached.
///
/// The buffer never grows past `batch_size`: once full, [`add`](Self::add)
/// hands the event back until the caller flushes.
#[derive(Debug)]
pub struct BatchBuffer<T> {
    batch_size: usize,
    events: Vec<T>,
}

impl<T> BatchBuffer<T> {
    /// Create a buffer; a `batch_size` of zero is treated as one
    pub fn new(batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            batch_size,
            events: Vec::with_capacity(batch_size),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.events.len() >= self.batch_size
    }

    /// Append an event.
    ///
    /// Returns `Ok(true)` when the buffer just became full and must be
    /// flushed, or `Err(event)` if it was already full.
    pub fn add(&mut self, event: T) -> Result<bool, T> {
        if self.is_full() {
            return Err(event);
        }
        self.events.push(event);
        Ok(self.is_full())
    }

    /// Take the buffered events, leaving the buffer empty
    pub fn take(&mut self) -> Vec<T> {
        std::mem::replace(&mut self.events, Vec::with_capacity(self.batch_size))
    }

    /// Deliver the buffered events and clear the buffer whatever the outcome.
    ///
    /// Flushing an empty buffer is a no-op that reports success.
    pub async fn flush<L>(&mut self, delivery: &DeliveryClient<L>) -> Flush
    where
        L: Loader<Item = T>,
        T: Send + Sync,
    {
        if self.events.is_empty() {
            return Flush {
                events: 0,
                delivered: true,
            };
        }

        let batch = self.take();
        let delivered = delivery.deliver(&batch).await.is_ok();
        Flush {
            events: batch.len(),
            delivered,
        }
    }
}
