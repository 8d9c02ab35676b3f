use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::{broadcast, RwLock};

/// Capacity of each canvas channel; slow subscribers skip what they missed
const CHANNEL_CAPACITY: usize = 256;

/// A committed pixel as pushed to live subscribers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelEvent {
    pub x: i64,
    pub y: i64,
    pub color: String,
}

/// Per-canvas broadcast of committed pixels
#[derive(Default)]
pub struct PixelFeed {
    channels: RwLock<HashMap<String, broadcast::Sender<PixelEvent>>>,
}

impl PixelFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to a canvas, creating its channel on first use
    pub async fn subscribe(&self, canvas_id: &str) -> broadcast::Receiver<PixelEvent> {
        {
            let channels = self.channels.read().await;
            if let Some(sender) = channels.get(canvas_id) {
                return sender.subscribe();
            }
        }

        let mut channels = self.channels.write().await;
        channels
            .entry(canvas_id.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Push a pixel to the canvas subscribers; returns how many received it.
    ///
    /// A channel whose subscribers have all gone is dropped.
    pub async fn publish(&self, canvas_id: &str, event: PixelEvent) -> usize {
        let delivered = {
            let channels = self.channels.read().await;
            match channels.get(canvas_id) {
                Some(sender) => sender.send(event).ok(),
                None => return 0,
            }
        };

        match delivered {
            Some(count) => count,
            None => {
                self.release(canvas_id).await;
                0
            }
        }
    }

    /// Drop the canvas channel once its last subscriber is gone
    pub async fn release(&self, canvas_id: &str) {
        let mut channels = self.channels.write().await;
        if channels
            .get(canvas_id)
            .is_some_and(|sender| sender.receiver_count() == 0)
        {
            channels.remove(canvas_id);
        }
    }

    /// Number of canvases with an open channel
    pub async fn count(&self) -> usize {
        self.channels.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(x: i64) -> PixelEvent {
        PixelEvent {
            x,
            y: 0,
            color: "#000000".to_string(),
        }
    }

    #[tokio::test]
    async fn test_publish_reaches_subscribers_of_that_canvas() {
        let feed = PixelFeed::new();
        let mut first = feed.subscribe("c1").await;
        let mut second = feed.subscribe("c1").await;
        let mut other = feed.subscribe("c2").await;

        assert_eq!(feed.publish("c1", event(1)).await, 2);
        assert_eq!(first.recv().await.unwrap(), event(1));
        assert_eq!(second.recv().await.unwrap(), event(1));
        assert!(other.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let feed = PixelFeed::new();
        assert_eq!(feed.publish("c1", event(1)).await, 0);

        let receiver = feed.subscribe("c1").await;
        assert_eq!(feed.count().await, 1);
        drop(receiver);

        assert_eq!(feed.publish("c1", event(2)).await, 0);
        assert_eq!(feed.count().await, 0);
    }

    #[tokio::test]
    async fn test_release_drops_idle_channels_only() {
        let feed = PixelFeed::new();
        let kept = feed.subscribe("c1").await;
        let gone = feed.subscribe("c2").await;
        drop(gone);

        feed.release("c1").await;
        feed.release("c2").await;
        feed.release("missing").await;
        assert_eq!(feed.count().await, 1);

        drop(kept);
        feed.release("c1").await;
        assert_eq!(feed.count().await, 0);
    }
}
