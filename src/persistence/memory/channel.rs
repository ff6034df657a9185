use async_trait::async_trait;
use tokio::sync::{broadcast::error::RecvError, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::trace;

use super::MemoryPersistence;
use crate::common::error::Result;
use crate::persistence::model::{ChannelEvent, Subscription};
use crate::persistence::traits::InvalidationChannel;

#[async_trait]
impl InvalidationChannel for MemoryPersistence {
    async fn publish(&self, message: &str) -> Result<()> {
        self.ensure_online()?;
        // 没有订阅者时 send 返回 Err，与 PUBLISH 返回 0 等价，忽略
        let _ = self.topic.send(message.to_string());
        Ok(())
    }

    async fn subscribe(&self) -> Result<Subscription> {
        self.ensure_online()?;
        // 在返回之前就完成订阅，之后的发布一定能收到
        let mut rx = self.topic.subscribe();
        let (tx, events) = mpsc::unbounded_channel();
        let closer = CancellationToken::new();
        let token = closer.clone();

        // 桥接模式: broadcast -> 订阅者自己的 mpsc
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    msg = rx.recv() => match msg {
                        Ok(message) => {
                            if tx.send(ChannelEvent::Message(message)).is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            trace!("[Memory] Subscriber lagged, {} messages skipped", skipped);
                            if tx.send(ChannelEvent::Resubscribed).is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            }
        });

        Ok(Subscription::new(events, closer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_messages_published_after_subscribe() {
        let store = MemoryPersistence::new();
        let mut sub = store.subscribe().await.unwrap();
        store.publish("update").await.unwrap();
        store.publish("other").await.unwrap();
        assert_eq!(sub.recv().await, Some(ChannelEvent::Message("update".into())));
        assert_eq!(sub.recv().await, Some(ChannelEvent::Message("other".into())));
    }

    #[tokio::test]
    async fn overflowed_subscriber_is_told_to_resubscribe() {
        let store = MemoryPersistence::new();
        let mut sub = store.subscribe().await.unwrap();
        for i in 0..300 {
            store.publish(&format!("m{i}")).await.unwrap();
        }
        assert_eq!(sub.recv().await, Some(ChannelEvent::Resubscribed));
        assert_eq!(sub.recv().await, Some(ChannelEvent::Message("m44".into())));
    }

    #[tokio::test]
    async fn publish_without_subscribers_succeeds() {
        let store = MemoryPersistence::new();
        store.publish("update").await.unwrap();
    }

    #[tokio::test]
    async fn closed_subscription_ends_stream() {
        let store = MemoryPersistence::new();
        let mut sub = store.subscribe().await.unwrap();
        sub.close();
        assert!(sub.is_closed());
        assert_eq!(sub.recv().await, None);
    }
}
