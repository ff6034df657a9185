use async_trait::async_trait;
use deadpool_redis::redis::{self, AsyncCommands, aio::PubSub};
use futures::StreamExt;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::core::RedisPersistence;
use crate::common::error::Result;
use crate::persistence::model::{ChannelEvent, Subscription};
use crate::persistence::traits::InvalidationChannel;

/// 订阅断线后的重连间隔
const RECONNECT_DELAY: Duration = Duration::from_secs(3);

async fn open_pubsub(client: &redis::Client, channel: &str) -> Result<PubSub> {
    let mut pubsub = client.get_async_pubsub().await?;
    pubsub.subscribe(channel).await?;
    Ok(pubsub)
}

#[async_trait]
impl InvalidationChannel for RedisPersistence {
    async fn publish(&self, message: &str) -> Result<()> {
        let mut conn = self.pool.get().await?;
        // 返回值是收到消息的订阅者数量，0 也算成功
        let _: i64 = conn.publish(&self.channel, message).await?;
        Ok(())
    }

    async fn subscribe(&self) -> Result<Subscription> {
        // 第一次订阅在当前调用里完成，失败直接返回给调用方
        let first = open_pubsub(&self.client, &self.channel).await?;

        let (tx, events) = mpsc::unbounded_channel();
        let closer = CancellationToken::new();
        let token = closer.clone();
        let client = self.client.clone();
        let channel = self.channel.clone();

        // 开启一个后台任务监听 Pub/Sub
        tokio::spawn(async move {
            let mut current = Some(first);
            loop {
                let mut pubsub = match current.take() {
                    Some(pubsub) => pubsub,
                    None => {
                        tokio::select! {
                            _ = token.cancelled() => break,
                            _ = sleep(RECONNECT_DELAY) => {}
                        }
                        match open_pubsub(&client, &channel).await {
                            Ok(pubsub) => {
                                debug!("[Watch] Resubscribed to `{}`", channel);
                                // 断线期间的通知已丢失，交给监听者做一次完整重算
                                if tx.send(ChannelEvent::Resubscribed).is_err() {
                                    break;
                                }
                                pubsub
                            }
                            Err(e) => {
                                warn!("[Watch] Subscribe failed: {}. Retry in 3s...", e);
                                continue;
                            }
                        }
                    }
                };

                let stopped = {
                    let mut stream = std::pin::pin!(pubsub.on_message());
                    loop {
                        tokio::select! {
                            _ = token.cancelled() => break true,
                            msg = stream.next() => match msg {
                                Some(msg) => match msg.get_payload::<String>() {
                                    Ok(payload) => {
                                        if tx.send(ChannelEvent::Message(payload)).is_err() {
                                            break true;
                                        }
                                    }
                                    Err(e) => warn!("[Watch] Unreadable message payload: {}", e),
                                },
                                None => break false,
                            }
                        }
                    }
                };

                if stopped {
                    break;
                }
                warn!("[Watch] Connection closed. Reconnecting...");
            }
        });

        Ok(Subscription::new(events, closer))
    }
}
