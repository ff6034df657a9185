use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

use crate::common::DrainReport;
use crate::common::error::Result;
use crate::driver::TaskDriver;
use crate::persistence::{ChannelEvent, Subscription};

impl TaskDriver {
    /// 开启失效通知监听
    ///
    /// 打开独立订阅，收到 update 就重算定时器；随后立即做一次重算。
    /// 重复调用会替换掉之前的订阅。
    pub async fn enable_listener(&self) -> Result<DrainReport> {
        let subscription = self.inner.ctx.channel.subscribe().await?;
        let token = self.spawn_listener(subscription);

        if let Some(previous) = self.inner.listener.lock().replace(token) {
            previous.cancel();
        }
        debug!(
            "[Listener-{}] Subscribed to `{}`",
            self.inner.ctx.node_id,
            self.inner.ctx.config.channel()
        );

        self.recompute().await
    }

    /// 关闭监听
    ///
    /// 已布防的定时器不受影响。
    ///
    /// # 返回值
    /// 之前是否处于监听状态
    pub fn disable_listener(&self) -> bool {
        match self.inner.listener.lock().take() {
            Some(token) => {
                token.cancel();
                debug!("[Listener-{}] Unsubscribed", self.inner.ctx.node_id);
                true
            }
            None => false,
        }
    }

    pub fn listener_enabled(&self) -> bool {
        self.inner.listener.lock().is_some()
    }

    /// 监听协程
    ///
    /// 只持有弱引用；停止信号是全局关机信号的子 Token。
    fn spawn_listener(&self, mut subscription: Subscription) -> CancellationToken {
        let token = self.inner.ctx.shutdown.child_token();
        let stop = token.clone();
        let weak = Arc::downgrade(&self.inner);
        let update = self.inner.ctx.update_message().to_string();

        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    _ = stop.cancelled() => break,
                    event = subscription.recv() => event,
                };

                let wake = match event {
                    Some(ChannelEvent::Message(message)) => message == update,
                    // 断线期间可能漏掉了通知
                    Some(ChannelEvent::Resubscribed) => true,
                    None => {
                        warn!("[Listener] Subscription closed underneath, listener stopped");
                        break;
                    }
                };
                if !wake {
                    trace!("[Listener] Ignoring unrelated message");
                    continue;
                }

                let Some(inner) = weak.upgrade() else {
                    break;
                };
                let driver = TaskDriver { inner };
                if let Err(e) = driver.recompute().await {
                    error!("[Listener] Recompute failed: {}", e);
                }
            }
            subscription.close();
        });

        token
    }
}
