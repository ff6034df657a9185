use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// 有序索引中的一条记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    /// 编码后的任务成员 (见 `TaskMember::encode`)
    pub member: String,
    /// Score = due time (Unix 毫秒)
    pub score: i64,
}

impl IndexEntry {
    pub fn new(member: impl Into<String>, score: i64) -> Self {
        Self {
            member: member.into(),
            score,
        }
    }
}

/// 订阅通道上的事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// 收到一条消息 (消息体原样透传，由监听者判断是否为 update)
    Message(String),
    /// 订阅断开后重新建立
    ///
    /// 断开期间的消息已经丢失，监听者应当当作一次 update 处理。
    Resubscribed,
}

/// 一个活跃的订阅
///
/// - 通过 `recv` 逐条读取事件。
/// - `close` 或 Drop 时关闭底层订阅连接。
#[derive(Debug)]
pub struct Subscription {
    events: mpsc::UnboundedReceiver<ChannelEvent>,
    closer: CancellationToken,
}

impl Subscription {
    pub fn new(events: mpsc::UnboundedReceiver<ChannelEvent>, closer: CancellationToken) -> Self {
        Self { events, closer }
    }

    /// 读取下一条事件，订阅关闭后返回 None
    pub async fn recv(&mut self) -> Option<ChannelEvent> {
        self.events.recv().await
    }

    /// 关闭订阅 (幂等)
    pub fn close(&self) {
        self.closer.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.closer.is_cancelled()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.closer.cancel();
    }
}
