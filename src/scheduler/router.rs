use std::{future::Future, marker::PhantomData};

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::{common::TaskHandler, scheduler::JobContext};

// =========================================================
// 解码器策略 (The Strategy)
// =========================================================

/// 定义如何将 payload 字符串解析为具体参数 Args
pub trait PayloadDecoder<Args>: Send + Sync + 'static {
    fn decode(&self, payload: &str) -> anyhow::Result<Args>;
}

/// 策略 A: JSON 解码
pub struct JsonDecoder<T>(PhantomData<fn() -> T>);

impl<T> Default for JsonDecoder<T> {
    fn default() -> Self {
        Self(PhantomData)
    }
}

impl<T: DeserializeOwned + Send + 'static> PayloadDecoder<T> for JsonDecoder<T> {
    fn decode(&self, payload: &str) -> anyhow::Result<T> {
        serde_json::from_str(payload).map_err(|e| anyhow::anyhow!("JSON decode failed: {}", e))
    }
}

/// 策略 B: 原始字符串 (透传)
#[derive(Clone, Default)]
pub struct RawDecoder;

impl PayloadDecoder<String> for RawDecoder {
    fn decode(&self, payload: &str) -> anyhow::Result<String> {
        Ok(payload.to_string())
    }
}

// =========================================================
// 通用包装器 (The Generic Wrapper)
// =========================================================

/// 一个通用的 Handler 包装器
/// 它不知道具体的参数类型，全靠 Decoder 告诉它怎么做。
pub(crate) struct HandlerWrapper<F, D, Args> {
    func: F,
    decoder: D,
    _phantom: PhantomData<fn() -> Args>,
}

impl<F, D, Args> HandlerWrapper<F, D, Args> {
    pub(crate) fn new(func: F, decoder: D) -> Self {
        Self {
            func,
            decoder,
            _phantom: PhantomData,
        }
    }
}

#[async_trait]
impl<F, Fut, D, Args> TaskHandler for HandlerWrapper<F, D, Args>
where
    F: Fn(JobContext, Args) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    D: PayloadDecoder<Args>, // <--- 关键：依赖解码器策略
    Args: Send + 'static,
{
    async fn handle(&self, ctx: JobContext) -> anyhow::Result<()> {
        // 1. 委托给 Decoder 进行解码 (失败等同于 Handler 失败，进入重试)
        let args = self.decoder.decode(ctx.raw_payload())?;

        // 2. 执行用户逻辑
        (self.func)(ctx, args).await
    }
}

/// 把字符串 payload 的闭包包装成 `TaskHandler`
pub(crate) fn raw_handler<F, Fut>(func: F) -> HandlerWrapper<F, RawDecoder, String>
where
    F: Fn(JobContext, String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    HandlerWrapper::new(func, RawDecoder)
}

/// 把 JSON 参数的闭包包装成 `TaskHandler`
pub(crate) fn json_handler<F, Fut, Args>(func: F) -> HandlerWrapper<F, JsonDecoder<Args>, Args>
where
    F: Fn(JobContext, Args) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    Args: DeserializeOwned + Send + 'static,
{
    HandlerWrapper::new(func, JsonDecoder::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::TaskMember;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Email {
        to: String,
    }

    fn ctx(payload: &str) -> JobContext {
        JobContext::new(&TaskMember::new("email", payload), 0, "node")
    }

    #[tokio::test]
    async fn json_args_are_decoded() {
        let handler = json_handler(|_ctx: JobContext, args: Email| async move {
            anyhow::ensure!(args.to == "a@b.c", "unexpected recipient");
            Ok(())
        });
        handler.handle(ctx(r#"{"to":"a@b.c"}"#)).await.unwrap();
    }

    #[tokio::test]
    async fn undecodable_payload_is_a_failure() {
        let handler = json_handler(|_ctx: JobContext, _args: Email| async move { Ok(()) });
        let err = handler.handle(ctx("not json")).await.unwrap_err();
        assert!(err.to_string().contains("JSON decode failed"));
    }

    #[tokio::test]
    async fn raw_payload_is_passed_through() {
        let handler = raw_handler(|_ctx: JobContext, payload: String| async move {
            anyhow::ensure!(payload == "a:b:c", "payload mangled");
            Ok(())
        });
        handler.handle(ctx("a:b:c")).await.unwrap();
    }
}
