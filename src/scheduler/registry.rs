use std::sync::Arc;

use ahash::RandomState;
use dashmap::DashMap;

use crate::common::{Result, TaskHandler, validate_handler_name};

/// Handler 注册表
///
/// - 只存在于本进程内存中，从不持久化。
/// - 同名注册后者覆盖前者。
/// - `get` 返回的是 `Arc` 克隆，移除 Handler 不会影响正在执行的那一次。
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: DashMap<String, Arc<dyn TaskHandler>, RandomState>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: DashMap::with_hasher(RandomState::new()),
        }
    }

    /// 注册 Handler (名称非法时拒绝，注册表不变)
    pub fn set(&self, name: &str, handler: Arc<dyn TaskHandler>) -> Result<()> {
        validate_handler_name(name)?;
        self.handlers.insert(name.to_string(), handler);
        Ok(())
    }

    /// 移除 Handler，返回之前是否存在
    pub fn remove(&self, name: &str) -> bool {
        self.handlers.remove(name).is_some()
    }

    // O(1) 查找
    pub fn get(&self, name: &str) -> Option<Arc<dyn TaskHandler>> {
        self.handlers.get(name).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// 已注册的名称 (排序后返回)
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
