//! 取消令牌
//!
//! 所有对外部能力的调用都携带一个 [`CancelToken`]。令牌可以：
//! - 被显式取消（`cancel()`）
//! - 到达截止时间后自动视为已取消
//! - 链接到父令牌：任一父令牌取消，子令牌也视为已取消
//!
//! 服务持有一个根令牌，`close()` 时取消，所有进行中的调用都能观察到。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// 操作已被取消（或已超过截止时间）
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Operation cancelled")]
pub struct Cancelled;

#[derive(Debug)]
struct Inner {
    cancelled: AtomicBool,
    deadline: Option<Instant>,
    parents: Vec<CancelToken>,
}

/// 可克隆的取消令牌（内部 `Arc`，克隆共享同一状态）
#[derive(Debug, Clone)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

impl CancelToken {
    /// 创建新的根令牌
    pub fn new() -> Self {
        Self::build(None, Vec::new())
    }

    /// 带截止时间的根令牌
    pub fn with_deadline(deadline: Instant) -> Self {
        Self::build(Some(deadline), Vec::new())
    }

    /// 从现在起 `timeout` 后到期的根令牌
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    fn build(deadline: Option<Instant>, parents: Vec<CancelToken>) -> Self {
        CancelToken {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                deadline,
                parents,
            }),
        }
    }

    /// 子令牌：取消子令牌不影响父令牌
    pub fn child(&self) -> Self {
        Self::build(None, vec![self.clone()])
    }

    /// 带超时的子令牌
    pub fn child_with_timeout(&self, timeout: Duration) -> Self {
        Self::build(Some(Instant::now() + timeout), vec![self.clone()])
    }

    /// 同时观察 `self` 与 `other` 的令牌
    pub fn link(&self, other: &CancelToken) -> Self {
        if Arc::ptr_eq(&self.inner, &other.inner) {
            return self.child();
        }
        Self::build(None, vec![self.clone(), other.clone()])
    }

    /// 取消
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
    }

    /// 是否已取消（显式取消、到期或任一父令牌已取消）
    pub fn is_cancelled(&self) -> bool {
        if self.inner.cancelled.load(Ordering::SeqCst) {
            return true;
        }
        if self.inner.deadline.is_some_and(|d| Instant::now() >= d) {
            return true;
        }
        self.inner.parents.iter().any(CancelToken::is_cancelled)
    }

    /// 已取消时返回 `Err(Cancelled)`，便于配合 `?` 使用
    pub fn check(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }

    /// 剩余时间（取本令牌与父令牌中最早的截止时间）
    pub fn remaining(&self) -> Option<Duration> {
        let own = self
            .inner
            .deadline
            .map(|d| d.saturating_duration_since(Instant::now()));
        self.inner
            .parents
            .iter()
            .filter_map(CancelToken::remaining)
            .chain(own)
            .min()
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_token_not_cancelled() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        assert!(token.check().is_ok());
        assert_eq!(token.remaining(), None);
    }

    #[test]
    fn test_cancel_is_shared_between_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
        assert_eq!(token.check(), Err(Cancelled));
    }

    #[test]
    fn test_child_observes_parent() {
        let parent = CancelToken::new();
        let child = parent.child();
        child.cancel();
        assert!(!parent.is_cancelled());

        let child2 = parent.child();
        parent.cancel();
        assert!(child2.is_cancelled());
    }

    #[test]
    fn test_link_observes_both() {
        let a = CancelToken::new();
        let b = CancelToken::new();
        let linked = a.link(&b);
        assert!(!linked.is_cancelled());
        b.cancel();
        assert!(linked.is_cancelled());
        assert!(!a.is_cancelled());
    }

    #[test]
    fn test_link_with_self() {
        let a = CancelToken::new();
        let linked = a.link(&a.clone());
        a.cancel();
        assert!(linked.is_cancelled());
    }

    #[test]
    fn test_deadline_expires() {
        let token = CancelToken::with_timeout(Duration::ZERO);
        assert!(token.is_cancelled());

        let token = CancelToken::with_timeout(Duration::from_secs(3600));
        assert!(!token.is_cancelled());
        assert!(token.remaining().unwrap() > Duration::from_secs(3500));
    }

    #[test]
    fn test_remaining_takes_earliest_parent_deadline() {
        let parent = CancelToken::with_timeout(Duration::from_secs(10));
        let child = parent.child_with_timeout(Duration::from_secs(3600));
        assert!(child.remaining().unwrap() <= Duration::from_secs(10));
    }
}
