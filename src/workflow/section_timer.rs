//! 分段计时器
//!
//! 每个计时的分段一个可取消的倒计时任务。到期时通过通道发出带代号的事件，
//! 代号不是当前代号的事件视为过期事件，由控制器丢弃。

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use crate::models::task::Section;

/// 计时到期事件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerEvent {
    pub section: Section,
    pub generation: u64,
}

/// 分段计时器
pub struct SectionTimer {
    events: mpsc::UnboundedSender<TimerEvent>,
    generation: u64,
    section: Option<Section>,
    deadline: Option<Instant>,
    paused_remaining: Option<Duration>,
    task: Option<JoinHandle<()>>,
}

impl SectionTimer {
    /// 创建计时器和事件接收端
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TimerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let timer = Self {
            events: tx,
            generation: 0,
            section: None,
            deadline: None,
            paused_remaining: None,
            task: None,
        };
        (timer, rx)
    }

    /// 为分段开始新的倒计时（取消之前的倒计时）
    ///
    /// 需要在 tokio 运行时中调用。
    pub fn start(&mut self, section: Section, limit: Duration) -> u64 {
        self.cancel();
        self.section = Some(section);
        self.arm(limit)
    }

    /// 暂停倒计时，保留剩余时间
    pub fn pause(&mut self) -> Option<Duration> {
        let remaining = self.deadline.take().map(|d| d.saturating_duration_since(Instant::now()))?;
        self.abort_task();
        self.paused_remaining = Some(remaining);
        debug!("⏸ 计时暂停，剩余 {:?}", remaining);
        Some(remaining)
    }

    /// 用剩余时间恢复倒计时
    pub fn resume(&mut self) -> Option<u64> {
        let remaining = self.paused_remaining.take()?;
        debug!("▶ 计时恢复，剩余 {:?}", remaining);
        Some(self.arm(remaining))
    }

    /// 取消倒计时
    pub fn cancel(&mut self) {
        self.abort_task();
        self.deadline = None;
        self.paused_remaining = None;
        self.section = None;
    }

    /// 剩余时间（运行或暂停中）
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
            .or(self.paused_remaining)
    }

    /// 事件是否来自当前正在运行的倒计时
    pub fn is_current(&self, event: &TimerEvent) -> bool {
        self.deadline.is_some()
            && event.generation == self.generation
            && Some(event.section) == self.section
    }

    fn arm(&mut self, duration: Duration) -> u64 {
        self.abort_task();
        self.generation += 1;

        let Some(section) = self.section else {
            return self.generation;
        };
        let deadline = Instant::now() + duration;
        self.deadline = Some(deadline);

        let event = TimerEvent {
            section,
            generation: self.generation,
        };
        let tx = self.events.clone();
        self.task = Some(tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            let _ = tx.send(event);
        }));

        self.generation
    }

    fn abort_task(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for SectionTimer {
    fn drop(&mut self) {
        self.abort_task();
    }
}
