//! 考试流程控制 - 流程层
//!
//! 核心职责：持有题池、当前位置和阶段，是唯一修改题池、推进位置的组件。
//!
//! 阶段流转：
//! 1. Loading → Intro：初始题池非空
//! 2. Intro → MicCheck（仅口语分段）→ Test
//! 3. Test → MstRouting → Test：自适应分段答完最后一道分流题
//! 4. Test → Intro：进入下一分段
//! 5. Test → Finished：越过题池末尾

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::error::{AppError, AppResult, SessionError};
use crate::models::answers::AnswerMap;
use crate::models::blueprint::Blueprint;
use crate::models::pool::{ExclusionSet, ItemPool, PoolEntry};
use crate::models::session::Session;
use crate::models::task::{Branch, Section, Stage};
use crate::services::{ItemPoolFetcher, RoutingDecision};
use crate::workflow::phase::Phase;
use crate::workflow::section_timer::{SectionTimer, TimerEvent};

/// 可持久化的会话状态，交给外部存储用于断点恢复
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session: Option<Session>,
    pub phase: Phase,
    pub position: usize,
    pub furthest: usize,
    pub pool: ItemPool,
    pub exclusion: ExclusionSet,
    pub routed: HashMap<Section, Branch>,
    pub answers: AnswerMap,
    #[serde(default)]
    pub submitted: bool,
    /// 当前分段剩余时间（秒）
    #[serde(default)]
    pub timer_remaining_secs: Option<u64>,
}

/// 考试流程控制器
///
/// - 编排取题、分流、计时和提交
/// - 单写者：题池与排除集合只在这里（以及它调用的取题服务）被修改
/// - 作答表由调用方持有，只在分段边界读取快照
pub struct SequenceController {
    blueprint: Blueprint,
    fetcher: Arc<ItemPoolFetcher>,
    routing: RoutingDecision,
    routing_delay: Duration,
    session: Option<Session>,
    phase: Phase,
    pool: ItemPool,
    exclusion: ExclusionSet,
    position: usize,
    furthest: usize,
    routed: HashMap<Section, Branch>,
    submitted: bool,
    finished_at: Option<DateTime<Local>>,
    timer: SectionTimer,
    timer_events: Option<mpsc::UnboundedReceiver<TimerEvent>>,
}

impl SequenceController {
    pub fn new(blueprint: Blueprint, fetcher: Arc<ItemPoolFetcher>) -> Self {
        let (timer, timer_events) = SectionTimer::new();
        Self {
            blueprint,
            routing: RoutingDecision::new(fetcher.clone()),
            fetcher,
            routing_delay: Duration::ZERO,
            session: None,
            phase: Phase::Loading,
            pool: ItemPool::new(),
            exclusion: ExclusionSet::new(),
            position: 0,
            furthest: 0,
            routed: HashMap::new(),
            submitted: false,
            finished_at: None,
            timer,
            timer_events: Some(timer_events),
        }
    }

    /// 分流完成后返回作答前的停顿
    pub fn with_routing_delay(mut self, delay: Duration) -> Self {
        self.routing_delay = delay;
        self
    }

    /// 从快照恢复
    ///
    /// 快照处于作答阶段且带有剩余时间时会按剩余时间重新开始计时。
    pub async fn resume(
        blueprint: Blueprint,
        fetcher: Arc<ItemPoolFetcher>,
        snapshot: SessionSnapshot,
    ) -> (Self, AnswerMap) {
        let mut controller = Self::new(blueprint, fetcher);
        controller.session = snapshot.session;
        controller.pool = snapshot.pool;
        controller.exclusion = snapshot.exclusion;
        controller.position = snapshot.position;
        controller.furthest = snapshot.furthest.max(snapshot.position);
        controller.routed = snapshot.routed;
        controller.submitted = snapshot.submitted;
        controller.phase = match snapshot.phase {
            // 分流中断：已分流则直接回到作答，否则重新触发
            Phase::MstRouting => Phase::Test,
            other => other,
        };
        if controller.phase == Phase::Finished {
            controller.finished_at = Some(Local::now());
        }

        if controller.phase == Phase::Test {
            if let (Some(section), Some(secs)) =
                (controller.current_section(), snapshot.timer_remaining_secs)
            {
                controller.timer.start(section, Duration::from_secs(secs));
            }
        }

        info!(
            "♻️ 从快照恢复: 阶段 {}, 位置 {}/{}",
            controller.phase,
            controller.position,
            controller.pool.len()
        );

        (controller, snapshot.answers)
    }

    /// 导出当前状态
    pub fn snapshot(&self, answers: &AnswerMap) -> SessionSnapshot {
        SessionSnapshot {
            session: self.session.clone(),
            phase: self.phase,
            position: self.position,
            furthest: self.furthest,
            pool: self.pool.clone(),
            exclusion: self.exclusion.clone(),
            routed: self.routed.clone(),
            answers: answers.clone(),
            submitted: self.submitted,
            timer_remaining_secs: self.timer.remaining().map(|d| d.as_secs()),
        }
    }

    // ========== 访问器 ==========

    pub fn blueprint(&self) -> &Blueprint {
        &self.blueprint
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn pool(&self) -> &ItemPool {
        &self.pool
    }

    pub fn exclusion(&self) -> &ExclusionSet {
        &self.exclusion
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn current_entry(&self) -> Option<&PoolEntry> {
        self.pool.get(self.position)
    }

    pub fn current_section(&self) -> Option<Section> {
        self.current_entry().map(|e| e.section)
    }

    /// 分段的分流结果
    pub fn routed_branch(&self, section: Section) -> Option<Branch> {
        self.routed.get(&section).copied()
    }

    pub fn is_submitted(&self) -> bool {
        self.submitted
    }

    pub fn finished_at(&self) -> Option<DateTime<Local>> {
        self.finished_at
    }

    pub fn timer_remaining(&self) -> Option<Duration> {
        self.timer.remaining()
    }

    /// 取走计时事件接收端（只能取一次）
    pub fn take_timer_events(&mut self) -> Option<mpsc::UnboundedReceiver<TimerEvent>> {
        self.timer_events.take()
    }

    // ========== 阶段流转 ==========

    /// 注册会话并组装初始题池
    pub async fn start(&mut self, student_id: &str) -> AppResult<Phase> {
        if self.phase != Phase::Loading {
            return Err(AppError::invalid_transition(self.phase, "start"));
        }

        let session_id = match self.fetcher.bank().register_session(student_id).await {
            Ok(id) => id,
            Err(e) => {
                error!("❌ 会话注册失败 (学生 {}): {}", student_id, e);
                self.phase = Phase::Failed;
                return Err(e);
            }
        };
        let session = Session::new(session_id, student_id);
        info!("{} ✓ 会话注册成功", session);
        self.session = Some(session);

        for (stage, slots) in self.blueprint.initial_slots() {
            let entries = self
                .fetcher
                .fetch_slots(&slots, stage, &mut self.exclusion)
                .await;
            self.pool.append(entries);
        }

        let Some(first_section) = self.pool.get(0).map(|e| e.section) else {
            error!("❌ 初始题池为空，会话无法开始");
            self.phase = Phase::Failed;
            return Err(SessionError::EmptyPool.into());
        };

        info!("✓ 初始题池组装完成: {} 个条目", self.pool.len());
        self.position = 0;
        self.furthest = 0;
        self.phase = Phase::Intro(first_section);
        Ok(self.phase)
    }

    /// 考生确认分段说明
    pub fn acknowledge_intro(&mut self) -> AppResult<Phase> {
        let Phase::Intro(section) = self.phase else {
            return Err(AppError::invalid_transition(self.phase, "acknowledge_intro"));
        };

        if section.requires_mic_check() {
            self.phase = Phase::MicCheck;
        } else {
            self.enter_test(section);
        }
        Ok(self.phase)
    }

    /// 考生完成麦克风检测
    pub fn confirm_mic_check(&mut self) -> AppResult<Phase> {
        if self.phase != Phase::MicCheck {
            return Err(AppError::invalid_transition(self.phase, "confirm_mic_check"));
        }
        match self.current_section() {
            Some(section) => self.enter_test(section),
            None => self.finish(),
        }
        Ok(self.phase)
    }

    /// 进入下一题
    ///
    /// 在自适应分段的最后一道分流题上调用时，先分流并插入第二阶段题目。
    /// 到达 Finished 后再调用不做任何事。
    pub async fn advance(&mut self, answers: &AnswerMap) -> AppResult<Phase> {
        match self.phase {
            Phase::Finished => {
                debug!("已结束，忽略 advance");
                return Ok(Phase::Finished);
            }
            Phase::Test => {}
            other => return Err(AppError::invalid_transition(other, "advance")),
        }

        let Some(section) = self.current_section() else {
            self.finish();
            return Ok(self.phase);
        };

        if self.needs_routing(section) {
            self.run_routing(section, answers).await?;
        }

        self.step_forward(section);
        Ok(self.phase)
    }

    /// 分段内回看
    pub fn review_goto(&mut self, index: usize) -> AppResult<()> {
        if self.phase != Phase::Test {
            return Err(AppError::invalid_transition(self.phase, "review_goto"));
        }
        let Some(section) = self.current_section() else {
            return Err(review_error(index, "当前没有题目"));
        };

        let reviewable = self
            .blueprint
            .section(section)
            .is_some_and(|plan| plan.reviewable);
        if !reviewable {
            return Err(review_error(index, format!("分段 {} 不允许回看", section)));
        }

        let target = self
            .pool
            .get(index)
            .ok_or_else(|| review_error(index, "超出题池范围"))?;
        // 同一分段的条目是连续的，分段检查同时保证不会越过分段起点
        if target.section != section {
            return Err(review_error(index, format!("不属于当前分段 {}", section)));
        }
        if index > self.furthest {
            return Err(review_error(index, "尚未到达该题"));
        }
        if target.stage == Stage::Router && self.routed.contains_key(&section) {
            return Err(review_error(index, "分段已分流，不能回到分流题"));
        }

        debug!("[{}] ↩ 回看: {} -> {}", section, self.position, index);
        self.position = index;
        Ok(())
    }

    /// 提交作答
    ///
    /// 失败时状态不变，可以再次提交；成功后再调用不做任何事。
    pub async fn submit(&mut self, answers: &AnswerMap) -> AppResult<()> {
        if self.phase != Phase::Finished {
            return Err(AppError::invalid_transition(self.phase, "submit"));
        }
        if self.submitted {
            debug!("作答已提交，忽略重复提交");
            return Ok(());
        }
        let session = self
            .session
            .as_ref()
            .ok_or_else(|| AppError::invalid_transition(self.phase, "submit (没有会话)"))?;

        if let Err(e) = self.fetcher.bank().submit_answers(&session.id, answers).await {
            warn!("{} ⚠️ 提交失败，可重新提交: {}", session, e);
            return Err(e);
        }

        info!("{} ✅ 作答已提交 ({} 条)", session, answers.len());
        self.submitted = true;
        Ok(())
    }

    /// 处理计时到期事件
    ///
    /// 过期代号或不在作答阶段的事件被忽略。到期后按 advance 的同一路径
    /// 推进，直到离开当前分段（中途照常分流）。
    pub async fn handle_timer_expired(
        &mut self,
        event: TimerEvent,
        answers: &AnswerMap,
    ) -> AppResult<Phase> {
        if self.phase != Phase::Test || !self.timer.is_current(&event) {
            debug!("忽略过期计时事件: {:?}", event);
            return Ok(self.phase);
        }

        warn!("[{}] ⏰ 分段时间到", event.section);
        self.timer.cancel();

        while self.phase == Phase::Test && self.current_section() == Some(event.section) {
            self.advance(answers).await?;
        }
        Ok(self.phase)
    }

    // ========== 内部 ==========

    fn needs_routing(&self, section: Section) -> bool {
        let adaptive = self
            .blueprint
            .section(section)
            .is_some_and(|plan| plan.is_adaptive());

        adaptive
            && self.pool.last_router_index(section) == Some(self.position)
            && !self.pool.has_stage_two(section)
            && !self.routed.contains_key(&section)
    }

    async fn run_routing(&mut self, section: Section, answers: &AnswerMap) -> AppResult<()> {
        let Some(plan) = self.blueprint.section(section).cloned() else {
            return Ok(());
        };

        self.phase = Phase::MstRouting;
        self.timer.pause();

        let router_items = self.pool.stage_entries(section, Stage::Router);
        let (outcome, entries) = self
            .routing
            .route(&plan, &router_items, answers, &mut self.exclusion)
            .await;
        self.routed.insert(section, outcome.branch);

        let inserted = if entries.is_empty() {
            warn!("[{}] ⚠️ {} 分支没有取到题目", section, outcome.branch);
            Ok(())
        } else {
            let count = entries.len();
            self.pool
                .insert_stage_two_after(self.position, entries)
                .map(|start| {
                    info!(
                        "[{}] ✓ 插入 {} 个 {} 条目，起始位置 {}",
                        section, count, outcome.branch, start
                    );
                })
        };

        if !self.routing_delay.is_zero() {
            tokio::time::sleep(self.routing_delay).await;
        }

        self.phase = Phase::Test;
        self.timer.resume();
        inserted
    }

    fn step_forward(&mut self, section: Section) {
        let next = self.position + 1;
        match self.pool.get(next).map(|e| e.section) {
            None => self.finish(),
            Some(next_section) => {
                self.position = next;
                self.furthest = self.furthest.max(next);
                if next_section != section {
                    self.timer.cancel();
                    info!("[{}] ✓ 分段结束，进入 {}", section, next_section);
                    self.phase = Phase::Intro(next_section);
                }
            }
        }
    }

    fn enter_test(&mut self, section: Section) {
        self.phase = Phase::Test;
        if let Some(limit) = self.blueprint.section(section).and_then(|p| p.time_limit()) {
            self.timer.start(section, limit);
            debug!("[{}] ⏱ 开始计时 {:?}", section, limit);
        }
    }

    fn finish(&mut self) {
        self.timer.cancel();
        self.phase = Phase::Finished;
        self.finished_at = Some(Local::now());
        info!("🏁 全部题目完成，共 {} 个条目", self.pool.len());
    }
}

fn review_error(index: usize, reason: impl Into<String>) -> AppError {
    SessionError::ReviewOutOfBounds {
        index,
        reason: reason.into(),
    }
    .into()
}
