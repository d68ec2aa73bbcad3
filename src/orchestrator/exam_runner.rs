//! 考试运行器 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责一场考试会话的资源和调度。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：日志文件、蓝图、题库客户端、回放作答
//! 2. **会话驱动**：确认分段说明和麦克风检测，按回放作答逐题推进
//! 3. **计时事件**：每步之前处理已到期的分段计时
//! 4. **提交与统计**：考生确认提交（失败可再次确认），输出分段成绩
//!
//! ## 设计特点
//!
//! - **顶层编排**：不做判分和分流的具体判断
//! - **资源所有者**：唯一持有题库客户端和计时事件接收端的模块

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::clients::{ItemBank, ItemBankClient, MockItemBank};
use crate::config::Config;
use crate::models::answers::AnswerMap;
use crate::models::loaders::{load_bank_fixture, load_blueprint, load_replay_answers};
use crate::services::{ItemPoolFetcher, ScoringEngine};
use crate::utils::logging::{
    init_log_file, log_section_start, log_startup, print_final_stats, truncate_text,
};
use crate::workflow::{Phase, SequenceController, TimerEvent};

/// 考生最多确认提交的次数
const SUBMIT_ATTEMPTS: usize = 3;

/// 应用主结构
pub struct App {
    config: Config,
    controller: SequenceController,
    replay: AnswerMap,
    timer_events: mpsc::UnboundedReceiver<TimerEvent>,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        // 初始化日志文件
        init_log_file(&config.output_log_file)?;

        log_startup(&config.student_id, &config.blueprint_path);

        let blueprint = load_blueprint(Path::new(&config.blueprint_path)).await?;

        let bank: Arc<dyn ItemBank> = match &config.item_bank_fixture_path {
            Some(path) => {
                info!("📁 使用本地题库: {}", path);
                Arc::new(MockItemBank::new(load_bank_fixture(Path::new(path)).await?))
            }
            None => {
                info!("🌐 使用题库 API: {}", config.item_bank_base_url);
                Arc::new(ItemBankClient::new(&config)?)
            }
        };

        let replay = match &config.replay_answers_path {
            Some(path) => load_replay_answers(Path::new(path)).await?,
            None => {
                warn!("⚠️ 未配置回放作答，所有题目将留空");
                AnswerMap::new()
            }
        };

        let fetcher = Arc::new(ItemPoolFetcher::new(bank));
        let mut controller = SequenceController::new(blueprint, fetcher)
            .with_routing_delay(config.routing_delay());
        let timer_events = controller
            .take_timer_events()
            .context("计时事件接收端已被取走")?;

        Ok(Self {
            config,
            controller,
            replay,
            timer_events,
        })
    }

    /// 运行应用主逻辑
    pub async fn run(mut self) -> Result<()> {
        if let Err(e) = self.controller.start(&self.config.student_id).await {
            if e.is_fatal() {
                error!("💥 会话失败，无法继续: {}", e);
            }
            return Err(e).context("会话无法开始");
        }

        let mut answers = AnswerMap::new();
        self.drive(&mut answers).await?;

        let report = ScoringEngine::new().section_report(self.controller.pool(), &answers);
        let submitted = self.submit(&answers).await;

        print_final_stats(&report, submitted, &self.config.output_log_file);

        Ok(())
    }

    /// 推进会话直到结束
    async fn drive(&mut self, answers: &mut AnswerMap) -> Result<()> {
        loop {
            self.handle_timer_events(answers).await?;

            match self.controller.phase() {
                Phase::Intro(section) => {
                    if let Some(plan) = self.controller.blueprint().section(section) {
                        log_section_start(plan, self.controller.pool().len());
                    }
                    self.controller.acknowledge_intro()?;
                }
                Phase::MicCheck => {
                    info!("🎤 麦克风检测通过");
                    self.controller.confirm_mic_check()?;
                }
                Phase::Test => {
                    self.answer_current(answers);
                    self.controller.advance(answers).await?;
                }
                Phase::Finished => return Ok(()),
                other => anyhow::bail!("会话处于意外阶段: {}", other),
            }
        }
    }

    /// 处理已到期的计时事件
    async fn handle_timer_events(&mut self, answers: &AnswerMap) -> Result<()> {
        while let Ok(event) = self.timer_events.try_recv() {
            self.controller.handle_timer_expired(event, answers).await?;
        }
        Ok(())
    }

    /// 把当前条目的回放作答写入作答表
    fn answer_current(&self, answers: &mut AnswerMap) {
        let Some(entry) = self.controller.current_entry() else {
            return;
        };

        let ids = std::iter::once(entry.id.as_str())
            .chain(entry.questions.iter().map(|q| q.id.as_str()));
        for id in ids {
            if let Some(response) = self.replay.get(id) {
                answers.record(id, response.clone());
            }
        }

        if self.config.verbose_logging {
            debug!(
                "[{}] 第 {} 题 {} ({}, {}): {}",
                entry.section,
                self.controller.position() + 1,
                entry.id,
                entry.task_type,
                entry.stage,
                truncate_text(
                    &self
                        .replay
                        .get(&entry.id)
                        .map(|v| v.to_string())
                        .unwrap_or_default(),
                    60
                )
            );
        }
    }

    /// 提交作答；失败时由考生再次确认，引擎本身不自动重试
    async fn submit(&mut self, answers: &AnswerMap) -> bool {
        for attempt in 1..=SUBMIT_ATTEMPTS {
            match self.controller.submit(answers).await {
                Ok(()) => return true,
                Err(e) => {
                    warn!(
                        "⚠️ 提交失败 (第 {}/{} 次确认): {}",
                        attempt, SUBMIT_ATTEMPTS, e
                    );
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
        false
    }
}
