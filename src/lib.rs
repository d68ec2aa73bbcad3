//! # MST Exam Engine
//!
//! 多阶段自适应（MST）英语能力考试引擎
//!
//! ## 架构设计
//!
//! 本系统采用严格的分层架构：
//!
//! ### ① 客户端层（Clients）
//! - `clients/` - 题库 / 会话服务的请求与响应契约
//! - `ItemBank` - 取题、注册会话、提交作答三个能力
//! - `ItemBankClient` - HTTP 实现；`MockItemBank` - 内存实现
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，不持有会话状态
//! - `ItemPoolFetcher` - 按题位取题，维护排除集合
//! - `ScoringEngine` - 按题型判分
//! - `RoutingDecision` - 路由阶段判分，选择分支并取题
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一场考试"的阶段流转
//! - `SequenceController` - 题池、位置、阶段、回看、提交、快照
//! - `SectionTimer` - 分段计时
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/exam_runner` - 加载蓝图、驱动会话、提交并输出成绩
//!
//! ## 模块结构

pub mod clients;
pub mod config;
pub mod error;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use clients::{ItemBank, ItemBankClient, MockItemBank};
pub use config::Config;
pub use error::{AppError, AppResult};
pub use models::{AnswerMap, Blueprint, ItemPool, PoolEntry, Section, Stage};
pub use orchestrator::App;
pub use services::{ItemPoolFetcher, RoutingDecision, Score, ScoringEngine};
pub use workflow::{Phase, SequenceController, SessionSnapshot};
