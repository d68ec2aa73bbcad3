//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责一场考试会话的资源管理和调度，是整个系统的"指挥中心"。
//!
//! ## 层次关系
//!
//! ```text
//! exam_runner (一场考试)
//!     ↓
//! workflow::SequenceController (阶段流转、题池、位置)
//!     ↓
//! services (能力层：取题 / 判分 / 分流)
//!     ↓
//! clients (题库 API)
//! ```
//!
//! ## 设计原则
//!
//! 1. **资源隔离**：只有编排层创建题库客户端
//! 2. **向下依赖**：编排层 → workflow → services → clients
//! 3. **无业务逻辑**：只做调度和统计

pub mod exam_runner;

pub use exam_runner::App;
