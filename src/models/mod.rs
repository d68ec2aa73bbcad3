pub mod answers;
pub mod blueprint;
pub mod item;
pub mod loaders;
pub mod pool;
pub mod session;
pub mod task;

pub use answers::AnswerMap;
pub use blueprint::{Blueprint, SectionPlan, Slot, SlotSpec};
pub use item::{AnswerKey, BankItem, BankQuestion, ItemContent};
pub use loaders::{load_bank_fixture, load_blueprint, load_replay_answers};
pub use pool::{ExclusionSet, ItemPool, PoolEntry};
pub use session::Session;
pub use task::{Branch, ScoringRule, Section, Stage, TaskType};
