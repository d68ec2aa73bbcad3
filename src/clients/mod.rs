pub mod item_bank_client;
pub mod mock_bank;

pub use item_bank_client::{ItemBank, ItemBankClient};
pub use mock_bank::MockItemBank;
