pub mod memory;
pub mod revoked_tokens;
pub mod users;

pub use memory::MemoryUserStore;
pub use revoked_tokens::PgTokenBlacklist;
pub use users::{NewUser, PgUserStore, User, UserStore, authenticate};
