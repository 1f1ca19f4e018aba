//! User lookup contract consumed by the identity resolver.

mod model;
mod store;

pub use model::{OrgRole, PermissionMap, SignedInUser, SignedInUserQuery};
pub use store::{MemoryUserStore, UserAccount, UserStore};
