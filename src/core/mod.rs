pub mod concurrent;
pub mod hierarchy;
pub mod planner;
pub mod sequential;
pub mod server;

pub use crate::domain::model::{Group, Identity, Page, PageDescriptor, Project, User};
pub use crate::domain::ports::{ConfigProvider, RemoteCollection};
pub use crate::utils::error::Result;
