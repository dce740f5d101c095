//! Service adapters for Worksuite — Jira, Bitbucket, Confluence, Asana,
//! TestRail.
//!
//! Each adapter implements the [`Adapter`] trait defined in [`traits`],
//! providing a uniform interface for tool discovery and execution.  Tool
//! results use the shared envelope from `worksuite_core::envelope`: upstream
//! failures come back as error envelopes, while unknown tools and bad
//! parameters are hard errors at the trait boundary.

pub mod asana;
pub mod bitbucket;
pub mod confluence;
pub mod jira;
pub mod params;
pub mod testrail;
pub mod traits;

pub use asana::AsanaAdapter;
pub use bitbucket::BitbucketAdapter;
pub use confluence::ConfluenceAdapter;
pub use jira::JiraAdapter;
pub use testrail::TestRailAdapter;
pub use traits::{Adapter, AdapterType, AuthRequirement, ToolDefinition};
pub use worksuite_core::{AdapterError, Result};
