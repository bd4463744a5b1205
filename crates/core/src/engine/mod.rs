//! Pure subscription logic: no I/O, every function takes `now` explicitly.

pub mod access;
pub mod audience;
pub mod interval;
pub mod renewal;
pub mod status;

pub use access::{accessible_articles, can_access};
pub use audience::{AudienceRanges, SubscriptionPeriod, UserAudience};
pub use interval::{HORIZON, TimeRange, complement_ranges, merge_ranges};
pub use renewal::{ChainAssignment, RenewalKind, RenewalPlan, add_duration, plan_renewal};
pub use status::{StatusDecision, compute_status, evaluate};
