//! The multi-party workflow state machine.
//!
//! Every reviewable entity shares the same lifecycle (`status.rs`); review
//! transitions are single guarded UPDATEs so concurrent reviewers serialize
//! at the store and exactly one wins (`review.rs`). Invoice completion,
//! assignment, and co-signing are the invoice/milestone-specific sub
//! workflows.

pub mod assign;
pub mod complete;
pub mod cosign;
pub mod review;
pub mod status;

pub use assign::{assign_invoice_to_lead, assign_milestone_to_analyst};
pub use complete::{complete_invoice, notify_collections, CollectionsHandoff};
pub use cosign::cosign_milestone;
pub use review::{transition_review, ReviewEntity};
pub use status::{ReviewRequest, ReviewStatus};
