pub mod admin;
pub mod auth;
pub mod funding;
pub mod health;
pub mod invoices;
pub mod kyc;
pub mod milestones;
pub mod notes;
pub mod notifications;
pub mod vendors;
pub mod workload;
