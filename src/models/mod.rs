pub mod funding;
pub mod invoice;
pub mod kyc;
pub mod milestone;
pub mod note;
pub mod notification;
pub mod principal;
pub mod rbac;
pub mod vendor;
