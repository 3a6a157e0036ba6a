pub mod auth;
pub mod catalog;
pub mod rbac;
pub mod status;
pub mod tenancy;
