pub mod auth;
pub mod bootstrap;
pub mod catalog_service;
pub mod permission;
pub mod permission_catalog;
pub mod rbac_service;
pub mod status_service;
pub mod unit_conversion;
pub mod user_service;
pub mod workflow;
