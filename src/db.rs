pub mod user_repo;
pub use user_repo::UserRepository;
pub mod tenant_repo;
pub use tenant_repo::TenantRepository;
pub mod rbac_repo;
pub use rbac_repo::RbacRepository;
pub mod status_repo;
pub use status_repo::StatusRepository;
pub mod catalog_repo;
pub use catalog_repo::CatalogRepository;
