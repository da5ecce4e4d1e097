mod postgres_dispatch_item_repository;
mod postgres_dispatch_repository;
mod postgres_job_repository;
mod postgres_technician_repository;

pub use postgres_dispatch_item_repository::PostgresDispatchItemRepository;
pub use postgres_dispatch_repository::PostgresDispatchRepository;
pub use postgres_job_repository::PostgresJobRepository;
pub use postgres_technician_repository::PostgresTechnicianRepository;
