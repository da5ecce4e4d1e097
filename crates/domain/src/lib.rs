pub mod entities;
pub mod ports;
pub mod repositories;
pub mod value_objects;

pub use entities::{
    ApprovalOutcome, ApprovalStatus, Attachment, Dispatch, DispatchFilter, DispatchNote,
    DispatchStatus, Expense, Job, JobFilter, JobStatus, MaterialUsage, Priority, Technician,
    TechnicianLeave, TechnicianStatus, TechnicianWorkingHours, TimeEntry,
};
pub use value_objects::{ActorContext, AuditInfo, TimeWindow};
