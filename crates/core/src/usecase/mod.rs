pub mod job_monitor;
pub mod note_service;
