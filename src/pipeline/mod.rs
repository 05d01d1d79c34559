pub mod cleanup;
pub mod job;
