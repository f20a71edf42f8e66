pub mod ask;
pub mod classify;
pub mod doctor;
pub mod session;
