pub mod audit_log_row;
pub mod member;
pub mod raw_audit_row;
