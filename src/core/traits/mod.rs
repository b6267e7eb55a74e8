pub mod audit_source;
