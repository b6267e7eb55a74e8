pub mod audit_service;
pub mod bulk_targets;
pub mod change_lines;
pub mod labels;
pub mod snapshot_index;
pub mod sync_filter;
pub mod target_resolver;
pub mod tokens;
