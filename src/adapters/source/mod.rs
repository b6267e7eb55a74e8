pub mod jsonl_source;
pub mod postgres_source;
