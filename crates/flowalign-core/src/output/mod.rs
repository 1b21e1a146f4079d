pub mod assembler;
pub mod consistency;

pub use assembler::{load_records, write_records, OutputAssembler};
pub use consistency::{flow_consistency, FlowConsistencyRecord};
