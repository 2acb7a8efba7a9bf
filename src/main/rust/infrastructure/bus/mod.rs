mod memory_bus;
mod stdio_bus;

pub use memory_bus::InMemoryBus;
pub use stdio_bus::{read_record, write_record, StdioBus, MAX_RECORD_LEN};
