mod memory_store;
mod scenarios;
