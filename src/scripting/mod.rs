mod bindings;
mod manager;

pub use manager::ScriptHost;
