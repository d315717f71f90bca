//! Built-in tools registered by the server binary

pub mod tools;
