pub mod bootstrap;
pub mod serve;
pub mod status;
pub mod trigger;
