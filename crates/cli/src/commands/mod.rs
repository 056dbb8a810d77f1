pub mod checks;
pub mod discovery;
pub mod events;
pub mod status;
