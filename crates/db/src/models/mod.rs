pub mod profile;
pub mod reminder_recipient;
pub mod todo;
