pub mod app;
pub mod commands;
pub mod context;
pub mod dispatch;
pub mod env;
pub mod info;
pub mod inspect;
pub mod output;
pub mod rules;
pub mod runtime;
pub mod snooze;
pub mod transfer;
