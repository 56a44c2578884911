pub mod calculator;
mod dispatcher;

pub use dispatcher::ActionDispatcher;
