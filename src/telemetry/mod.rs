pub mod config;
pub mod ctx;
pub mod ops;

use ctx::LogCtx;

pub fn monitor() -> LogCtx<ops::monitor::Monitor> { LogCtx { json: config::logs_are_json(), _marker: std::marker::PhantomData } }
pub fn aggregate() -> LogCtx<ops::aggregate::Aggregate> { LogCtx { json: config::logs_are_json(), _marker: std::marker::PhantomData } }
pub fn dispatch() -> LogCtx<ops::dispatch::Dispatch> { LogCtx { json: config::logs_are_json(), _marker: std::marker::PhantomData } }
pub fn chat() -> LogCtx<ops::chat::Chat> { LogCtx { json: config::logs_are_json(), _marker: std::marker::PhantomData } }
pub fn feed() -> LogCtx<ops::feed::Feed> { LogCtx { json: config::logs_are_json(), _marker: std::marker::PhantomData } }
