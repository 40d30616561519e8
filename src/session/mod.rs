mod controller;
mod driver;

pub use controller::{
    PlayOutcome, PlayReason, SessionController, SessionSettings, SessionSignal, SessionSnapshot,
    DEFAULT_RETRY_SETTLE,
};
pub use driver::{PlayerSession, SessionOptions};
