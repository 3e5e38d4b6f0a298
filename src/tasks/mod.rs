pub mod attempt_poller;

pub use attempt_poller::{AttemptPoller, PollConfig, PollOutcome, PollerHandle};
