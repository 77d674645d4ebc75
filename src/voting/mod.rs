//! The voting core: topics, sessions, voter registration, vote admission and
//! tallying. HTTP handlers are a thin layer over [`Voting`].

use std::sync::Arc;

use chrono::{DateTime, SubsecRound, Utc};

use crate::{clock::Clock, store::Store, Config};

mod admission;
mod registry;
mod sessions;
mod tally;
mod topics;

pub use tally::TopicTally;

/// Longest topic title accepted, in characters.
pub const MAX_TITLE_LEN: usize = 255;
/// Longest topic description accepted, in characters.
pub const MAX_DESCRIPTION_LEN: usize = 4000;

/// Shared handle to the voting platform. Cheap to clone.
#[derive(Clone)]
pub struct Voting {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    config: Config,
}

impl Voting {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>, config: Config) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    /// The current time, at the millisecond precision the database stores.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now().trunc_subsecs(3)
    }
}

#[cfg(test)]
mod examples {
    use super::*;
    use crate::{clock::ManualClock, store::MemoryStore};

    impl Voting {
        /// An in-memory platform driven by the given clock.
        pub fn example(clock: ManualClock) -> Self {
            Self::new(
                Arc::new(MemoryStore::new()),
                Arc::new(clock),
                Config::example(),
            )
        }
    }
}
