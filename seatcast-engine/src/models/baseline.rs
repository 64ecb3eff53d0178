//! Model 0: polling baseline.

use super::{ModelContext, SeatModel};
use crate::error::Result;
use crate::types::{ModelId, SourceShare};

/// Districts keep their predicted shares; blocks use regional support or polling.
#[derive(Debug, Clone, Copy, Default)]
pub struct PollingBaseline;

impl SeatModel for PollingBaseline {
    fn id(&self) -> ModelId {
        ModelId::PollingBaseline
    }

    fn party_shares(&self, ctx: &ModelContext<'_>) -> Result<SourceShare> {
        ctx.polling(self.id()).cloned()
    }
}
