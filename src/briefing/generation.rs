//! Cancelable quick brief generation.
//!
//! Generation is simulated with a delay before assembly. The requesting view
//! holds a `GenerationHandle`; dismissing the view drops (or cancels) the
//! handle and the result is discarded instead of landing on stale UI state.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{PipelineError, Result};
use crate::types::Signal;

use super::{BriefingCard, NeedTag, QuickBriefAssembler};

#[derive(Debug, Clone)]
pub struct BriefRequest {
    pub account_id: String,
    pub needs: Vec<NeedTag>,
    pub signals: Vec<Signal>,
}

/// Pending generation. Dropping the handle cancels it.
pub struct GenerationHandle {
    token: CancellationToken,
    task: Option<JoinHandle<Option<Vec<BriefingCard>>>>,
}

/// Start a delayed generation on the current tokio runtime.
///
/// Needs are validated up front so caller errors surface synchronously.
/// Calling outside a runtime is a `Config` error.
pub fn spawn_generation(
    assembler: Arc<QuickBriefAssembler>,
    request: BriefRequest,
    delay: Duration,
) -> Result<GenerationHandle> {
    let needs = QuickBriefAssembler::validate_needs(&request.needs)?;
    let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
        PipelineError::Config("Brief generation requires a tokio runtime".to_string())
    })?;
    let token = CancellationToken::new();
    let child = token.child_token();

    let task = runtime.spawn(async move {
        tokio::select! {
            _ = child.cancelled() => {
                log::debug!("QuickBrief: generation for {} cancelled", request.account_id);
                None
            }
            _ = tokio::time::sleep(delay) => {
                assembler
                    .assemble(&request.account_id, &needs, &request.signals)
                    .ok()
            }
        }
    });

    Ok(GenerationHandle {
        token,
        task: Some(task),
    })
}

impl GenerationHandle {
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Wait for the cards. `None` means the generation was cancelled (stale)
    /// and the result must not be applied.
    pub async fn outcome(mut self) -> Option<Vec<BriefingCard>> {
        let task = self.task.take()?;
        let cards = task.await.ok().flatten();
        if self.token.is_cancelled() {
            return None;
        }
        cards
    }
}

impl Drop for GenerationHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
