use std::collections::VecDeque;
use std::sync::Mutex;

use super::provider::{
    EmptyMessageSetSnafu, LlmProvider, ProviderResult, ProviderStreamHandle, ProviderWorker,
    StreamRequest, make_event_stream,
};
use crate::chat::{StreamEventMapped, StreamEventPayload};

/// One step of a scripted provider response.
#[derive(Debug, Clone)]
pub(crate) enum ScriptStep {
    Emit(StreamEventPayload),
    /// Stop emitting and wait until the stream is cancelled.
    Hang,
    /// Fail to open the stream; only meaningful as the first step.
    Refuse,
}

impl ScriptStep {
    pub(crate) fn delta(text: &str) -> Self {
        Self::Emit(StreamEventPayload::Delta(text.to_string()))
    }

    pub(crate) fn done() -> Self {
        Self::Emit(StreamEventPayload::Done)
    }

    pub(crate) fn error(message: &str) -> Self {
        Self::Emit(StreamEventPayload::Error(message.to_string()))
    }
}

/// Provider that replays one script per request and records every request.
pub(crate) struct ScriptedProvider {
    scripts: Mutex<VecDeque<Vec<ScriptStep>>>,
    requests: Mutex<Vec<StreamRequest>>,
}

impl ScriptedProvider {
    pub(crate) fn new() -> Self {
        Self {
            scripts: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_script(self, steps: Vec<ScriptStep>) -> Self {
        self.scripts.lock().unwrap().push_back(steps);
        self
    }

    pub(crate) fn requests(&self) -> Vec<StreamRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl LlmProvider for ScriptedProvider {
    fn id(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-model"
    }

    fn stream_chat(&self, request: StreamRequest) -> ProviderResult<ProviderStreamHandle> {
        let target = request.target;
        self.requests.lock().unwrap().push(request);
        let steps = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| vec![ScriptStep::done()]);
        if matches!(steps.first(), Some(ScriptStep::Refuse)) {
            return EmptyMessageSetSnafu {
                stage: "scripted-open-stream",
                target,
            }
            .fail();
        }

        let (event_tx, stream, cancel_rx) = make_event_stream(target);
        let worker: ProviderWorker = Box::pin(async move {
            for step in steps {
                match step {
                    ScriptStep::Emit(payload) => {
                        if event_tx.send(StreamEventMapped { target, payload }).is_err() {
                            return;
                        }
                        tokio::task::yield_now().await;
                    }
                    ScriptStep::Hang => {
                        let _ = cancel_rx.await;
                        return;
                    }
                    ScriptStep::Refuse => return,
                }
            }
        });

        Ok(ProviderStreamHandle { stream, worker })
    }
}
