// Model loader - obtains the one pose model instance at startup

use crate::core::ml_models::{ModelInfo, ModelManager};
use crate::models::pose::{ModelState, PoseError, PoseModelConfig, PoseResult};
use crate::platform::pose::PoseModel;
use std::future::Future;
use std::sync::{Arc, OnceLock};
use tokio::sync::watch;

/// Read-only view of the loading model, cheap to clone
#[derive(Clone)]
pub struct ModelLoader {
    state: watch::Receiver<ModelState>,
    model: Arc<OnceLock<Arc<dyn PoseModel>>>,
}

impl ModelLoader {
    /// Start loading `M` in the background. Exactly one attempt, no retry.
    /// The model file is resolved through the manager first, unless `M`
    /// never reads it.
    pub fn spawn<M: PoseModel + 'static>(
        info: ModelInfo,
        manager: ModelManager,
        input_size: u32,
    ) -> Self {
        tracing::info!(
            model = %info.name,
            version = %info.version,
            size_bytes = ?info.size_bytes,
            source = ?info.source,
            "loading pose model"
        );

        Self::spawn_with(async move {
            let model_path = if M::requires_model_file() {
                manager
                    .ensure_model(&info)
                    .await
                    .map_err(|e| PoseError::ModelLoadFailed(e.to_string()))?
            } else {
                manager.resolve_path(&info)
            };
            let config = PoseModelConfig {
                model_path,
                input_size,
            };

            let model = tokio::task::spawn_blocking(move || M::load(&config))
                .await
                .map_err(|e| PoseError::ModelLoadFailed(format!("Loader task failed: {}", e)))??;

            Ok(Arc::new(model) as Arc<dyn PoseModel>)
        })
    }

    /// Start loading with an arbitrary future producing the model
    pub fn spawn_with<F>(load: F) -> Self
    where
        F: Future<Output = PoseResult<Arc<dyn PoseModel>>> + Send + 'static,
    {
        let (state_tx, state_rx) = watch::channel(ModelState::Loading);
        let model: Arc<OnceLock<Arc<dyn PoseModel>>> = Arc::new(OnceLock::new());
        let slot = model.clone();

        tokio::spawn(async move {
            match load.await {
                Ok(loaded) => {
                    tracing::info!(model = %loaded.get_model_info(), "pose model ready");
                    let _ = slot.set(loaded);
                    state_tx.send_replace(ModelState::Ready);
                }
                Err(e) => {
                    tracing::error!(error = %e, "pose model failed to load");
                    state_tx.send_replace(ModelState::Failed(e.to_string()));
                }
            }
        });

        Self {
            state: state_rx,
            model,
        }
    }

    pub fn state(&self) -> ModelState {
        self.state.borrow().clone()
    }

    pub fn is_ready(&self) -> bool {
        self.state.borrow().is_ready()
    }

    pub fn subscribe(&self) -> watch::Receiver<ModelState> {
        self.state.clone()
    }

    /// The loaded model, once ready
    pub fn model(&self) -> Option<Arc<dyn PoseModel>> {
        self.model.get().cloned()
    }

    /// Wait until loading has finished either way
    pub async fn settled(&self) -> ModelState {
        let mut state = self.state.clone();
        let settled = match state.wait_for(|s| !matches!(s, ModelState::Loading)).await {
            Ok(settled) => settled.clone(),
            Err(_) => self.state(),
        };
        settled
    }
}
