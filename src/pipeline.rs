//! Assessment pipeline - retrieval to validated result
//!
//! RETRIEVE → ASSEMBLE → INVOKE → RECONCILE → MERGE CITATIONS → RECORD
//!
//! Each run only touches its own locals; the shared backends are read-only, so
//! any number of runs can proceed concurrently. Dropping the future returned by
//! `run` cancels whichever external call is in flight.

use crate::audit::{merge_citations, AuditLog};
use crate::config::Settings;
use crate::error::PipelineError;
use crate::invoker::ModelInvoker;
use crate::llm::{ChatCompletionClient, CompletionBackend};
use crate::models::Assessment;
use crate::reconcile::{create_default_reconciler, Reconciler};
use crate::retrieval::{assemble, ContextRetriever, HttpSearchBackend, InMemoryIndex, SearchBackend};
use crate::Result;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub struct AssessmentPipeline {
    retriever: ContextRetriever,
    invoker: ModelInvoker,
    reconciler: Reconciler,
    audit_log: AuditLog,
}

impl AssessmentPipeline {
    pub fn new(
        retriever: ContextRetriever,
        invoker: ModelInvoker,
        reconciler: Reconciler,
        audit_log: AuditLog,
    ) -> Self {
        Self {
            retriever,
            invoker,
            reconciler,
            audit_log,
        }
    }

    /// Wire the production backends chosen by `settings`
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let search: Arc<dyn SearchBackend> = match &settings.retrieval_url {
            Some(url) => {
                info!(url = %url, "Retrieval backend: http");
                Arc::new(HttpSearchBackend::new(url, settings.retrieval_timeout)?)
            }
            None => {
                info!("Retrieval backend: in-memory seed corpus");
                Arc::new(InMemoryIndex::with_seed_corpus())
            }
        };

        let completion: Arc<dyn CompletionBackend> = Arc::new(ChatCompletionClient::new(
            settings.provider,
            settings.api_key.clone(),
            settings.model.clone(),
            settings.llm_base_url.clone(),
            settings.llm_timeout,
        )?);

        Ok(Self::new(
            ContextRetriever::new(search, settings.top_k, settings.retrieval_timeout)?,
            ModelInvoker::new(completion, settings.llm_timeout),
            create_default_reconciler(),
            AuditLog::with_capacity(settings.audit_capacity),
        ))
    }

    pub fn provider(&self) -> &str {
        self.invoker.backend().provider()
    }

    pub fn model(&self) -> &str {
        self.invoker.backend().model()
    }

    pub fn audit_log(&self) -> &AuditLog {
        &self.audit_log
    }

    /// Run one scenario through the pipeline
    pub async fn run(&self, scenario: &str) -> Result<Assessment> {
        self.run_with_id(scenario, Uuid::new_v4()).await
    }

    /// Run under a caller-chosen audit ID, so the caller can log a failure
    /// under the same ID the pipeline used
    pub async fn run_with_id(&self, scenario: &str, audit_id: Uuid) -> Result<Assessment> {
        let start_time = Instant::now();

        info!(
            audit_id = %audit_id,
            scenario_chars = scenario.len(),
            "Pipeline: starting assessment"
        );

        let result = self.execute(scenario, audit_id).await;

        match result {
            Ok(assessment) => {
                let elapsed_ms = start_time.elapsed().as_millis() as u64;
                self.audit_log.record(assessment.clone(), elapsed_ms).await?;

                info!(
                    audit_id = %audit_id,
                    elapsed_ms,
                    warnings = assessment.corep_result.validation_warnings.len(),
                    missing = assessment.corep_result.missing_fields.len(),
                    "Pipeline: assessment complete"
                );
                Ok(assessment)
            }
            Err(e) => {
                warn!(
                    audit_id = %audit_id,
                    stage = ?e.stage(),
                    error = %e,
                    "Pipeline: assessment failed"
                );
                Err(e)
            }
        }
    }

    async fn execute(&self, scenario: &str, audit_id: Uuid) -> Result<Assessment> {
        if scenario.trim().is_empty() {
            return Err(PipelineError::InvalidRequest("scenario is empty".to_string()));
        }

        // === RETRIEVE ===
        let snippets = self.retriever.retrieve(scenario).await?;
        if snippets.is_empty() {
            warn!(audit_id = %audit_id, "No regulatory context retrieved; invoking model ungrounded");
        }
        debug!(count = snippets.len(), "Snippets retrieved");

        // === ASSEMBLE + INVOKE ===
        let context = assemble(&snippets);
        let raw_model_output = self.invoker.invoke(scenario, &context).await?;
        debug!(keys = raw_model_output.len(), "Model output decoded");

        // === RECONCILE + MERGE ===
        let reconciled = self.reconciler.reconcile(&raw_model_output);
        let corep_result = merge_citations(reconciled, &snippets);

        Ok(Assessment {
            audit_id,
            scenario: scenario.to_string(),
            retrieved_context: snippets,
            corep_result,
            raw_model_output,
        })
    }
}
