//! Department agent: memory, model and operations for one scope.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use erpmind_common::{failure_text, is_failure_text, Department, Operation, OperationCatalog, Oracle};
use erpmind_llm::{LlmClient, LlmRequest};
use erpmind_memory::{with_context, ContextStore, LoadOutcome, MemoryError, RetrievedContext, StoreStats};

use crate::correction::CorrectionLoop;
use crate::dispatch::{parse_tool_choice, ToolChoice};

const TIMEOUT_MESSAGE: &str = "Agent timed out. Please try a simpler query.";

#[derive(Debug, Clone)]
pub struct AgentSettings {
    /// Directory holding `context_<Department>` snapshots.
    pub context_dir: PathBuf,
    /// Prior interactions shown with each query.
    pub context_k: usize,
    /// Bound on one whole request.
    pub timeout: Duration,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            context_dir: PathBuf::from("context_data"),
            context_k: 2,
            timeout: Duration::from_secs(45),
            temperature: 0.3,
            max_tokens: 1024,
        }
    }
}

/// Reply to one query plus the prior interactions it was shown.
#[derive(Debug, Clone)]
pub struct AgentReply {
    pub text: String,
    pub context: Vec<RetrievedContext>,
}

impl AgentReply {
    pub fn is_failure(&self) -> bool {
        is_failure_text(&self.text)
    }
}

pub struct DepartmentAgent {
    department: Department,
    operations: Vec<Arc<dyn Operation>>,
    llm: Arc<dyn LlmClient>,
    correction: CorrectionLoop,
    memory: Mutex<ContextStore>,
    settings: AgentSettings,
    system_prompt: String,
}

impl DepartmentAgent {
    /// Build the agent and restore its saved context, if any.
    ///
    /// A snapshot that fails to load is logged and the agent starts empty.
    pub async fn new(
        department: Department,
        catalog: &OperationCatalog,
        llm: Arc<dyn LlmClient>,
        oracle: Arc<dyn Oracle>,
        store: ContextStore,
        settings: AgentSettings,
    ) -> Self {
        let operations = catalog.for_department(department);
        let system_prompt = system_prompt(department, &operations);
        let agent = Self {
            department,
            operations,
            llm,
            correction: CorrectionLoop::new(oracle),
            memory: Mutex::new(store),
            settings,
            system_prompt,
        };

        let path = agent.context_path();
        match agent.memory.lock().await.load(&path).await {
            Ok(LoadOutcome::NotFound) => {
                info!(department = %department, "No saved context, starting fresh");
            }
            Ok(outcome) => {
                info!(department = %department, outcome = ?outcome, "Context restored");
            }
            Err(e) => {
                warn!(department = %department, path = %path.display(), error = %e, "Context load failed");
            }
        }
        info!(
            department = %department,
            operations = agent.operations.len(),
            "Agent initialized"
        );
        agent
    }

    pub fn department(&self) -> Department {
        self.department
    }

    pub fn operations(&self) -> &[Arc<dyn Operation>] {
        &self.operations
    }

    pub fn context_path(&self) -> PathBuf {
        context_path(&self.settings.context_dir, self.department)
    }

    /// Answer `query`, bounded by the configured timeout.
    ///
    /// Successful replies are remembered; failure text never is.
    pub async fn run(&self, query: &str) -> AgentReply {
        let started = Instant::now();
        let reply = match tokio::time::timeout(self.settings.timeout, self.respond(query)).await {
            Ok(reply) => reply,
            Err(_) => {
                warn!(department = %self.department, timeout = ?self.settings.timeout, "Agent timed out");
                AgentReply {
                    text: failure_text(TIMEOUT_MESSAGE),
                    context: Vec::new(),
                }
            }
        };
        info!(
            department = %self.department,
            elapsed_ms = started.elapsed().as_millis() as u64,
            failed = reply.is_failure(),
            "Agent responded"
        );

        if !reply.is_failure() {
            self.memory
                .lock()
                .await
                .store(query, &reply.text, self.department)
                .await;
        }
        reply
    }

    async fn respond(&self, query: &str) -> AgentReply {
        let context = self
            .memory
            .lock()
            .await
            .retrieve(query, self.department, self.settings.context_k)
            .await;
        let prompt = with_context(&context, query);
        debug!(department = %self.department, prompt = %prompt, "Agent input");

        let request = LlmRequest::prompt(prompt)
            .with_system(self.system_prompt.clone())
            .with_sampling(self.settings.temperature, self.settings.max_tokens);
        let text = match self.llm.complete(request).await {
            Ok(response) => self.act(&response.content).await,
            Err(e) => {
                warn!(department = %self.department, error = %e, "Model call failed");
                failure_text(format!("Agent Error: {e}"))
            }
        };
        AgentReply { text, context }
    }

    async fn act(&self, reply: &str) -> String {
        match parse_tool_choice(reply) {
            ToolChoice::Answer(answer) => answer,
            ToolChoice::Operation { name, input } => {
                let Some(operation) = self.operations.iter().find(|op| op.name() == name) else {
                    warn!(department = %self.department, operation = %name, "Model chose an unknown operation");
                    return failure_text(format!("Operation '{name}' not found"));
                };
                info!(department = %self.department, operation = %name, "Dispatching operation");
                self.correction
                    .execute(operation.as_ref(), input)
                    .await
                    .into_text()
            }
        }
    }

    pub async fn save_context(&self) -> Result<(), MemoryError> {
        let path = self.context_path();
        self.memory.lock().await.save(&path).await?;
        info!(department = %self.department, path = %path.display(), "Context saved");
        Ok(())
    }

    pub async fn clear_context(&self) {
        self.memory.lock().await.clear();
        info!(department = %self.department, "Context cleared");
    }

    pub async fn stats(&self) -> StoreStats {
        self.memory.lock().await.stats()
    }
}

/// Snapshot base path for a department; the store appends its own suffixes.
pub fn context_path(dir: &Path, department: Department) -> PathBuf {
    dir.join(format!("context_{department}"))
}

fn system_prompt(department: Department, operations: &[Arc<dyn Operation>]) -> String {
    let mut prompt = format!(
        "You are the {department} assistant of a company ERP system. \
         Answer the user's question, calling at most one operation when data is needed.\n\n\
         Available operations:\n"
    );
    for op in operations {
        let params: Vec<String> = op.params().iter().map(|p| p.signature()).collect();
        prompt.push_str(&format!("- {}({}): {}\n", op.name(), params.join(", "), op.description()));
    }
    prompt.push_str(
        "\nRespond with a single JSON object and nothing else:\n\
         {\"operation\": \"<name>\", \"input\": {\"<param>\": <value>}} to call an operation, or\n\
         {\"answer\": \"<text>\"} to reply directly.",
    );
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use erpmind_common::{FnOperation, ParamSpec, ParamType};
    use serde_json::json;

    #[test]
    fn context_path_uses_department_tag() {
        let path = context_path(Path::new("context_data"), Department::Hr);
        assert_eq!(path, PathBuf::from("context_data/context_HR"));
    }

    #[test]
    fn system_prompt_lists_signatures() {
        let op: Arc<dyn Operation> = Arc::new(FnOperation::new(
            "get_low_stock_items",
            Department::Inventory,
            "Items at or below a stock threshold.",
            vec![ParamSpec::optional("threshold", ParamType::Integer, 20)],
            |_| Ok(json!([])),
            |_| String::new(),
        ));
        let prompt = system_prompt(Department::Inventory, &[op]);
        assert!(prompt.starts_with("You are the Inventory assistant"));
        assert!(prompt.contains("- get_low_stock_items(threshold: integer = 20): Items at or below"));
        assert!(prompt.contains("{\"answer\": \"<text>\"}"));
    }
}
