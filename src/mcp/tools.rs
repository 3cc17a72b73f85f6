// MCP tools implementation using the official rmcp SDK

use std::fs;

use rmcp::{
    ErrorData as McpError,
    model::*,
    tool, tool_router,
    handler::server::tool::ToolRouter,
    handler::server::wrapper::Parameters,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use schemars::JsonSchema;
use tracing::debug;

use crate::agent::agent_prompt;
use crate::difficulty::analyze_difficulty;
use crate::error::StoreError;
use crate::fsops;
use crate::linker::{self, EntityKind, RelatedItems};
use crate::models::{
    AnswerFrontmatter, Difficulty, LessonCategory, PlanStatus, PlanTodo, Priority, ResultStatus,
    TaskFrontmatter, TaskStatus, TodoLine, TodoSpec, TodoStatus,
};
use crate::parallel::{analyze_parallel_groups, ParallelGroup};
use crate::query::{self, QueryFilter, QueryKind};
use crate::storage::StorageState;
use crate::store::{
    self, AnswerLinks, LessonUpdate, LessonView, MemoryUpdate, MemoryView, PlanDetail, PlanUpdate,
    SearchHit, TodoListing,
};

const INSTRUCTIONS: &str =
    "z-agent MCP server - manage tasks, plans, lessons, Q&A answers, and project memories in the project's .z-agent directory";

/// z-agent MCP server - provides tools for the .z-agent workflow store
#[derive(Clone)]
pub struct ZAgentServer {
    pub storage: StorageState,
    tool_router: ToolRouter<Self>,
}

impl ZAgentServer {
    pub fn new(storage: StorageState) -> Self {
        Self {
            storage,
            tool_router: Self::tool_router(),
        }
    }
}

// Implement ServerHandler - delegates tool calls to the tool_router
impl rmcp::handler::server::ServerHandler for ZAgentServer {
    fn get_info(&self) -> rmcp::model::ServerInfo {
        let mut info = rmcp::model::ServerInfo::default();
        info.instructions = Some(INSTRUCTIONS.into());
        info
    }

    fn initialize(
        &self,
        _request: rmcp::model::InitializeRequestParam,
        _context: rmcp::service::RequestContext<rmcp::service::RoleServer>,
    ) -> impl std::future::Future<Output = Result<rmcp::model::InitializeResult, McpError>> + Send + '_ {
        async move {
            debug!("initialize called");
            let mut result = rmcp::model::InitializeResult::default();
            result.capabilities.tools = Some(rmcp::model::ToolsCapability {
                list_changed: Some(false),
            });
            result.server_info.name = "z-agent".into();
            result.server_info.version = "0.1.0".into();
            result.instructions = Some(INSTRUCTIONS.into());
            Ok(result)
        }
    }

    fn list_tools(
        &self,
        _request: Option<rmcp::model::PaginatedRequestParam>,
        _context: rmcp::service::RequestContext<rmcp::service::RoleServer>,
    ) -> impl std::future::Future<Output = Result<rmcp::model::ListToolsResult, McpError>> + Send + '_ {
        async move {
            let tools = self.tool_router.list_all();
            debug!(count = tools.len(), "list_tools called");
            Ok(rmcp::model::ListToolsResult {
                tools,
                next_cursor: None,
                meta: None,
            })
        }
    }

    fn call_tool(
        &self,
        request: rmcp::model::CallToolRequestParam,
        context: rmcp::service::RequestContext<rmcp::service::RoleServer>,
    ) -> impl std::future::Future<Output = Result<CallToolResult, McpError>> + Send + '_ {
        async move {
            debug!(tool = %request.name, "call_tool");
            let tool_context = rmcp::handler::server::tool::ToolCallContext::new(self, request, context);
            self.tool_router.call(tool_context).await
        }
    }
}

// ============================================
// Tool Input Types
// ============================================

#[derive(Deserialize, JsonSchema)]
pub struct AnalyzeInput {
    pub input: String,
}

#[derive(Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskInput {
    pub description: String,
    pub todos: Option<Vec<TodoSpec>>,
}

#[derive(Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTodoInput {
    pub task_id: String,
    pub todo_index: usize,
    pub status: TodoStatus,
}

#[derive(Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TaskIdInput {
    pub task_id: String,
}

#[derive(Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TaskIdsInput {
    pub task_ids: Vec<String>,
}

#[derive(Deserialize, JsonSchema)]
pub struct SearchInput {
    pub query: String,
    pub limit: Option<usize>,
}

#[derive(Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecordLessonInput {
    pub category: LessonCategory,
    pub problem: String,
    pub solution: String,
    pub tags: Vec<String>,
    pub related_tasks: Option<Vec<String>>,
}

#[derive(Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AgentPromptInput {
    pub difficulty: Difficulty,
    pub todo_description: String,
}

#[derive(Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SaveTodoResultInput {
    pub task_id: String,
    pub todo_id: usize,
    pub status: ResultStatus,
    pub summary: String,
    pub details: String,
    pub changed_files: Option<Vec<String>>,
}

#[derive(Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct WriteFileInput {
    pub file_path: String,
    pub content: String,
}

#[derive(Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EditFileInput {
    pub file_path: String,
    pub old_string: String,
    pub new_string: String,
    pub replace_all: Option<bool>,
}

#[derive(Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReadFileInput {
    pub file_path: String,
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

#[derive(Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ListDirInput {
    pub dir_path: Option<String>,
    pub recursive: Option<bool>,
}

#[derive(Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GlobInput {
    pub pattern: String,
    pub base_path: Option<String>,
}

#[derive(Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatePlanInput {
    pub title: String,
    pub description: String,
    pub related_answers: Option<Vec<String>>,
}

#[derive(Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePlanInput {
    pub plan_id: String,
    pub status: Option<PlanStatus>,
    pub todos: Option<Vec<PlanTodo>>,
    pub content: Option<String>,
}

#[derive(Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlanIdInput {
    pub plan_id: String,
}

#[derive(Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LinkPlanTaskInput {
    pub plan_id: String,
    pub task_id: String,
}

#[derive(Deserialize, JsonSchema)]
pub struct ListTasksInput {
    pub status: Option<TaskStatus>,
}

#[derive(Deserialize, JsonSchema)]
pub struct ListLessonsInput {
    pub category: Option<LessonCategory>,
}

#[derive(Deserialize, JsonSchema)]
pub struct ListAnswersInput {
    pub keyword: Option<String>,
}

#[derive(Deserialize, JsonSchema)]
pub struct QueryInput {
    #[serde(rename = "type")]
    pub kind: Option<QueryKind>,
    pub keyword: Option<String>,
    pub status: Option<String>,
    pub category: Option<LessonCategory>,
}

#[derive(Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SaveAnswerInput {
    pub question: String,
    #[serde(rename = "answer_file_path")]
    pub answer_file_path: Option<String>,
    pub answer: Option<String>,
    pub summary: String,
    pub related_lessons: Option<Vec<String>>,
    pub related_files: Option<Vec<String>>,
    pub related_plans: Option<Vec<String>>,
    pub related_tasks: Option<Vec<String>>,
}

#[derive(Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnswerIdInput {
    pub answer_id: String,
}

#[derive(Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LinkAnswerPlanInput {
    pub answer_id: String,
    pub plan_id: String,
}

#[derive(Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LinkAnswerTaskInput {
    pub answer_id: String,
    pub task_id: String,
}

#[derive(Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GetRelatedInput {
    pub entity_type: EntityKind,
    pub entity_id: String,
}

#[derive(Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeletePlanInput {
    pub plan_id: String,
    pub delete_linked_tasks: Option<bool>,
}

#[derive(Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LessonIdInput {
    pub lesson_id: String,
}

#[derive(Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLessonInput {
    pub lesson_id: String,
    pub category: Option<LessonCategory>,
    pub problem: Option<String>,
    pub solution: Option<String>,
    pub conditions: Option<String>,
    pub warnings: Option<String>,
    pub tags: Option<Vec<String>>,
    pub related_tasks: Option<Vec<String>>,
}

#[derive(Deserialize, JsonSchema)]
pub struct AddMemoryInput {
    pub content: String,
    pub tags: Option<Vec<String>>,
    pub priority: Option<Priority>,
}

#[derive(Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MemoryIdInput {
    pub memory_id: String,
}

#[derive(Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMemoryInput {
    pub memory_id: String,
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
    pub priority: Option<Priority>,
}

#[derive(Deserialize, JsonSchema)]
pub struct TasksByStatusInput {
    pub status: Option<TaskStatusFilter>,
}

#[derive(Deserialize, JsonSchema)]
pub struct PlansByStatusInput {
    pub status: Option<PlanStatusFilter>,
}

#[derive(Deserialize, JsonSchema)]
pub struct CleanupPreviewInput {
    pub target: CleanupTarget,
}

#[derive(Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ParallelPromptInput {
    pub task_id: String,
    pub todo_indexes: Vec<usize>,
}

/// Task status filter; `all` turns filtering off
#[derive(Clone, Copy, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatusFilter {
    All,
    Pending,
    InProgress,
    Completed,
    Cancelled,
    Blocked,
}

impl TaskStatusFilter {
    fn as_status(self) -> Option<TaskStatus> {
        match self {
            Self::All => None,
            Self::Pending => Some(TaskStatus::Pending),
            Self::InProgress => Some(TaskStatus::InProgress),
            Self::Completed => Some(TaskStatus::Completed),
            Self::Cancelled => Some(TaskStatus::Cancelled),
            Self::Blocked => Some(TaskStatus::Blocked),
        }
    }

    fn label(self) -> &'static str {
        match self.as_status() {
            None => "all",
            Some(status) => status.label(),
        }
    }
}

/// Plan status filter; `all` turns filtering off
#[derive(Clone, Copy, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatusFilter {
    All,
    Draft,
    Ready,
    InProgress,
    Completed,
    Cancelled,
}

impl PlanStatusFilter {
    fn as_status(self) -> Option<PlanStatus> {
        match self {
            Self::All => None,
            Self::Draft => Some(PlanStatus::Draft),
            Self::Ready => Some(PlanStatus::Ready),
            Self::InProgress => Some(PlanStatus::InProgress),
            Self::Completed => Some(PlanStatus::Completed),
            Self::Cancelled => Some(PlanStatus::Cancelled),
        }
    }

    fn label(self) -> &'static str {
        match self.as_status() {
            None => "all",
            Some(status) => status.label(),
        }
    }
}

/// What z_cleanup_preview should inspect
#[derive(Clone, Copy, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CleanupTarget {
    CompletedTasks,
    CompletedPlans,
    AllCompleted,
}

impl CleanupTarget {
    fn label(self) -> &'static str {
        match self {
            Self::CompletedTasks => "completed_tasks",
            Self::CompletedPlans => "completed_plans",
            Self::AllCompleted => "all_completed",
        }
    }

    fn includes_tasks(self) -> bool {
        matches!(self, Self::CompletedTasks | Self::AllCompleted)
    }

    fn includes_plans(self) -> bool {
        matches!(self, Self::CompletedPlans | Self::AllCompleted)
    }
}

// ============================================
// Tool Response Types
// ============================================
// Field order here is the JSON key order on the wire, so callers see the
// identifiers first and the free-text message last.

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateTaskResponse {
    task_id: String,
    file_path: String,
    difficulty: Difficulty,
    suggested_model: &'static str,
    todo_count: usize,
    related_lessons: Vec<String>,
    parallel_groups: Vec<ParallelGroup>,
    has_parallel_opportunity: bool,
    message: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TaskBatchEntry {
    task_id: String,
    task: Option<TaskFrontmatter>,
    todos: Vec<TodoLine>,
    todo_progress: String,
}

#[derive(Serialize)]
struct TaskBatchResponse {
    count: usize,
    tasks: Vec<TaskBatchEntry>,
}

#[derive(Serialize)]
struct LessonSearchResponse {
    query: String,
    count: usize,
    lessons: Vec<SearchHit>,
}

#[derive(Serialize)]
struct AgentPromptResponse {
    difficulty: Difficulty,
    model: &'static str,
    prompt: String,
    usage: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PlanCreatedResponse {
    plan_id: String,
    file_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    related_answers: Option<Vec<String>>,
    message: String,
}

#[derive(Serialize)]
struct PlanViewResponse {
    plan: PlanDetail,
    content: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AnswerViewResponse {
    answer: AnswerFrontmatter,
    related_items: RelatedItems,
    content: String,
}

#[derive(Serialize)]
struct LessonEnvelope {
    found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    lesson: Option<LessonView>,
}

#[derive(Serialize)]
struct MemoryEnvelope {
    found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    memory: Option<MemoryView>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MemoryPreview {
    memory_id: String,
    priority: Priority,
    tags: Vec<String>,
    content_preview: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    updated_at: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
struct MemoryListResponse {
    count: usize,
    memories: Vec<MemoryPreview>,
}

#[derive(Serialize)]
struct MemorySearchResponse {
    query: String,
    count: usize,
    memories: Vec<MemoryPreview>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ParallelGroupsResponse {
    task_id: String,
    todo_count: usize,
    parallel_groups: Vec<ParallelGroup>,
    unreachable: Vec<usize>,
    has_parallel_opportunity: bool,
    instruction: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ParallelPromptEntry {
    todo_index: usize,
    description: String,
    difficulty: Difficulty,
    model: &'static str,
    prompt: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ParallelPromptResponse {
    task_id: String,
    parallel_count: usize,
    prompts: Vec<ParallelPromptEntry>,
    instruction: String,
    warning: &'static str,
    how_to: &'static str,
}

// ============================================
// Helpers
// ============================================

fn success_text(message: impl Into<String>) -> CallToolResult {
    CallToolResult::success(vec![Content::text(message.into())])
}

fn error_text(message: impl Into<String>) -> CallToolResult {
    CallToolResult::error(vec![Content::text(message.into())])
}

// The message is the whole payload; the flag decides isError
fn outcome(success: bool, message: String) -> CallToolResult {
    if success {
        success_text(message)
    } else {
        error_text(message)
    }
}

// Storage failures surface as error-flagged text on the tool channel,
// never as protocol errors
fn store_error(err: StoreError) -> CallToolResult {
    error_text(format!("Error: {err}"))
}

fn pretty_json<T: Serialize>(value: &T) -> CallToolResult {
    success_text(serde_json::to_string_pretty(value).unwrap_or_else(|_| "null".to_string()))
}

/// First `max` characters, with an ellipsis when something was cut
fn clip(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let head: String = text.chars().take(max).collect();
        format!("{head}...")
    } else {
        text.to_string()
    }
}

/// First `max` characters, nothing appended
fn truncate(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

fn bullet_list(ids: &[String]) -> String {
    ids.iter()
        .map(|id| format!("- {id}"))
        .collect::<Vec<_>>()
        .join("\n")
}

// ============================================
// Tools
// ============================================

#[tool_router]
impl ZAgentServer {
    // --- Difficulty ---

    #[tool(description = "Analyze the difficulty of a request, classify it as H (High), M (Medium), or L (Low), and recommend a model tier.")]
    async fn z_analyze_difficulty(&self, input: Parameters<AnalyzeInput>) -> Result<CallToolResult, McpError> {
        if let Err(e) = self.storage.ensure_directories() {
            return Ok(store_error(e));
        }
        Ok(pretty_json(&analyze_difficulty(&input.0.input)))
    }

    // --- Tasks ---

    #[tool(description = "Create a new task. Difficulty analysis and the TODO list are generated automatically. Provide targetFiles and dependsOn per todo to enable parallel-group analysis.")]
    async fn z_create_task(&self, input: Parameters<CreateTaskInput>) -> Result<CallToolResult, McpError> {
        if let Err(e) = self.storage.ensure_directories() {
            return Ok(store_error(e));
        }
        let CreateTaskInput { description, todos } = input.0;
        let created = match store::create_task(&self.storage, &description, todos) {
            Ok(created) => created,
            Err(e) => return Ok(store_error(e)),
        };
        let has_parallel = created.analysis.has_parallel_opportunity();
        let message = if has_parallel {
            format!(
                "Task {} created. Parallel-capable groups found. Run them in parallel with z_get_parallel_prompt.",
                created.task_id
            )
        } else {
            format!(
                "Task {} created. Difficulty: {}, suggested model: {}",
                created.task_id,
                created.difficulty.label(),
                created.suggested_model
            )
        };
        Ok(pretty_json(&CreateTaskResponse {
            task_id: created.task_id,
            file_path: created.file_path.display().to_string(),
            difficulty: created.difficulty,
            suggested_model: created.suggested_model,
            todo_count: created.todo_count,
            related_lessons: created.related_lessons,
            parallel_groups: created.analysis.groups,
            has_parallel_opportunity: has_parallel,
            message,
        }))
    }

    #[tool(description = "Update the status of one TODO item of a task.")]
    async fn z_update_todo(&self, input: Parameters<UpdateTodoInput>) -> Result<CallToolResult, McpError> {
        if let Err(e) = self.storage.ensure_directories() {
            return Ok(store_error(e));
        }
        let UpdateTodoInput { task_id, todo_index, status } = input.0;
        match store::update_todo(&self.storage, &task_id, todo_index, status) {
            Ok(true) => Ok(success_text(format!(
                "TODO #{todo_index} status updated to {}",
                status.label()
            ))),
            Ok(false) => Ok(success_text(format!(
                "TODO update failed: Task {task_id} or TODO #{todo_index} not found"
            ))),
            Err(e) => Ok(store_error(e)),
        }
    }

    #[tool(description = "Get the current status and TODO list of a task.")]
    async fn z_get_task_status(&self, input: Parameters<TaskIdInput>) -> Result<CallToolResult, McpError> {
        if let Err(e) = self.storage.ensure_directories() {
            return Ok(store_error(e));
        }
        match store::get_task_status(&self.storage, &input.0.task_id) {
            Ok(detail) => Ok(pretty_json(&detail)),
            Err(e) => Ok(store_error(e)),
        }
    }

    #[tool(description = "Get the status of several tasks at once, including each task's TODO progress.")]
    async fn z_get_tasks_batch(&self, input: Parameters<TaskIdsInput>) -> Result<CallToolResult, McpError> {
        if let Err(e) = self.storage.ensure_directories() {
            return Ok(store_error(e));
        }
        let mut tasks = Vec::new();
        for task_id in &input.0.task_ids {
            let detail = match store::get_task_status(&self.storage, task_id) {
                Ok(detail) => detail,
                Err(e) => return Ok(store_error(e)),
            };
            let total = detail.todos.len();
            let completed = detail
                .todos
                .iter()
                .filter(|todo| todo.status == TodoStatus::Complete)
                .count();
            tasks.push(TaskBatchEntry {
                task_id: task_id.clone(),
                task: detail.task,
                todos: detail.todos,
                todo_progress: format!("{completed}/{total}"),
            });
        }
        Ok(pretty_json(&TaskBatchResponse {
            count: tasks.len(),
            tasks,
        }))
    }

    // --- Lessons ---

    #[tool(description = "Search recorded lessons learned.")]
    async fn z_search_lessons(&self, input: Parameters<SearchInput>) -> Result<CallToolResult, McpError> {
        if let Err(e) = self.storage.ensure_directories() {
            return Ok(store_error(e));
        }
        let SearchInput { query, limit } = input.0;
        let limit = limit.filter(|&l| l > 0).unwrap_or(5);
        match store::search_lessons(&self.storage, &query, limit) {
            Ok(lessons) => Ok(pretty_json(&LessonSearchResponse {
                query,
                count: lessons.len(),
                lessons,
            })),
            Err(e) => Ok(store_error(e)),
        }
    }

    #[tool(description = "Record a new lesson.")]
    async fn z_record_lesson(&self, input: Parameters<RecordLessonInput>) -> Result<CallToolResult, McpError> {
        if let Err(e) = self.storage.ensure_directories() {
            return Ok(store_error(e));
        }
        let RecordLessonInput { category, problem, solution, tags, related_tasks } = input.0;
        match store::record_lesson(
            &self.storage,
            category,
            &problem,
            &solution,
            tags,
            related_tasks.unwrap_or_default(),
        ) {
            Ok(lesson_id) => Ok(success_text(format!("Lesson {lesson_id} recorded"))),
            Err(e) => Ok(store_error(e)),
        }
    }

    // --- Agent prompts ---

    #[tool(description = "Return the agent prompt for a difficulty level. Use it to delegate the work to the right model via the Task tool.")]
    async fn z_get_agent_prompt(&self, input: Parameters<AgentPromptInput>) -> Result<CallToolResult, McpError> {
        if let Err(e) = self.storage.ensure_directories() {
            return Ok(store_error(e));
        }
        let AgentPromptInput { difficulty, todo_description } = input.0;
        let model = difficulty.suggested_model();
        Ok(pretty_json(&AgentPromptResponse {
            difficulty,
            model,
            prompt: agent_prompt(difficulty, &todo_description),
            usage: format!(
                "Delegate this work via the Task tool with model: \"{model}\" and this prompt."
            ),
        }))
    }

    // --- Todo results ---

    #[tool(description = "Save the result of a finished TODO to its detail file and update the checklist.")]
    async fn z_save_todo_result(&self, input: Parameters<SaveTodoResultInput>) -> Result<CallToolResult, McpError> {
        if let Err(e) = self.storage.ensure_directories() {
            return Ok(store_error(e));
        }
        let SaveTodoResultInput { task_id, todo_id, status, summary, details, changed_files } = input.0;
        let path = match store::save_todo_result(
            &self.storage,
            &task_id,
            todo_id,
            status,
            &summary,
            &details,
            changed_files.unwrap_or_default(),
        ) {
            Ok(path) => path,
            Err(e) => return Ok(store_error(e)),
        };
        if let Err(e) = store::set_result_status(&self.storage, &task_id, todo_id, status) {
            return Ok(store_error(e));
        }
        Ok(success_text(format!("Result saved: {}", path.display())))
    }

    #[tool(description = "Generate the final summary after a task completes. Returns only a compact summary to keep session context small.")]
    async fn z_generate_summary(&self, input: Parameters<TaskIdInput>) -> Result<CallToolResult, McpError> {
        if let Err(e) = self.storage.ensure_directories() {
            return Ok(store_error(e));
        }
        match store::generate_task_summary(&self.storage, &input.0.task_id) {
            Ok(summary) => Ok(success_text(summary)),
            Err(e) => Ok(store_error(e)),
        }
    }

    // --- Project files ---

    #[tool(description = "Create a file. Only a short result message is returned, keeping file content out of context.")]
    async fn z_write_file(&self, input: Parameters<WriteFileInput>) -> Result<CallToolResult, McpError> {
        if let Err(e) = self.storage.ensure_directories() {
            return Ok(store_error(e));
        }
        let result = fsops::write_file(&self.storage, &input.0.file_path, &input.0.content);
        Ok(outcome(result.success, result.message))
    }

    #[tool(description = "Edit part of a file by exact string replacement. Only a short result message is returned.")]
    async fn z_edit_file(&self, input: Parameters<EditFileInput>) -> Result<CallToolResult, McpError> {
        if let Err(e) = self.storage.ensure_directories() {
            return Ok(store_error(e));
        }
        let EditFileInput { file_path, old_string, new_string, replace_all } = input.0;
        let result = fsops::edit_file(
            &self.storage,
            &file_path,
            &old_string,
            &new_string,
            replace_all.unwrap_or(false),
        );
        Ok(outcome(result.success, result.message))
    }

    #[tool(description = "Read file content, optionally a line range. Meant for sub-agents analyzing files.")]
    async fn z_read_file(&self, input: Parameters<ReadFileInput>) -> Result<CallToolResult, McpError> {
        if let Err(e) = self.storage.ensure_directories() {
            return Ok(store_error(e));
        }
        let ReadFileInput { file_path, offset, limit } = input.0;
        let result = fsops::read_file(&self.storage, &file_path, offset, limit);
        let body = if result.success { result.content } else { result.message };
        Ok(outcome(result.success, body))
    }

    #[tool(description = "List directory contents. System folders such as .git, node_modules, .z-agent, and .claude are excluded automatically.")]
    async fn z_list_dir(&self, input: Parameters<ListDirInput>) -> Result<CallToolResult, McpError> {
        if let Err(e) = self.storage.ensure_directories() {
            return Ok(store_error(e));
        }
        let ListDirInput { dir_path, recursive } = input.0;
        let dir_path = dir_path.as_deref().filter(|p| !p.is_empty()).unwrap_or(".");
        let result = fsops::list_dir(&self.storage, dir_path, recursive.unwrap_or(false));
        let body = if result.success {
            result.entries.join("\n")
        } else {
            result.message
        };
        Ok(outcome(result.success, body))
    }

    #[tool(description = "Find files by pattern. Supports **, *, and ? wildcards. System folders are excluded automatically.")]
    async fn z_glob(&self, input: Parameters<GlobInput>) -> Result<CallToolResult, McpError> {
        if let Err(e) = self.storage.ensure_directories() {
            return Ok(store_error(e));
        }
        let GlobInput { pattern, base_path } = input.0;
        let result = fsops::glob_files(&self.storage, &pattern, base_path.as_deref());
        let body = if result.success {
            result.entries.join("\n")
        } else {
            result.message
        };
        Ok(outcome(result.success, body))
    }

    // --- Plans ---

    #[tool(description = "Create a new plan. Answers can be referenced while drafting it; referenced answers are linked back to the plan.")]
    async fn z_create_plan(&self, input: Parameters<CreatePlanInput>) -> Result<CallToolResult, McpError> {
        if let Err(e) = self.storage.ensure_directories() {
            return Ok(store_error(e));
        }
        let CreatePlanInput { title, description, related_answers } = input.0;
        let created = match store::create_plan(
            &self.storage,
            &title,
            &description,
            related_answers.unwrap_or_default(),
        ) {
            Ok(created) => created,
            Err(e) => return Ok(store_error(e)),
        };
        for answer_id in &created.related_answers {
            if let Err(e) = linker::link_answer_to_plan(&self.storage, answer_id, &created.plan_id) {
                return Ok(store_error(e));
            }
        }
        let message = if created.related_answers.is_empty() {
            format!("✅ {} created", created.plan_id)
        } else {
            format!(
                "✅ {} created ({} referenced)",
                created.plan_id,
                created.related_answers.join(", ")
            )
        };
        Ok(pretty_json(&PlanCreatedResponse {
            plan_id: created.plan_id,
            file_path: created.file_path.display().to_string(),
            related_answers: (!created.related_answers.is_empty()).then_some(created.related_answers),
            message,
        }))
    }

    #[tool(description = "Update a plan's status, TODO list, or body content.")]
    async fn z_update_plan(&self, input: Parameters<UpdatePlanInput>) -> Result<CallToolResult, McpError> {
        if let Err(e) = self.storage.ensure_directories() {
            return Ok(store_error(e));
        }
        let UpdatePlanInput { plan_id, status, todos, content } = input.0;
        match store::update_plan(&self.storage, &plan_id, PlanUpdate { status, todos, content }) {
            Ok(true) => Ok(success_text(format!("✅ {plan_id} updated"))),
            Ok(false) => Ok(error_text(format!("❌ {plan_id} update failed"))),
            Err(e) => Ok(store_error(e)),
        }
    }

    #[tool(description = "Get a plan's parsed frontmatter, TODO list, and raw content.")]
    async fn z_get_plan(&self, input: Parameters<PlanIdInput>) -> Result<CallToolResult, McpError> {
        if let Err(e) = self.storage.ensure_directories() {
            return Ok(store_error(e));
        }
        match store::get_plan(&self.storage, &input.0.plan_id) {
            Ok(Some((plan, content))) => Ok(pretty_json(&PlanViewResponse { plan, content })),
            Ok(None) => Ok(error_text(format!("❌ Plan not found: {}", input.0.plan_id))),
            Err(e) => Ok(store_error(e)),
        }
    }

    #[tool(description = "List all plans.")]
    async fn z_list_plans(&self) -> Result<CallToolResult, McpError> {
        if let Err(e) = self.storage.ensure_directories() {
            return Ok(store_error(e));
        }
        let plans = match store::list_plans(&self.storage) {
            Ok(plans) => plans,
            Err(e) => return Ok(store_error(e)),
        };
        if plans.is_empty() {
            return Ok(success_text("No plans recorded."));
        }
        let lines: Vec<String> = plans
            .iter()
            .map(|p| {
                format!(
                    "{}: {} [{}] ({})",
                    p.plan_id,
                    p.title,
                    p.status.label(),
                    p.difficulty.label()
                )
            })
            .collect();
        Ok(success_text(lines.join("\n")))
    }

    #[tool(description = "Link a plan to a task. Called when a task is created from a plan.")]
    async fn z_link_plan_to_task(&self, input: Parameters<LinkPlanTaskInput>) -> Result<CallToolResult, McpError> {
        if let Err(e) = self.storage.ensure_directories() {
            return Ok(store_error(e));
        }
        let LinkPlanTaskInput { plan_id, task_id } = input.0;
        match linker::link_plan_to_task(&self.storage, &plan_id, &task_id) {
            Ok(true) => Ok(success_text(format!("✅ {plan_id} ↔ {task_id} linked"))),
            Ok(false) => Ok(error_text(format!("❌ Link failed: {plan_id}"))),
            Err(e) => Ok(store_error(e)),
        }
    }

    // --- Listings ---

    #[tool(description = "List all tasks as a markdown table, optionally filtered by status.")]
    async fn z_list_tasks(&self, input: Parameters<ListTasksInput>) -> Result<CallToolResult, McpError> {
        if let Err(e) = self.storage.ensure_directories() {
            return Ok(store_error(e));
        }
        let status = input.0.status;
        let tasks = match query::list_tasks(&self.storage, status) {
            Ok(tasks) => tasks,
            Err(e) => return Ok(store_error(e)),
        };
        if tasks.is_empty() {
            return Ok(success_text(match status {
                Some(s) => format!("No tasks with status {}.", s.label()),
                None => "No tasks recorded.".to_string(),
            }));
        }
        let mut header = format!("## Tasks ({})", tasks.len());
        if let Some(s) = status {
            header.push_str(&format!(" - {}", s.label()));
        }
        header.push_str("\n\n");
        let rows: Vec<String> = tasks
            .iter()
            .map(|t| {
                let mut row = format!(
                    "| {} | {} | {} {} | {} | {} |",
                    t.task_id,
                    clip(&t.task_desc, 30),
                    t.status.glyph(),
                    t.status.label(),
                    t.difficulty.label(),
                    t.todo_progress
                );
                if let Some(current) = &t.current_todo {
                    row.push_str(&format!(" {}...", truncate(current, 20)));
                }
                row
            })
            .collect();
        Ok(success_text(format!(
            "{header}| ID | Description | Status | Difficulty | Progress |\n|---|---|---|---|---|\n{}",
            rows.join("\n")
        )))
    }

    #[tool(description = "List all lessons as a markdown table, optionally filtered by category.")]
    async fn z_list_lessons(&self, input: Parameters<ListLessonsInput>) -> Result<CallToolResult, McpError> {
        if let Err(e) = self.storage.ensure_directories() {
            return Ok(store_error(e));
        }
        let category = input.0.category;
        let lessons = match query::list_lessons(&self.storage, category) {
            Ok(lessons) => lessons,
            Err(e) => return Ok(store_error(e)),
        };
        if lessons.is_empty() {
            return Ok(success_text(match category {
                Some(c) => format!("No lessons in category {}.", c.label()),
                None => "No lessons recorded.".to_string(),
            }));
        }
        let mut header = format!("## Lessons ({})", lessons.len());
        if let Some(c) = category {
            header.push_str(&format!(" - {}", c.label()));
        }
        header.push_str("\n\n");
        let rows: Vec<String> = lessons
            .iter()
            .map(|l| {
                let tags = l.tags.iter().take(3).cloned().collect::<Vec<_>>().join(", ");
                format!(
                    "| {} | {} | [{}] | {} |",
                    l.lesson_id,
                    l.category.label(),
                    tags,
                    clip(&l.summary, 40)
                )
            })
            .collect();
        Ok(success_text(format!(
            "{header}| ID | Category | Tags | Summary |\n|---|---|---|---|\n{}",
            rows.join("\n")
        )))
    }

    #[tool(description = "List saved Q&A answers as a markdown table, optionally filtered by keyword.")]
    async fn z_list_answers(&self, input: Parameters<ListAnswersInput>) -> Result<CallToolResult, McpError> {
        if let Err(e) = self.storage.ensure_directories() {
            return Ok(store_error(e));
        }
        let keyword = input.0.keyword;
        let answers = match query::list_answers(&self.storage, keyword.as_deref()) {
            Ok(answers) => answers,
            Err(e) => return Ok(store_error(e)),
        };
        if answers.is_empty() {
            return Ok(success_text(match &keyword {
                Some(k) => format!("No results for \"{k}\"."),
                None => "No Q&A answers saved.".to_string(),
            }));
        }
        let mut header = format!("## Q&A Answers ({})", answers.len());
        if let Some(k) = &keyword {
            header.push_str(&format!(" - \"{k}\" search"));
        }
        header.push_str("\n\n");
        let rows: Vec<String> = answers
            .iter()
            .map(|a| {
                format!(
                    "| {} | {} | {} |",
                    a.answer_id,
                    clip(&a.question, 40),
                    clip(&a.summary, 40)
                )
            })
            .collect();
        Ok(success_text(format!(
            "{header}| ID | Question | Summary |\n|---|---|---|\n{}",
            rows.join("\n")
        )))
    }

    #[tool(description = "Query tasks, plans, lessons, and answers in one call, with a per-kind summary.")]
    async fn z_query(&self, input: Parameters<QueryInput>) -> Result<CallToolResult, McpError> {
        if let Err(e) = self.storage.ensure_directories() {
            return Ok(store_error(e));
        }
        let QueryInput { kind, keyword, status, category } = input.0;
        let filter = QueryFilter {
            kind: kind.unwrap_or_default(),
            keyword,
            status,
            category,
        };
        let report = match query::query_all(&self.storage, &filter) {
            Ok(report) => report,
            Err(e) => return Ok(store_error(e)),
        };

        let mut output = String::from("## Query Results\n\n### Summary\n");
        output.push_str(&format!("- Tasks: {}", report.summary.task_count));
        if let Some(by_status) = &report.summary.tasks_by_status {
            let parts: Vec<String> = by_status.iter().map(|(s, c)| format!("{s}: {c}")).collect();
            output.push_str(&format!(" ({})", parts.join(", ")));
        }
        output.push('\n');
        output.push_str(&format!("- Plans: {}", report.summary.plan_count));
        if let Some(by_status) = &report.summary.plans_by_status {
            let parts: Vec<String> = by_status.iter().map(|(s, c)| format!("{s}: {c}")).collect();
            output.push_str(&format!(" ({})", parts.join(", ")));
        }
        output.push('\n');
        output.push_str(&format!("- Lessons: {}\n", report.summary.lesson_count));
        output.push_str(&format!("- Answers: {}\n\n", report.summary.answer_count));

        if let Some(tasks) = &report.tasks {
            if !tasks.is_empty() {
                output.push_str("### Tasks\n");
                for t in tasks.iter().take(10) {
                    output.push_str(&format!(
                        "- {}: {} [{} {}] {}\n",
                        t.task_id,
                        truncate(&t.task_desc, 40),
                        t.status.glyph(),
                        t.status.label(),
                        t.todo_progress
                    ));
                }
                if tasks.len() > 10 {
                    output.push_str(&format!("  ... {} more\n", tasks.len() - 10));
                }
                output.push('\n');
            }
        }
        if let Some(plans) = &report.plans {
            if !plans.is_empty() {
                output.push_str("### Plans\n");
                for p in plans.iter().take(10) {
                    output.push_str(&format!(
                        "- {}: {} [{}] ({})\n",
                        p.plan_id,
                        p.title,
                        p.status.label(),
                        p.difficulty.label()
                    ));
                }
                if plans.len() > 10 {
                    output.push_str(&format!("  ... {} more\n", plans.len() - 10));
                }
                output.push('\n');
            }
        }
        if let Some(lessons) = &report.lessons {
            if !lessons.is_empty() {
                output.push_str("### Lessons\n");
                for l in lessons.iter().take(10) {
                    output.push_str(&format!(
                        "- {}: [{}] {}\n",
                        l.lesson_id,
                        l.category.label(),
                        truncate(&l.summary, 40)
                    ));
                }
                if lessons.len() > 10 {
                    output.push_str(&format!("  ... {} more\n", lessons.len() - 10));
                }
                output.push('\n');
            }
        }
        if let Some(answers) = &report.answers {
            if !answers.is_empty() {
                output.push_str("### Q&A Answers\n");
                for a in answers.iter().take(10) {
                    output.push_str(&format!(
                        "- {}: {}... → {}\n",
                        a.answer_id,
                        truncate(&a.question, 30),
                        truncate(&a.summary, 30)
                    ));
                }
                if answers.len() > 10 {
                    output.push_str(&format!("  ... {} more\n", answers.len() - 10));
                }
            }
        }
        Ok(success_text(output))
    }

    // --- Answers ---

    #[tool(description = "Save an answer to a question and return only its summary. To save context, prefer answer_file_path - write the answer to .z-agent/temp/answer_draft.md first and pass the file path.")]
    async fn z_save_answer(&self, input: Parameters<SaveAnswerInput>) -> Result<CallToolResult, McpError> {
        if let Err(e) = self.storage.ensure_directories() {
            return Ok(store_error(e));
        }
        let SaveAnswerInput {
            question,
            answer_file_path,
            answer,
            summary,
            related_lessons,
            related_files,
            related_plans,
            related_tasks,
        } = input.0;
        let answer_content = match &answer_file_path {
            Some(path) => match fs::read_to_string(self.storage.resolve(path)) {
                Ok(content) => content,
                Err(_) => return Ok(success_text(format!("❌ Could not read file: {path}"))),
            },
            None => match answer {
                Some(answer) => answer,
                None => return Ok(success_text("❌ answer or answer_file_path is required.")),
            },
        };
        let links = AnswerLinks {
            lessons: related_lessons.unwrap_or_default(),
            files: related_files.unwrap_or_default(),
            plans: related_plans.unwrap_or_default(),
            tasks: related_tasks.unwrap_or_default(),
        };
        let saved = match store::save_answer(&self.storage, &question, &answer_content, &summary, links) {
            Ok(saved) => saved,
            Err(e) => return Ok(store_error(e)),
        };
        // Drop the draft file once its content is stored; failures are fine
        if let Some(path) = &answer_file_path {
            let _ = fs::remove_file(self.storage.resolve(path));
        }
        Ok(success_text(format!("✅ {} saved\n📝 {}", saved.answer_id, saved.summary)))
    }

    #[tool(description = "Get the full content of an answer, including its related plan, task, and lesson references.")]
    async fn z_get_answer(&self, input: Parameters<AnswerIdInput>) -> Result<CallToolResult, McpError> {
        if let Err(e) = self.storage.ensure_directories() {
            return Ok(store_error(e));
        }
        let answer_id = input.0.answer_id;
        let detail = match store::get_answer(&self.storage, &answer_id) {
            Ok(Some(detail)) => detail,
            Ok(None) => return Ok(error_text(format!("❌ Answer not found: {answer_id}"))),
            Err(e) => return Ok(store_error(e)),
        };
        let related = match linker::get_related_items(&self.storage, EntityKind::Answer, &answer_id) {
            Ok(related) => related.unwrap_or_default(),
            Err(e) => return Ok(store_error(e)),
        };
        Ok(pretty_json(&AnswerViewResponse {
            answer: detail.answer,
            related_items: related,
            content: detail.content,
        }))
    }

    #[tool(description = "Link an answer and a plan bidirectionally.")]
    async fn z_link_answer_to_plan(&self, input: Parameters<LinkAnswerPlanInput>) -> Result<CallToolResult, McpError> {
        if let Err(e) = self.storage.ensure_directories() {
            return Ok(store_error(e));
        }
        let LinkAnswerPlanInput { answer_id, plan_id } = input.0;
        match linker::link_answer_to_plan(&self.storage, &answer_id, &plan_id) {
            Ok(true) => Ok(success_text(format!("✅ {answer_id} ↔ {plan_id} linked"))),
            Ok(false) => Ok(error_text(format!(
                "❌ Link failed: {answer_id} or {plan_id} not found"
            ))),
            Err(e) => Ok(store_error(e)),
        }
    }

    #[tool(description = "Link an answer and a task bidirectionally.")]
    async fn z_link_answer_to_task(&self, input: Parameters<LinkAnswerTaskInput>) -> Result<CallToolResult, McpError> {
        if let Err(e) = self.storage.ensure_directories() {
            return Ok(store_error(e));
        }
        let LinkAnswerTaskInput { answer_id, task_id } = input.0;
        match linker::link_answer_to_task(&self.storage, &answer_id, &task_id) {
            Ok(true) => Ok(success_text(format!("✅ {answer_id} ↔ {task_id} linked"))),
            Ok(false) => Ok(error_text(format!(
                "❌ Link failed: {answer_id} or {task_id} not found"
            ))),
            Err(e) => Ok(store_error(e)),
        }
    }

    #[tool(description = "Get every item linked to an entity (answer, plan, or task).")]
    async fn z_get_related(&self, input: Parameters<GetRelatedInput>) -> Result<CallToolResult, McpError> {
        if let Err(e) = self.storage.ensure_directories() {
            return Ok(store_error(e));
        }
        let GetRelatedInput { entity_type, entity_id } = input.0;
        let related = match linker::get_related_items(&self.storage, entity_type, &entity_id) {
            Ok(related) => related.unwrap_or_default(),
            Err(e) => return Ok(store_error(e)),
        };
        let mut output = format!("## Related items for {entity_id}\n\n");
        if !related.answers.is_empty() {
            output.push_str(&format!("### Linked Answers\n{}\n\n", bullet_list(&related.answers)));
        }
        if !related.plans.is_empty() {
            output.push_str(&format!("### Linked Plans\n{}\n\n", bullet_list(&related.plans)));
        }
        if !related.tasks.is_empty() {
            output.push_str(&format!("### Linked Tasks\n{}\n\n", bullet_list(&related.tasks)));
        }
        if !related.lessons.is_empty() {
            output.push_str(&format!("### Linked Lessons\n{}\n\n", bullet_list(&related.lessons)));
        }
        if related.answers.is_empty()
            && related.plans.is_empty()
            && related.tasks.is_empty()
            && related.lessons.is_empty()
        {
            output.push_str("No linked items\n");
        }
        Ok(success_text(output))
    }

    // --- Deletion ---

    #[tool(description = "Delete a task and its TODO detail files.")]
    async fn z_delete_task(&self, input: Parameters<TaskIdInput>) -> Result<CallToolResult, McpError> {
        if let Err(e) = self.storage.ensure_directories() {
            return Ok(store_error(e));
        }
        match store::delete_task(&self.storage, &input.0.task_id) {
            Ok(result) => Ok(pretty_json(&result)),
            Err(e) => Ok(store_error(e)),
        }
    }

    #[tool(description = "Delete a plan, optionally together with its linked tasks.")]
    async fn z_delete_plan(&self, input: Parameters<DeletePlanInput>) -> Result<CallToolResult, McpError> {
        if let Err(e) = self.storage.ensure_directories() {
            return Ok(store_error(e));
        }
        let DeletePlanInput { plan_id, delete_linked_tasks } = input.0;
        match store::delete_plan_with_tasks(&self.storage, &plan_id, delete_linked_tasks.unwrap_or(false)) {
            Ok(result) => Ok(pretty_json(&result)),
            Err(e) => Ok(store_error(e)),
        }
    }

    #[tool(description = "Delete an answer.")]
    async fn z_delete_answer(&self, input: Parameters<AnswerIdInput>) -> Result<CallToolResult, McpError> {
        if let Err(e) = self.storage.ensure_directories() {
            return Ok(store_error(e));
        }
        match store::delete_answer(&self.storage, &input.0.answer_id) {
            Ok(result) => Ok(pretty_json(&result)),
            Err(e) => Ok(store_error(e)),
        }
    }

    #[tool(description = "Delete a lesson.")]
    async fn z_delete_lesson(&self, input: Parameters<LessonIdInput>) -> Result<CallToolResult, McpError> {
        if let Err(e) = self.storage.ensure_directories() {
            return Ok(store_error(e));
        }
        match store::delete_lesson(&self.storage, &input.0.lesson_id) {
            Ok(result) => Ok(pretty_json(&result)),
            Err(e) => Ok(store_error(e)),
        }
    }

    // --- Lesson CRUD ---

    #[tool(description = "Get the full content of a lesson.")]
    async fn z_get_lesson(&self, input: Parameters<LessonIdInput>) -> Result<CallToolResult, McpError> {
        if let Err(e) = self.storage.ensure_directories() {
            return Ok(store_error(e));
        }
        match store::get_lesson(&self.storage, &input.0.lesson_id) {
            Ok(lesson) => Ok(pretty_json(&LessonEnvelope {
                found: lesson.is_some(),
                lesson,
            })),
            Err(e) => Ok(store_error(e)),
        }
    }

    #[tool(description = "Update an existing lesson.")]
    async fn z_update_lesson(&self, input: Parameters<UpdateLessonInput>) -> Result<CallToolResult, McpError> {
        if let Err(e) = self.storage.ensure_directories() {
            return Ok(store_error(e));
        }
        let UpdateLessonInput {
            lesson_id,
            category,
            problem,
            solution,
            conditions,
            warnings,
            tags,
            related_tasks,
        } = input.0;
        let updates = LessonUpdate {
            category,
            tags,
            related_tasks,
            problem,
            solution,
            conditions,
            warnings,
        };
        match store::update_lesson(&self.storage, &lesson_id, updates) {
            Ok(result) => Ok(pretty_json(&result)),
            Err(e) => Ok(store_error(e)),
        }
    }

    // --- Memories ---

    #[tool(description = "Add a project memory: conventions, constraints, and other facts worth keeping across sessions.")]
    async fn z_add_memory(&self, input: Parameters<AddMemoryInput>) -> Result<CallToolResult, McpError> {
        if let Err(e) = self.storage.ensure_directories() {
            return Ok(store_error(e));
        }
        let AddMemoryInput { content, tags, priority } = input.0;
        match store::add_memory(
            &self.storage,
            &content,
            tags.unwrap_or_default(),
            priority.unwrap_or(Priority::Medium),
        ) {
            Ok(saved) => Ok(success_text(format!("Memory {} added", saved.memory_id))),
            Err(e) => Ok(store_error(e)),
        }
    }

    #[tool(description = "Get one memory.")]
    async fn z_get_memory(&self, input: Parameters<MemoryIdInput>) -> Result<CallToolResult, McpError> {
        if let Err(e) = self.storage.ensure_directories() {
            return Ok(store_error(e));
        }
        match store::get_memory(&self.storage, &input.0.memory_id) {
            Ok(memory) => Ok(pretty_json(&MemoryEnvelope {
                found: memory.is_some(),
                memory,
            })),
            Err(e) => Ok(store_error(e)),
        }
    }

    #[tool(description = "List all memories, sorted by priority.")]
    async fn z_list_memories(&self) -> Result<CallToolResult, McpError> {
        if let Err(e) = self.storage.ensure_directories() {
            return Ok(store_error(e));
        }
        let memories = match store::get_all_memories(&self.storage) {
            Ok(memories) => memories,
            Err(e) => return Ok(store_error(e)),
        };
        let previews: Vec<MemoryPreview> = memories
            .into_iter()
            .map(|m| MemoryPreview {
                memory_id: m.memory_id,
                priority: m.priority,
                tags: m.tags,
                content_preview: clip(&m.content, 100),
                updated_at: Some(m.updated_at),
            })
            .collect();
        Ok(pretty_json(&MemoryListResponse {
            count: previews.len(),
            memories: previews,
        }))
    }

    #[tool(description = "Search memories by keyword.")]
    async fn z_search_memories(&self, input: Parameters<SearchInput>) -> Result<CallToolResult, McpError> {
        if let Err(e) = self.storage.ensure_directories() {
            return Ok(store_error(e));
        }
        let SearchInput { query, limit } = input.0;
        let limit = limit.filter(|&l| l > 0).unwrap_or(10);
        let memories = match store::search_memories(&self.storage, &query, limit) {
            Ok(memories) => memories,
            Err(e) => return Ok(store_error(e)),
        };
        let previews: Vec<MemoryPreview> = memories
            .into_iter()
            .map(|m| MemoryPreview {
                memory_id: m.memory_id,
                priority: m.priority,
                tags: m.tags,
                content_preview: clip(&m.content, 100),
                updated_at: None,
            })
            .collect();
        Ok(pretty_json(&MemorySearchResponse {
            query,
            count: previews.len(),
            memories: previews,
        }))
    }

    #[tool(description = "Update a memory's content, tags, or priority.")]
    async fn z_update_memory(&self, input: Parameters<UpdateMemoryInput>) -> Result<CallToolResult, McpError> {
        if let Err(e) = self.storage.ensure_directories() {
            return Ok(store_error(e));
        }
        let UpdateMemoryInput { memory_id, content, tags, priority } = input.0;
        let updates = MemoryUpdate { content, tags, priority };
        match store::update_memory(&self.storage, &memory_id, updates) {
            Ok(result) => Ok(pretty_json(&result)),
            Err(e) => Ok(store_error(e)),
        }
    }

    #[tool(description = "Delete a memory.")]
    async fn z_delete_memory(&self, input: Parameters<MemoryIdInput>) -> Result<CallToolResult, McpError> {
        if let Err(e) = self.storage.ensure_directories() {
            return Ok(store_error(e));
        }
        match store::delete_memory(&self.storage, &input.0.memory_id) {
            Ok(result) => Ok(pretty_json(&result)),
            Err(e) => Ok(store_error(e)),
        }
    }

    // --- Status queries & cleanup ---

    #[tool(description = "List tasks by status, with each task's TODO progress and linked plan.")]
    async fn z_get_tasks_by_status(&self, input: Parameters<TasksByStatusInput>) -> Result<CallToolResult, McpError> {
        if let Err(e) = self.storage.ensure_directories() {
            return Ok(store_error(e));
        }
        let filter = input.0.status.unwrap_or(TaskStatusFilter::All);
        let tasks = match query::get_tasks_by_status(&self.storage, filter.as_status()) {
            Ok(tasks) => tasks,
            Err(e) => return Ok(store_error(e)),
        };
        let mut output = format!("## Tasks (status: {})\n\n", filter.label());
        if tasks.is_empty() {
            output.push_str("No matching tasks.\n");
        } else {
            for task in &tasks {
                output.push_str(&format!(
                    "- {} **{}**: {} [{}/{}]\n",
                    task.status.glyph(),
                    task.task_id,
                    task.task_desc,
                    task.todo_stats.completed,
                    task.todo_stats.total
                ));
                if let Some(plan) = &task.linked_plan {
                    output.push_str(&format!("  └ Linked plan: {plan}\n"));
                }
            }
        }
        Ok(success_text(output))
    }

    #[tool(description = "List plans by status, flagging linked tasks that are not finished.")]
    async fn z_get_plans_by_status(&self, input: Parameters<PlansByStatusInput>) -> Result<CallToolResult, McpError> {
        if let Err(e) = self.storage.ensure_directories() {
            return Ok(store_error(e));
        }
        let filter = input.0.status.unwrap_or(PlanStatusFilter::All);
        let plans = match query::get_plans_by_status(&self.storage, filter.as_status()) {
            Ok(plans) => plans,
            Err(e) => return Ok(store_error(e)),
        };
        let mut output = format!("## Plans (status: {})\n\n", filter.label());
        if plans.is_empty() {
            output.push_str("No matching plans.\n");
        } else {
            for plan in &plans {
                output.push_str(&format!(
                    "- {} **{}**: {}\n",
                    plan.status.glyph(),
                    plan.plan_id,
                    plan.title
                ));
                if !plan.linked_tasks.is_empty() {
                    output.push_str(&format!("  └ Linked tasks: {}\n", plan.linked_tasks.join(", ")));
                    if !plan.incomplete_tasks.is_empty() {
                        output.push_str(&format!(
                            "  └ ⚠️ Incomplete tasks: {}\n",
                            plan.incomplete_tasks.join(", ")
                        ));
                    }
                }
            }
        }
        Ok(success_text(output))
    }

    #[tool(description = "Delete every completed task and its files in one pass.")]
    async fn z_delete_completed_tasks(&self) -> Result<CallToolResult, McpError> {
        if let Err(e) = self.storage.ensure_directories() {
            return Ok(store_error(e));
        }
        let report = match query::delete_completed_tasks(&self.storage) {
            Ok(report) => report,
            Err(e) => return Ok(store_error(e)),
        };
        let mut output = String::from("## Completed Task Cleanup\n\n");
        output.push_str(&format!("Deleted tasks: {}\n", report.deleted_tasks.len()));
        if !report.deleted_tasks.is_empty() {
            output.push_str("\n### Deleted Tasks\n");
            for task_id in &report.deleted_tasks {
                output.push_str(&format!("- ✅ {task_id}\n"));
            }
        }
        Ok(success_text(output))
    }

    #[tool(description = "Preview what a cleanup would delete, before actually deleting.")]
    async fn z_cleanup_preview(&self, input: Parameters<CleanupPreviewInput>) -> Result<CallToolResult, McpError> {
        if let Err(e) = self.storage.ensure_directories() {
            return Ok(store_error(e));
        }
        let target = input.0.target;
        let mut output = format!("## Cleanup Preview: {}\n\n", target.label());
        if target.includes_tasks() {
            let completed = match query::get_tasks_by_status(&self.storage, Some(TaskStatus::Completed)) {
                Ok(tasks) => tasks,
                Err(e) => return Ok(store_error(e)),
            };
            output.push_str(&format!("### Completed Tasks ({})\n", completed.len()));
            if completed.is_empty() {
                output.push_str("None\n");
            } else {
                for task in &completed {
                    output.push_str(&format!("- {}: {}\n", task.task_id, task.task_desc));
                }
            }
            output.push('\n');
        }
        if target.includes_plans() {
            let completed = match query::get_plans_by_status(&self.storage, Some(PlanStatus::Completed)) {
                Ok(plans) => plans,
                Err(e) => return Ok(store_error(e)),
            };
            output.push_str(&format!("### Completed Plans ({})\n", completed.len()));
            if completed.is_empty() {
                output.push_str("None\n");
            } else {
                for plan in &completed {
                    output.push_str(&format!("- {}: {}\n", plan.plan_id, plan.title));
                    if !plan.linked_tasks.is_empty() {
                        output.push_str(&format!("  └ Linked tasks: {}\n", plan.linked_tasks.join(", ")));
                    }
                    if !plan.incomplete_tasks.is_empty() {
                        output.push_str(&format!(
                            "  └ ⚠️ Incomplete tasks: {}\n",
                            plan.incomplete_tasks.join(", ")
                        ));
                    }
                }
            }
        }
        Ok(success_text(output))
    }

    // --- Parallel execution ---

    #[tool(description = "Analyze a task's TODO list and return groups that can run in parallel. TODOs with disjoint targetFiles and satisfied dependsOn dependencies can run concurrently.")]
    async fn z_analyze_parallel_groups(&self, input: Parameters<TaskIdInput>) -> Result<CallToolResult, McpError> {
        if let Err(e) = self.storage.ensure_directories() {
            return Ok(store_error(e));
        }
        let task_id = input.0.task_id;
        let todos = match store::load_todo_items(&self.storage, &task_id) {
            Ok(TodoListing::Missing) => {
                return Ok(error_text(
                    serde_json::json!({ "error": format!("Task {task_id} not found") }).to_string(),
                ));
            }
            Ok(TodoListing::NoSection) => {
                return Ok(error_text(
                    serde_json::json!({ "error": "TODO list not found in task file" }).to_string(),
                ));
            }
            Ok(TodoListing::Todos(todos)) => todos,
            Err(e) => return Ok(store_error(e)),
        };
        let analysis = analyze_parallel_groups(&todos);
        let has_parallel = analysis.has_parallel_opportunity();
        Ok(pretty_json(&ParallelGroupsResponse {
            task_id,
            todo_count: todos.len(),
            parallel_groups: analysis.groups,
            unreachable: analysis.unreachable,
            has_parallel_opportunity: has_parallel,
            instruction: if has_parallel {
                "Parallel-capable groups found. Use z_get_parallel_prompt to run them in parallel."
            } else {
                "All TODOs require sequential execution."
            },
        }))
    }

    #[tool(description = "Return agent prompts for a group of TODOs to run in parallel. Execute each prompt in its own Task tool call, all at once.")]
    async fn z_get_parallel_prompt(&self, input: Parameters<ParallelPromptInput>) -> Result<CallToolResult, McpError> {
        if let Err(e) = self.storage.ensure_directories() {
            return Ok(store_error(e));
        }
        let ParallelPromptInput { task_id, todo_indexes } = input.0;
        let todos = match store::load_todo_items(&self.storage, &task_id) {
            Ok(TodoListing::Missing) => {
                return Ok(error_text(
                    serde_json::json!({ "error": format!("Task {task_id} not found") }).to_string(),
                ));
            }
            Ok(TodoListing::NoSection) => {
                return Ok(error_text(
                    serde_json::json!({ "error": "TODO list not found in task file" }).to_string(),
                ));
            }
            Ok(TodoListing::Todos(todos)) => todos,
            Err(e) => return Ok(store_error(e)),
        };
        let prompts: Vec<ParallelPromptEntry> = todos
            .iter()
            .filter(|todo| todo_indexes.contains(&todo.index))
            .map(|todo| ParallelPromptEntry {
                todo_index: todo.index,
                description: todo.description.clone(),
                difficulty: todo.difficulty,
                model: todo.difficulty.suggested_model(),
                prompt: agent_prompt(todo.difficulty, &todo.description),
            })
            .collect();
        let instruction = format!(
            "[REQUIRED] Send all {} Task tool calls at once in a single response! No sequential calls!",
            prompts.len()
        );
        Ok(pretty_json(&ParallelPromptResponse {
            task_id,
            parallel_count: prompts.len(),
            prompts,
            instruction,
            warning: "Calling the Task tool one at a time is not parallel execution. Always invoke multiple Task tools simultaneously in one message.",
            how_to: "Use the model field of each prompt and invoke Task(subagent_type='general-purpose', model=model, prompt=prompt) for all of them at once.",
        }))
    }
}
