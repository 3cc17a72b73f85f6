// Models module for the z-agent filesystem store
// All frontmatter and wire fields use camelCase for consistency

pub mod answer;
pub mod common;
pub mod lesson;
pub mod memory;
pub mod plan;
pub mod task;

pub use answer::AnswerFrontmatter;
pub use common::{
    Difficulty, LessonCategory, PlanStatus, Priority, ResultStatus, TaskStatus, TodoStatus,
};
pub use lesson::LessonFrontmatter;
pub use memory::MemoryFrontmatter;
pub use plan::{PlanFrontmatter, PlanTodo};
pub use task::{
    TaskFrontmatter, TodoFrontmatter, TodoItem, TodoLine, TodoResultFrontmatter, TodoSpec,
};
