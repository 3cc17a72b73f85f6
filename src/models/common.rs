// Common enums for the z-agent filesystem store
// Wire and frontmatter values are camelCase/snake_case strings; glyphs are
// the display form used inside task files

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Work difficulty tier, stored as a single letter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
pub enum Difficulty {
    #[serde(rename = "H")]
    High,
    #[default]
    #[serde(rename = "M")]
    Medium,
    #[serde(rename = "L")]
    Low,
}

impl Difficulty {
    pub fn label(&self) -> &'static str {
        match self {
            Self::High => "H",
            Self::Medium => "M",
            Self::Low => "L",
        }
    }

    pub fn from_label(c: char) -> Option<Self> {
        match c {
            'H' => Some(Self::High),
            'M' => Some(Self::Medium),
            'L' => Some(Self::Low),
            _ => None,
        }
    }

    /// Model tier a todo of this difficulty should be delegated to
    pub fn suggested_model(&self) -> &'static str {
        match self {
            Self::High => "opus",
            Self::Medium => "sonnet",
            Self::Low => "haiku",
        }
    }
}

/// Status of a single todo, shown as a glyph in the task file's TODO list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum TodoStatus {
    #[default]
    Pending,
    InProgress,
    #[serde(alias = "completed")]
    Complete,
    Cancelled,
    Blocked,
}

impl TodoStatus {
    pub fn glyph(&self) -> char {
        match self {
            Self::Pending => '⏳',
            Self::InProgress => '🔄',
            Self::Complete => '✅',
            Self::Cancelled => '❌',
            Self::Blocked => '🚫',
        }
    }

    pub fn from_glyph(c: char) -> Option<Self> {
        match c {
            '⏳' => Some(Self::Pending),
            '🔄' => Some(Self::InProgress),
            '✅' => Some(Self::Complete),
            '❌' => Some(Self::Cancelled),
            '🚫' => Some(Self::Blocked),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Complete => "complete",
            Self::Cancelled => "cancelled",
            Self::Blocked => "blocked",
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Self::Complete)
    }
}

/// Status of a whole task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Cancelled,
    Blocked,
}

impl TaskStatus {
    pub fn glyph(&self) -> char {
        match self {
            Self::Pending => '⏳',
            Self::InProgress => '🔄',
            Self::Completed => '✅',
            Self::Cancelled => '❌',
            Self::Blocked => '🚫',
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Blocked => "blocked",
        }
    }
}

/// Status of a plan; draft and ready have no glyph of their own
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    #[default]
    Draft,
    Ready,
    InProgress,
    Completed,
    Cancelled,
}

impl PlanStatus {
    pub fn glyph(&self) -> char {
        match self {
            Self::Draft | Self::Ready => '⏳',
            Self::InProgress => '🔄',
            Self::Completed => '✅',
            Self::Cancelled => '❌',
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Ready => "ready",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Outcome reported when a todo finishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    Complete,
    Failed,
    Blocked,
}

impl ResultStatus {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Complete => "complete",
            Self::Failed => "failed",
            Self::Blocked => "blocked",
        }
    }

    /// Glyph shown in the task file's TODO list; failed has no glyph and
    /// falls back to the pending one
    pub fn glyph(&self) -> char {
        match self {
            Self::Complete => '✅',
            Self::Failed => '⏳',
            Self::Blocked => '🚫',
        }
    }
}

/// Memory priority, also the primary sort key for listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    pub fn rank(&self) -> u8 {
        match self {
            Self::High => 0,
            Self::Medium => 1,
            Self::Low => 2,
        }
    }

    /// Base relevance score a memory gets in search regardless of keywords
    pub fn search_bonus(&self) -> i32 {
        match self {
            Self::High => 5,
            Self::Medium => 2,
            Self::Low => 0,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

/// Lesson category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "kebab-case")]
pub enum LessonCategory {
    Performance,
    Security,
    Architecture,
    Debugging,
    #[default]
    BestPractice,
}

impl LessonCategory {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Performance => "performance",
            Self::Security => "security",
            Self::Architecture => "architecture",
            Self::Debugging => "debugging",
            Self::BestPractice => "best-practice",
        }
    }
}
