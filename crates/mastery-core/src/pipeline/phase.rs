//! Phase catalog

use mastery_llm::DEFAULT_ESTIMATED_TOKENS;
use serde::{Deserialize, Serialize};

const SONNET: &str = "claude-sonnet-4-5-20250929";
const GPT4O: &str = "gpt-4o";

/// What the pipeline does after a phase fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop the pipeline
    #[default]
    Halt,
    /// Log a warning and run the next phase
    Continue,
}

/// An agent taking part in a phase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSpec {
    /// Agent role name, as it appears in the cost ledger
    pub name: String,
    /// Model override; the configured default model when absent
    #[serde(default)]
    pub model: Option<String>,
}

/// One task of a phase's crew
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    /// Stable identifier, unique within the crew
    pub id: String,
    /// Human readable name
    pub name: String,
    /// Artifact file name, relative to the artifacts directory
    #[serde(default)]
    pub artifact: Option<String>,
}

/// A pipeline phase: one crew and its ordered tasks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseSpec {
    /// Phase number (1-based)
    pub number: u32,
    /// Phase name
    pub name: String,
    /// Crew executing the phase
    pub crew: String,
    /// Behavior on failure
    #[serde(default)]
    pub policy: FailurePolicy,
    /// Agents whose LLM budget is reserved before kickoff
    #[serde(default)]
    pub agents: Vec<AgentSpec>,
    /// Tokens reserved per agent
    #[serde(default = "default_estimated_tokens")]
    pub estimated_tokens: u64,
    /// Tasks in execution order
    pub tasks: Vec<TaskSpec>,
}

fn default_estimated_tokens() -> u64 {
    DEFAULT_ESTIMATED_TOKENS
}

impl PhaseSpec {
    /// Look up a task by id
    #[must_use]
    pub fn task(&self, task_id: &str) -> Option<&TaskSpec> {
        self.tasks.iter().find(|t| t.id == task_id)
    }
}

fn agent(name: &str, model: &str) -> AgentSpec {
    AgentSpec {
        name: name.to_string(),
        model: Some(model.to_string()),
    }
}

fn task(id: &str, name: &str, artifact: &str) -> TaskSpec {
    TaskSpec {
        id: id.to_string(),
        name: name.to_string(),
        artifact: Some(artifact.to_string()),
    }
}

/// The four pipeline phases in execution order
///
/// Phase 1 produces the objectives every later phase builds on, so its
/// failure halts the pipeline. Later phases continue past failures.
#[must_use]
pub fn default_catalog() -> Vec<PhaseSpec> {
    vec![
        PhaseSpec {
            number: 1,
            name: "Vision & Requirements".to_string(),
            crew: "StrategyCrew".to_string(),
            policy: FailurePolicy::Halt,
            agents: vec![agent("Chief of Staff", SONNET), agent("Product Manager", GPT4O)],
            estimated_tokens: DEFAULT_ESTIMATED_TOKENS,
            tasks: vec![
                task(
                    "strategy_define_objectives",
                    "Define Learning Objectives",
                    "learning_objectives.md",
                ),
                task("strategy_create_prd", "Create Product Requirements", "prd.md"),
                task("strategy_create_roadmap", "Create Roadmap", "roadmap.md"),
            ],
        },
        PhaseSpec {
            number: 2,
            name: "Curriculum Construction".to_string(),
            crew: "CurriculumCrew".to_string(),
            policy: FailurePolicy::Continue,
            agents: vec![
                agent("Curriculum Architect", SONNET),
                agent("AI Subject Matter Expert", GPT4O),
                agent("Instructional Designer", SONNET),
                agent("Cognitive Scientist", SONNET),
                agent("Behavior Designer", SONNET),
            ],
            estimated_tokens: DEFAULT_ESTIMATED_TOKENS,
            tasks: vec![
                task(
                    "curriculum_scaffold",
                    "Curriculum Scaffold",
                    "curriculum_scaffold.md",
                ),
                task(
                    "technical_validation",
                    "Technical Validation",
                    "technical_validation.md",
                ),
                task(
                    "learning_science",
                    "Learning Science Overlay",
                    "learning_science_overlay.md",
                ),
                task(
                    "instructional_content",
                    "Instructional Content Outline",
                    "instructional_content_outline.md",
                ),
                task(
                    "engagement_systems",
                    "Engagement Systems",
                    "engagement_systems.md",
                ),
            ],
        },
        PhaseSpec {
            number: 3,
            name: "Product & Platform Build".to_string(),
            crew: "PlatformCrew".to_string(),
            policy: FailurePolicy::Continue,
            agents: vec![
                agent("UX Designer", SONNET),
                agent("Full-Stack Developer", GPT4O),
                agent("Backend Engineer", GPT4O),
                agent("ML Engineer", GPT4O),
                agent("LLM Engineer", GPT4O),
            ],
            estimated_tokens: DEFAULT_ESTIMATED_TOKENS,
            tasks: vec![
                task("platform_ux_design", "UX Design", "ux_design.md"),
                task(
                    "platform_system_architecture",
                    "System Architecture",
                    "system_architecture.md",
                ),
                task(
                    "platform_data_infrastructure",
                    "Data Infrastructure",
                    "data_infrastructure.md",
                ),
                task("platform_ml_systems", "ML Systems Design", "ml_systems_design.md"),
                task(
                    "platform_llm_integration",
                    "LLM Integration Design",
                    "llm_integration_design.md",
                ),
                task(
                    "platform_mvp_plan",
                    "MVP Implementation Plan",
                    "mvp_implementation_plan.md",
                ),
            ],
        },
        PhaseSpec {
            number: 4,
            name: "Testing & Refinement".to_string(),
            crew: "QACrew".to_string(),
            policy: FailurePolicy::Continue,
            agents: vec![agent("QA Researcher", SONNET)],
            estimated_tokens: DEFAULT_ESTIMATED_TOKENS,
            tasks: vec![
                task(
                    "qa_comprehensive_review",
                    "Comprehensive Review",
                    "qa_comprehensive_review.md",
                ),
                task(
                    "qa_refinement_backlog",
                    "Refinement Backlog",
                    "refinement_backlog.md",
                ),
                task(
                    "qa_validation_framework",
                    "Validation Framework",
                    "validation_framework.md",
                ),
            ],
        },
    ]
}
