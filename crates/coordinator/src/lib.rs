//! # Orca Coordinator
//!
//! Process-wide bookkeeping shared by retrieval, indexing and analysis
//! agents: per-agent metrics, the resource allocator, and the merged
//! knowledge map.
//!
//! ```text
//! Agent ──record_operation──> AgentMetrics ──redistribute_resources──> ResourceAllocation
//!   │                                                                      │
//!   └──share_knowledge──> knowledge map        agent_context(id) <─────────┘
//! ```

mod config;
mod coordinator;
mod knowledge;
mod metrics;

pub use config::CoordinatorConfig;
pub use coordinator::{AgentContext, AgentCoordinator};
pub use knowledge::merge_knowledge;
pub use metrics::{AgentMetrics, ResourceAllocation, SystemMetrics};
