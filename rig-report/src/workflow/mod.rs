//! Report workflow: topology, fan-out and the checkpointed interpreter
//!
//! ```text
//! generate_plan ──► human_feedback ──approve──► research_sections (fan-out)
//!       ▲               │   ▲                          │
//!       └────revise─────┘   └──empty                   ▼
//!                                               gather_completed
//!                                                      │
//!                       compile_report ◄── write_final_sections (fan-out)
//! ```

mod engine;
mod fanout;
mod node;

pub use engine::{ReportWorkflow, WorkflowEvent};
pub use fanout::fan_out;
pub use node::ReportNode;
