//! Workflow topology: node identifiers, transition table and Mermaid rendering

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::report::FeedbackRoute;

/// Nodes of the report pipeline
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ReportNode {
    GeneratePlan,
    /// The single suspension point
    HumanFeedback,
    /// Fan-out of research section loops
    ResearchSections,
    /// Barrier after research; builds the research context
    GatherCompleted,
    /// Fan-out of non-research section writers
    WriteFinalSections,
    CompileReport,
    End,
}

/// Shape class used when rendering a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeShape {
    Step,
    Interrupt,
    FanOut,
    FanIn,
    Terminal,
}

impl ReportNode {
    /// Every node, in pipeline order
    pub const ALL: [ReportNode; 7] = [
        ReportNode::GeneratePlan,
        ReportNode::HumanFeedback,
        ReportNode::ResearchSections,
        ReportNode::GatherCompleted,
        ReportNode::WriteFinalSections,
        ReportNode::CompileReport,
        ReportNode::End,
    ];

    /// Static edges, with labels on data-dependent ones
    pub const EDGES: [(ReportNode, ReportNode, Option<&'static str>); 8] = [
        (ReportNode::GeneratePlan, ReportNode::HumanFeedback, None),
        (ReportNode::HumanFeedback, ReportNode::ResearchSections, Some("approve")),
        (ReportNode::HumanFeedback, ReportNode::GeneratePlan, Some("revise")),
        (ReportNode::HumanFeedback, ReportNode::HumanFeedback, Some("empty")),
        (ReportNode::ResearchSections, ReportNode::GatherCompleted, Some("join all")),
        (ReportNode::GatherCompleted, ReportNode::WriteFinalSections, None),
        (ReportNode::WriteFinalSections, ReportNode::CompileReport, Some("join all")),
        (ReportNode::CompileReport, ReportNode::End, None),
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportNode::GeneratePlan => "generate_plan",
            ReportNode::HumanFeedback => "human_feedback",
            ReportNode::ResearchSections => "research_sections",
            ReportNode::GatherCompleted => "gather_completed",
            ReportNode::WriteFinalSections => "write_final_sections",
            ReportNode::CompileReport => "compile_report",
            ReportNode::End => "end",
        }
    }

    fn shape(&self) -> NodeShape {
        match self {
            ReportNode::HumanFeedback => NodeShape::Interrupt,
            ReportNode::ResearchSections | ReportNode::WriteFinalSections => NodeShape::FanOut,
            ReportNode::GatherCompleted => NodeShape::FanIn,
            ReportNode::End => NodeShape::Terminal,
            ReportNode::GeneratePlan | ReportNode::CompileReport => NodeShape::Step,
        }
    }

    /// Successor of this node.
    ///
    /// `route` is the routed feedback when leaving `HumanFeedback`; without
    /// it the workflow stays at the suspension point.
    pub fn next(self, route: Option<&FeedbackRoute>) -> ReportNode {
        match self {
            ReportNode::GeneratePlan => ReportNode::HumanFeedback,
            ReportNode::HumanFeedback => match route {
                Some(FeedbackRoute::Approve) => ReportNode::ResearchSections,
                Some(FeedbackRoute::Revise(_)) => ReportNode::GeneratePlan,
                Some(FeedbackRoute::Reprompt) | None => ReportNode::HumanFeedback,
            },
            ReportNode::ResearchSections => ReportNode::GatherCompleted,
            ReportNode::GatherCompleted => ReportNode::WriteFinalSections,
            ReportNode::WriteFinalSections => ReportNode::CompileReport,
            ReportNode::CompileReport | ReportNode::End => ReportNode::End,
        }
    }

    /// Render the pipeline as a Mermaid flowchart
    pub fn mermaid() -> String {
        let mut lines = vec!["flowchart TD".to_string(), "    __start__([START])".to_string()];
        lines.extend(Self::ALL.iter().map(render_node));
        lines.push(render_edge("__start__", ReportNode::GeneratePlan.as_str(), None));
        lines.extend(
            Self::EDGES
                .iter()
                .map(|(from, to, label)| render_edge(from.as_str(), to.as_str(), *label)),
        );
        lines.join("\n")
    }
}

impl fmt::Display for ReportNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn render_node(node: &ReportNode) -> String {
    let id = node.as_str();
    match node.shape() {
        NodeShape::Step => format!("    {}[{}]", id, id),
        NodeShape::Interrupt => format!("    {}{{{}}}", id, id),
        NodeShape::FanOut => format!("    {}[/{}\\]", id, id),
        NodeShape::FanIn => format!("    {}[\\{}/]", id, id),
        NodeShape::Terminal => format!("    {}([{}])", id, id),
    }
}

/// Solid arrow for unconditional edges, dotted with label otherwise
fn render_edge(from: &str, to: &str, label: Option<&str>) -> String {
    match label {
        Some(label) => format!("    {} -. \"{}\" .-> {}", from, label, to),
        None => format!("    {} --> {}", from, to),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_transitions() {
        assert_eq!(ReportNode::GeneratePlan.next(None), ReportNode::HumanFeedback);
        assert_eq!(ReportNode::ResearchSections.next(None), ReportNode::GatherCompleted);
        assert_eq!(ReportNode::GatherCompleted.next(None), ReportNode::WriteFinalSections);
        assert_eq!(ReportNode::WriteFinalSections.next(None), ReportNode::CompileReport);
        assert_eq!(ReportNode::CompileReport.next(None), ReportNode::End);
        assert_eq!(ReportNode::End.next(None), ReportNode::End);
    }

    #[test]
    fn test_feedback_routing() {
        let node = ReportNode::HumanFeedback;
        assert_eq!(node.next(Some(&FeedbackRoute::Approve)), ReportNode::ResearchSections);
        assert_eq!(node.next(Some(&FeedbackRoute::Revise("more".into()))), ReportNode::GeneratePlan);
        assert_eq!(node.next(Some(&FeedbackRoute::Reprompt)), ReportNode::HumanFeedback);
        assert_eq!(node.next(None), ReportNode::HumanFeedback);
    }

    #[test]
    fn test_edges_match_transitions() {
        for (from, to, label) in ReportNode::EDGES {
            let route = match label {
                Some("approve") => Some(FeedbackRoute::Approve),
                Some("revise") => Some(FeedbackRoute::Revise("x".into())),
                Some("empty") => Some(FeedbackRoute::Reprompt),
                _ => None,
            };
            assert_eq!(from.next(route.as_ref()), to, "{from} -> {to}");
        }
    }

    #[test]
    fn test_node_serde() {
        let json = serde_json::to_string(&ReportNode::HumanFeedback).unwrap();
        assert_eq!(json, r#""human_feedback""#);
        assert_eq!(ReportNode::WriteFinalSections.to_string(), "write_final_sections");
    }

    #[test]
    fn test_mermaid_rendering() {
        let diagram = ReportNode::mermaid();
        assert!(diagram.starts_with("flowchart TD\n"));
        assert!(diagram.contains("    human_feedback{human_feedback}"));
        assert!(diagram.contains("    research_sections[/research_sections\\]"));
        assert!(diagram.contains("    gather_completed[\\gather_completed/]"));
        assert!(diagram.contains("    __start__ --> generate_plan"));
        assert!(diagram.contains("    human_feedback -. \"approve\" .-> research_sections"));
        assert!(diagram.contains("    compile_report --> end"));
    }
}
