//! Chain to DOT (Graphviz) conversion.
//!
//! The generated graph is directed: one node per state, labelled with its name
//! and atomic propositions, and one edge per transition labelled with its
//! probability. The initial state gets an incoming arrow from an invisible
//! point node. States can be highlighted, typically with the satisfaction set
//! of a formula.
//!
//! # Examples
//!
//! ```
//! use pctl_rs::chain::Dtmc;
//!
//! let mut chain = Dtmc::new();
//! let s0 = chain.add_state(None, &[]);
//! let s1 = chain.add_state(None, &["done"]);
//! chain.add_transition(s0, s1, 1.0).unwrap();
//! chain.add_transition(s1, s1, 1.0).unwrap();
//!
//! let dot = chain.to_dot(None).unwrap();
//! // Write to file and render with: dot -Tpng output.dot -o output.png
//! assert!(dot.starts_with("digraph {"));
//! ```

use std::fmt::Write as _;

use crate::chain::Dtmc;
use crate::state_set::StateSet;

/// Configuration options for DOT output generation.
///
/// Use `DotConfig::default()` for standard settings.
#[derive(Debug, Clone)]
pub struct DotConfig {
    /// Shape for state nodes (default: "circle")
    pub state_shape: &'static str,
    /// Fill color for highlighted states (default: "lightblue")
    pub highlight_color: &'static str,
    /// Graph layout direction (default: "LR")
    pub rankdir: &'static str,
    /// Whether to list atomic propositions under the state name (default: true)
    pub show_labels: bool,
    /// Decimal places for transition probabilities (default: 4)
    pub precision: usize,
}

impl Default for DotConfig {
    fn default() -> Self {
        Self {
            state_shape: "circle",
            highlight_color: "lightblue",
            rankdir: "LR",
            show_labels: true,
            precision: 4,
        }
    }
}

impl Dtmc {
    /// Converts the chain to DOT format, filling the `highlight` states.
    pub fn to_dot(&self, highlight: Option<&StateSet>) -> Result<String, std::fmt::Error> {
        self.to_dot_with_config(highlight, &DotConfig::default())
    }

    /// Converts the chain to DOT format with custom configuration.
    ///
    /// ```
    /// use pctl_rs::chain::Dtmc;
    /// use pctl_rs::dot::DotConfig;
    ///
    /// let mut chain = Dtmc::new();
    /// let s = chain.add_state(Some("idle"), &[]);
    /// chain.add_transition(s, s, 1.0).unwrap();
    ///
    /// let config = DotConfig {
    ///     state_shape: "ellipse",
    ///     ..DotConfig::default()
    /// };
    /// let dot = chain.to_dot_with_config(None, &config).unwrap();
    /// assert!(dot.contains("shape=ellipse"));
    /// ```
    pub fn to_dot_with_config(
        &self,
        highlight: Option<&StateSet>,
        config: &DotConfig,
    ) -> Result<String, std::fmt::Error> {
        let mut dot = String::new();
        writeln!(dot, "digraph {{")?;
        writeln!(dot, "rankdir={};", config.rankdir)?;
        writeln!(dot, "node [shape={}];", config.state_shape)?;

        for state in self.states() {
            let mut label = escape(state.name());
            if config.show_labels {
                let labels: Vec<&str> = state.labels().collect();
                if !labels.is_empty() {
                    write!(label, "\\n{{{}}}", escape(&labels.join(", ")))?;
                }
            }
            let filled = highlight.is_some_and(|set| set.contains(state.id()));
            if filled {
                writeln!(
                    dot,
                    "{} [label=\"{}\", style=filled, fillcolor={}];",
                    state.id().index(),
                    label,
                    config.highlight_color
                )?;
            } else {
                writeln!(dot, "{} [label=\"{}\"];", state.id().index(), label)?;
            }
        }

        if let Some(initial) = self.initial() {
            writeln!(dot, "init [shape=point, style=invis];")?;
            writeln!(dot, "init -> {};", initial.index())?;
        }

        for t in self.transitions() {
            writeln!(
                dot,
                "{} -> {} [label=\"{:.*}\"];",
                t.source.index(),
                t.target.index(),
                config.precision,
                t.probability
            )?;
        }

        writeln!(dot, "}}")?;
        Ok(dot)
    }
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    fn branching() -> Dtmc {
        let mut chain = Dtmc::new();
        let s0 = chain.add_state(None, &["start"]);
        let s1 = chain.add_state(None, &[]);
        let s2 = chain.add_state(None, &["loop", "done"]);
        chain.add_transition(s0, s1, 0.5).unwrap();
        chain.add_transition(s0, s2, 0.5).unwrap();
        chain.add_transition(s1, s2, 1.0).unwrap();
        chain.add_transition(s2, s2, 1.0).unwrap();
        chain
    }

    #[test]
    fn test_to_dot_basic() {
        let dot = branching().to_dot(None).unwrap();
        assert!(dot.starts_with("digraph {"));
        assert!(dot.ends_with("}\n"));
        assert!(dot.contains("0 [label=\"s0\\n{start}\"];"));
        assert!(dot.contains("2 [label=\"s2\\n{done, loop}\"];"));
        assert!(dot.contains("0 -> 1 [label=\"0.5000\"];"));
        assert!(dot.contains("init -> 0;"));
        assert!(!dot.contains("filled"));
    }

    #[test]
    fn test_to_dot_highlight() {
        let chain = branching();
        let set: StateSet = chain.labelled("loop");
        let dot = chain.to_dot(Some(&set)).unwrap();
        assert!(dot.contains("2 [label=\"s2\\n{done, loop}\", style=filled, fillcolor=lightblue];"));
        assert_eq!(dot.matches("filled").count(), 1);
    }

    #[test]
    fn test_to_dot_with_config() {
        let config = DotConfig {
            show_labels: false,
            precision: 1,
            ..DotConfig::default()
        };
        let dot = branching().to_dot_with_config(None, &config).unwrap();
        assert!(dot.contains("0 [label=\"s0\"];"));
        assert!(dot.contains("0 -> 2 [label=\"0.5\"];"));
    }

    #[test]
    fn test_to_dot_empty_and_escaped() {
        let dot = Dtmc::new().to_dot(None).unwrap();
        assert_eq!(dot, "digraph {\nrankdir=LR;\nnode [shape=circle];\n}\n");

        let mut chain = Dtmc::new();
        chain.add_state(Some("say \"hi\""), &[]);
        let dot = chain.to_dot(None).unwrap();
        assert!(dot.contains("label=\"say \\\"hi\\\"\""));
    }

    /// Helper test to write a DOT file for manual inspection (disabled by default)
    #[test]
    #[ignore]
    fn test_write_dot_file() {
        let dot = branching().to_dot(None).unwrap();
        std::fs::write("test_output.dot", &dot).unwrap();
        println!("DOT output:\n{}", dot);
    }
}
