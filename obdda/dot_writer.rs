pub enum Edge {
    Simple(usize, usize),
    Low(usize, usize),
    High(usize, usize),
}

impl std::fmt::Display for Edge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Edge::Simple(from, to) => write!(f, "{from} -> {to} [arrowsize=.50]"),
            Edge::Low(from, to) => write!(f, "{from} -> {to} [arrowsize=.50 style=dashed]"),
            Edge::High(from, to) => write!(f, "{from} -> {to} [arrowsize=.50]"),
        }
    }
}

#[derive(Default)]
pub struct DotWriter {
    graph_name: String,
    show_ids: bool,

    nodes: Vec<(usize, NodeType)>,
    edges: Vec<Edge>,
}

pub enum NodeType {
    /// Terminals and literals.
    Box(String),
    /// Decision on a variable.
    Circle(String),
    Conjunction,
}

impl NodeType {
    fn shape(&self) -> &'static str {
        match self {
            NodeType::Box(_) => "box",
            NodeType::Circle(_) => "circle",
            NodeType::Conjunction => "triangle",
        }
    }

    fn label(&self, node: usize, show_ids: bool) -> String {
        let label = match self {
            NodeType::Box(label) | NodeType::Circle(label) => label.as_str(),
            NodeType::Conjunction => "∧",
        };

        if show_ids {
            format!("{label}\\n#{node}")
        } else {
            label.to_owned()
        }
    }
}

impl DotWriter {
    #[must_use]
    pub fn new(graph_name: String, show_ids: bool) -> DotWriter {
        DotWriter {
            graph_name,
            show_ids,
            ..Default::default()
        }
    }

    pub fn add_node(&mut self, node_idx: usize, node_type: NodeType) {
        self.nodes.push((node_idx, node_type));
    }

    pub fn add_edge(&mut self, edge: Edge) {
        self.edges.push(edge);
    }

    /// # Errors
    /// Function returns an error if the writing to a file or flushing fails.
    pub fn write(&self, writer: &mut dyn std::io::Write) -> std::io::Result<()> {
        write!(writer, "digraph {} {{\n  overlap=false", self.graph_name)?;

        for (node, node_type) in &self.nodes {
            write!(
                writer,
                "\n  {node} [shape={} label=\"{}\" height=.25 width=.2]",
                node_type.shape(),
                node_type.label(*node, self.show_ids),
            )?;
        }

        for edge in &self.edges {
            write!(writer, "\n  {edge}")?;
        }

        write!(writer, "\n}}")?;
        writer.flush()
    }
}
