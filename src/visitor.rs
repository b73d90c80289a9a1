use crate::tree::{Child, ComponentNode, NodeKind};

/// The TreeVisitor trait defines the single authoritative traversal of a component tree.
///
/// Rules:
/// 1. Traversal order is document order and fixed: children first, then the
///    `else` branch of an `If` node.
/// 2. Implementers override `visit_*` methods to add behavior.
/// 3. Implementers MUST call the matching `walk_*` function to continue
///    traversal unless pruning is intended.
pub trait TreeVisitor<'t> {
    /// Top-level component definitions.
    fn visit_definition(&mut self, component: &'t ComponentNode) {
        walk_node(self, component);
    }

    /// Every node below a top-level definition, including inline definitions.
    fn visit_node(&mut self, node: &'t ComponentNode) {
        walk_node(self, node);
    }

    fn visit_children(&mut self, children: &'t [Child]) {
        walk_children(self, children);
    }
}

pub fn walk_children<'t, V: TreeVisitor<'t> + ?Sized>(visitor: &mut V, children: &'t [Child]) {
    // Text, script and primitive children are leaves with nothing to visit.
    for child in children {
        if let Child::Node(node) = child {
            visitor.visit_node(node);
        }
    }
}

pub fn walk_node<'t, V: TreeVisitor<'t> + ?Sized>(visitor: &mut V, node: &'t ComponentNode) {
    visitor.visit_children(&node.children);
    if let NodeKind::If { otherwise, .. } = &node.kind {
        visitor.visit_children(otherwise);
    }
}

/// Collects every node (definitions included) in document order.
pub struct NodeCollector<'t> {
    pub nodes: Vec<&'t ComponentNode>,
}

impl<'t> TreeVisitor<'t> for NodeCollector<'t> {
    fn visit_definition(&mut self, component: &'t ComponentNode) {
        self.nodes.push(component);
        walk_node(self, component);
    }

    fn visit_node(&mut self, node: &'t ComponentNode) {
        self.nodes.push(node);
        walk_node(self, node);
    }
}

/// All nodes of one top-level definition, the definition itself first.
pub fn nodes_of(component: &ComponentNode) -> Vec<&ComponentNode> {
    let mut collector = NodeCollector { nodes: vec![] };
    collector.visit_definition(component);
    collector.nodes
}

/// The top-level definition followed by its inline definitions, in document order.
pub fn definitions_of(component: &ComponentNode) -> Vec<&ComponentNode> {
    nodes_of(component)
        .into_iter()
        .filter(|n| n.is_definition())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(kind: NodeKind, path: &str) -> ComponentNode {
        ComponentNode::new(kind, path, vec![])
    }

    #[test]
    fn test_document_order_includes_else_branch() {
        let mut root = node(NodeKind::default(), "components[0]");
        let then_branch = node(NodeKind::Element("span".into()), "then");
        let else_branch = node(NodeKind::Element("em".into()), "else");
        let mut cond = node(
            NodeKind::If {
                condition: "ok".into(),
                otherwise: vec![Child::Node(Box::new(else_branch))],
            },
            "if",
        );
        cond.children.push(Child::Node(Box::new(then_branch)));
        root.children.push(Child::Node(Box::new(cond)));

        let paths: Vec<&str> = nodes_of(&root).iter().map(|n| n.path.as_str()).collect();
        assert_eq!(paths, vec!["components[0]", "if", "then", "else"]);
    }

    #[test]
    fn test_definitions_of_filters_elements() {
        let mut root = node(NodeKind::default(), "components[0]");
        root.children
            .push(Child::Node(Box::new(node(NodeKind::Element("div".into()), "div"))));
        root.children
            .push(Child::Node(Box::new(node(NodeKind::default(), "inline"))));
        let defs: Vec<&str> = definitions_of(&root)
            .iter()
            .map(|n| n.path.as_str())
            .collect();
        assert_eq!(defs, vec!["components[0]", "inline"]);
    }
}
