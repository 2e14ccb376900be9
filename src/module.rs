//! The module/include graph (spec §3.2, §4.2), grounded in
//! `original_source/girepository/girmodule.c`.

use fxhash::FxHashMap;

use crate::ir::{Node, NodeId};

/// One parsed `<repository><namespace>` plus everything pulled in
/// transitively through `<include>` (spec §3.2).
#[derive(Debug)]
pub struct Module {
	pub name: String,
	pub version: String,
	pub shared_library: Option<String>,
	pub c_prefix: Option<String>,
	/// `Name-Version` strings recorded for the typelib dependency blob.
	pub dependencies: Vec<String>,
	/// Top-level entries, in declaration order; every other node is reached
	/// transitively through these via member/child `NodeId`s.
	pub entries: Vec<NodeId>,
	pub nodes: Vec<Node>,
	pub aliases: FxHashMap<String, String>,
	pub pointer_structures: FxHashMap<String, ()>,
	pub disguised_structures: FxHashMap<String, ()>,
	/// Names of directly-included modules, for diagnostics only; their
	/// contents are merged flat into this module's own lookup tables, matching
	/// `gi_ir_module_add_include_module`'s eager foreach-copy.
	pub include_modules: Vec<String>,
}

impl Module {
	pub fn new(name: impl Into<String>, version: impl Into<String>, shared_library: Option<String>, c_prefix: Option<String>) -> Self {
		Module {
			name: name.into(),
			version: version.into(),
			shared_library,
			c_prefix,
			dependencies: Vec::new(),
			entries: Vec::new(),
			nodes: Vec::new(),
			aliases: FxHashMap::default(),
			pointer_structures: FxHashMap::default(),
			disguised_structures: FxHashMap::default(),
			include_modules: Vec::new(),
		}
	}

	pub fn node(&self, id: NodeId) -> &Node {
		&self.nodes[id.index()]
	}

	pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
		&mut self.nodes[id.index()]
	}

	pub fn push_node(&mut self, node: Node) -> NodeId {
		let id = NodeId(self.nodes.len() as u32);
		self.nodes.push(node);
		id
	}

	/// Merge an included module's alias/pointer/disguised tables into this
	/// one, and record its name for the dependency list. Mirrors
	/// `gi_ir_module_add_include_module`'s unconditional overwrite-on-conflict
	/// semantics (`g_hash_table_replace`).
	pub fn add_include(&mut self, include: &Module) {
		self.include_modules.push(include.name.clone());
		for (key, value) in &include.aliases {
			self.aliases.insert(key.clone(), value.clone());
		}
		for key in include.pointer_structures.keys() {
			self.pointer_structures.insert(key.clone(), ());
		}
		for key in include.disguised_structures.keys() {
			self.disguised_structures.insert(key.clone(), ());
		}
	}

	/// Follows the alias chain to its final target, refusing to loop forever
	/// on a cycle (the original silently terminates after the first
	/// non-alias hit; a cycle there is also a bug, so we just stop on repeat).
	pub fn resolve_alias<'a>(&'a self, name: &'a str) -> &'a str {
		let mut current = name;
		let mut seen = std::collections::HashSet::new();
		while let Some(target) = self.aliases.get(current) {
			if !seen.insert(current) {
				break;
			}
			current = target;
		}
		current
	}

	pub fn is_pointer_or_disguised(&self, name: &str) -> bool {
		self.pointer_structures.contains_key(name) || self.disguised_structures.contains_key(name)
	}

	/// Depth-first search of `include_modules` (including this module itself)
	/// for a module named `name` (spec §4.2 `find_namespace`). Since includes
	/// are flattened eagerly on `add_include`, this only needs to walk the
	/// recorded names rather than a nested module graph.
	pub fn find_namespace(&self, name: &str) -> bool {
		self.name == name || self.include_modules.iter().any(|m| m == name)
	}

	/// Inserts `member` into `members` in `compare` order (spec §4.1
	/// `add_member`), borrowing `self.nodes` read-only for the comparison.
	pub fn add_member(&self, container_kind: crate::ir::NodeKind, members: &mut Vec<NodeId>, member: NodeId) {
		crate::ir::add_member(container_kind, members, member, &self.nodes);
	}
}
