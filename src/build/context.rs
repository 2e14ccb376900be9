//! Explicit diagnostic context stack (spec §9, replacing the `GList` the
//! original threads through the builder to print `Outer.Inner.Name:` error
//! prefixes). Pushed on entry to `build_node`, popped on every return path
//! via RAII rather than manual bookkeeping at each `return`/`?`.

#[derive(Debug, Default)]
pub struct ContextStack {
	frames: Vec<String>,
}

impl ContextStack {
	pub fn new() -> Self {
		ContextStack::default()
	}

	pub fn push(&mut self, name: impl Into<String>) -> ContextGuard<'_> {
		self.frames.push(name.into());
		ContextGuard { stack: self }
	}

	/// Push a frame without returning a guard that borrows `self`. Use this
	/// (paired with [`ContextStack::pop_frame`]) at call sites where the
	/// frame must stay live across a further `&mut self`-taking call on
	/// whatever struct owns this stack — a live [`ContextGuard`] would
	/// reborrow-conflict with that call.
	pub fn push_frame(&mut self, name: impl Into<String>) {
		self.frames.push(name.into());
	}

	pub fn pop_frame(&mut self) {
		self.frames.pop();
	}

	pub fn frames(&self) -> &[String] {
		&self.frames
	}
}

pub struct ContextGuard<'a> {
	stack: &'a mut ContextStack,
}

impl Drop for ContextGuard<'_> {
	fn drop(&mut self) {
		self.stack.frames.pop();
	}
}
