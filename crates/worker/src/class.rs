/// Execution classes used for spawn tracing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskClass {
	/// Handling of a single incoming message.
	Dispatch,
	/// A post-execution callback scheduled after a command finished.
	Callback,
}

impl TaskClass {
	pub(crate) const fn as_str(self) -> &'static str {
		match self {
			Self::Dispatch => "dispatch",
			Self::Callback => "callback",
		}
	}
}
