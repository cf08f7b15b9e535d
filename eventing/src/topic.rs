//! Topic expressions
//!
//! Three dialects are understood:
//!
//! - **simple**: a single topic path, matched exactly
//! - **concrete**: a single topic path, matched exactly
//! - **full**: one or more paths joined by `|`, where a step may be `*` (any single step),
//!   and steps may be separated by `//` (any number of intermediate steps).
//!   A trailing `//.` matches the topic itself and all of its descendants.
//!
//! Topic paths are `/` separated, e.g. `tns1:Device/Trigger`.

use crate::error::FilterError;
use protocol::types::{
	CONCRETE_DIALECT, FULL_DIALECT, SIMPLE_DIALECT, TopicDescription, TopicExpression,
};

/// Topic expression grammars
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
	Simple,
	Concrete,
	Full,
}

impl Dialect {
	pub fn from_uri(dialect: &str) -> Option<Self> {
		match dialect {
			SIMPLE_DIALECT => Some(Self::Simple),
			CONCRETE_DIALECT => Some(Self::Concrete),
			FULL_DIALECT => Some(Self::Full),
			short if short.eq_ignore_ascii_case("simple") => Some(Self::Simple),
			short if short.eq_ignore_ascii_case("concrete") => Some(Self::Concrete),
			short if short.eq_ignore_ascii_case("full") => Some(Self::Full),
			_ => None,
		}
	}
	pub fn uri(self) -> &'static str {
		match self {
			Dialect::Simple => SIMPLE_DIALECT,
			Dialect::Concrete => CONCRETE_DIALECT,
			Dialect::Full => FULL_DIALECT,
		}
	}
	pub const ALL: [Dialect; 3] = [Dialect::Simple, Dialect::Concrete, Dialect::Full];
}

/// One step of a full dialect topic pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
	Name(String),
	/// `*`
	Any,
	/// `//`, zero or more steps
	Descendants,
}

/// A validated topic expression, ready to be matched against topic paths
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicMatcher {
	Exact(String),
	/// Any of the patterns matches
	Patterns(Vec<Vec<Step>>),
}

impl TopicMatcher {
	pub fn compile(expression: &TopicExpression) -> Result<Self, FilterError> {
		let dialect = Dialect::from_uri(&expression.dialect)
			.ok_or_else(|| FilterError::DialectUnknown(expression.dialect.clone()))?;
		let text = expression.expression.trim();

		match dialect {
			Dialect::Simple | Dialect::Concrete => {
				if text.contains('|') {
					return Err(FilterError::MultipleTopicsSpecified(text.to_owned()));
				}
				if text.contains('*') || text.contains("//") {
					return Err(invalid(text, "wildcards require the full dialect"));
				}
				validate_path(text)?;

				Ok(Self::Exact(text.to_owned()))
			}
			Dialect::Full => {
				let patterns = text
					.split('|')
					.map(|path| parse_pattern(path.trim()))
					.collect::<Result<Vec<_>, _>>()?;

				Ok(Self::Patterns(patterns))
			}
		}
	}
	pub fn matches(&self, topic: &str) -> bool {
		match self {
			TopicMatcher::Exact(path) => path == topic,
			TopicMatcher::Patterns(patterns) => {
				let steps: Vec<&str> = topic.split('/').collect();
				patterns.iter().any(|pattern| match_steps(pattern, &steps))
			}
		}
	}
	/// `Some` if this expression names exactly one concrete topic
	pub fn as_single_topic(&self) -> Option<&str> {
		match self {
			TopicMatcher::Exact(path) => Some(path),
			TopicMatcher::Patterns(_) => None,
		}
	}
}

fn invalid(expression: &str, reason: &'static str) -> FilterError {
	FilterError::InvalidTopicExpression {
		expression: expression.to_owned(),
		reason,
	}
}

fn validate_step(expression: &str, step: &str) -> Result<(), FilterError> {
	if step.is_empty() {
		return Err(invalid(expression, "empty topic step"));
	}
	let valid = step
		.chars()
		.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ':'));
	if !valid || step.starts_with(':') || step.ends_with(':') {
		return Err(invalid(expression, "illegal character in topic step"));
	}

	Ok(())
}

fn validate_path(expression: &str) -> Result<(), FilterError> {
	if expression.is_empty() {
		return Err(invalid(expression, "empty topic expression"));
	}
	for step in expression.split('/') {
		validate_step(expression, step)?;
	}

	Ok(())
}

fn parse_pattern(path: &str) -> Result<Vec<Step>, FilterError> {
	if path.is_empty() {
		return Err(invalid(path, "empty topic expression"));
	}
	if path.starts_with('/') {
		return Err(invalid(path, "topic expression must start with a root topic"));
	}

	let mut steps = Vec::new();
	for (i, part) in path.split("//").enumerate() {
		if i > 0 {
			steps.push(Step::Descendants);
			// `a//.` means `a` and everything below it
			if part == "." {
				continue;
			}
		}
		for step in part.split('/') {
			if step == "*" {
				steps.push(Step::Any);
			} else if step == "." {
				return Err(invalid(path, "`.` is only allowed as `//.` at the end"));
			} else {
				validate_step(path, step)?;
				steps.push(Step::Name(step.to_owned()));
			}
		}
	}

	Ok(steps)
}

/// Walks the topic once, tracking every pattern position that can be reached.
/// Linear in `pattern.len() * topic.len()` however many `//` the pattern has.
fn match_steps(pattern: &[Step], topic: &[&str]) -> bool {
	// reached[i]: the first i pattern steps consumed the topic steps seen so far
	let mut reached = vec![false; pattern.len() + 1];
	reached[0] = true;
	skip_descendants(pattern, &mut reached);

	for step in topic {
		let mut next = vec![false; pattern.len() + 1];
		for (i, pattern_step) in pattern.iter().enumerate() {
			if !reached[i] {
				continue;
			}
			match pattern_step {
				// consumes the step and may consume more
				Step::Descendants => next[i] = true,
				Step::Any => next[i + 1] = true,
				Step::Name(name) => {
					if name == step {
						next[i + 1] = true;
					}
				}
			}
		}
		skip_descendants(pattern, &mut next);
		reached = next;
	}

	reached[pattern.len()]
}

// `//` may also match zero steps
fn skip_descendants(pattern: &[Step], reached: &mut [bool]) {
	for (i, step) in pattern.iter().enumerate() {
		if reached[i] && *step == Step::Descendants {
			reached[i + 1] = true;
		}
	}
}

/// The topics this service produces messages on.
///
/// An empty set means the set is open and any valid expression is accepted.
#[derive(Debug, Clone, Default)]
pub struct TopicSet {
	topics: Vec<TopicDescription>,
}

impl TopicSet {
	pub fn new(topics: Vec<TopicDescription>) -> Self {
		Self { topics }
	}
	pub fn is_fixed(&self) -> bool {
		!self.topics.is_empty()
	}
	pub fn topics(&self) -> &[TopicDescription] {
		&self.topics
	}
	/// Fails with [`FilterError::TopicNotSupported`] if the set is fixed and
	/// the expression matches none of its topics
	pub fn check_supported(
		&self,
		expression: &TopicExpression,
		matcher: &TopicMatcher,
	) -> Result<(), FilterError> {
		if !self.is_fixed() || self.topics.iter().any(|t| matcher.matches(&t.path)) {
			Ok(())
		} else {
			Err(FilterError::TopicNotSupported(expression.expression.clone()))
		}
	}
	pub fn is_property(&self, topic: &str) -> bool {
		self.topics.iter().any(|t| t.property && t.path == topic)
	}
}
