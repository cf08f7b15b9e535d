//! Filter evaluation
//!
//! A [`CompiledFilter`] is built once when a subscription or pull point is created and
//! is then only read, so [`matches`] can be called from any number of tasks at once.
//!
//! Message content and producer properties expressions use the JSON pointer dialect:
//!
//! ```text
//! /Data/State                 present, and neither null nor false
//! /Data/State = true          equal to a JSON literal
//! /Source/Token != "relay1"   not equal to a JSON literal (also true when absent)
//! /a and /b = 1               all clauses must hold
//! ```

use crate::{error::FilterError, topic::TopicMatcher, topic::TopicSet};
use protocol::types::{ContentExpression, Filter, JSON_POINTER_DIALECT, NotificationMessage};
use serde_json::{Value, json};

#[derive(Debug, Clone, PartialEq)]
enum Clause {
	Truthy(String),
	Equals(String, Value),
	NotEquals(String, Value),
}

/// A validated content predicate
#[derive(Debug, Clone, PartialEq)]
pub struct ContentPredicate {
	clauses: Vec<Clause>,
}

impl ContentPredicate {
	fn parse(expression: &str) -> Result<Self, &'static str> {
		let clauses = split_clauses(expression)?
			.into_iter()
			.map(parse_clause)
			.collect::<Result<Vec<_>, _>>()?;

		Ok(Self { clauses })
	}
	pub fn evaluate(&self, value: &Value) -> bool {
		self.clauses.iter().all(|clause| match clause {
			Clause::Truthy(pointer) => !matches!(
				value.pointer(pointer),
				None | Some(Value::Null) | Some(Value::Bool(false))
			),
			Clause::Equals(pointer, literal) => value.pointer(pointer) == Some(literal),
			Clause::NotEquals(pointer, literal) => value.pointer(pointer) != Some(literal),
		})
	}
}

/// splits on ` and ` outside of string literals
fn split_clauses(expression: &str) -> Result<Vec<&str>, &'static str> {
	let mut clauses = Vec::new();
	let mut in_string = false;
	let mut escaped = false;
	let mut start = 0;

	let bytes = expression.as_bytes();
	let mut i = 0;
	while i < bytes.len() {
		let b = bytes[i];
		if in_string {
			match (escaped, b) {
				(true, _) => escaped = false,
				(false, b'\\') => escaped = true,
				(false, b'"') => in_string = false,
				_ => {}
			}
		} else if b == b'"' {
			in_string = true;
		} else if bytes[i..].starts_with(b" and ") {
			clauses.push(expression[start..i].trim());
			i += " and ".len();
			start = i;
			continue;
		}
		i += 1;
	}
	if in_string {
		return Err("unterminated string literal");
	}
	clauses.push(expression[start..].trim());

	if clauses.iter().any(|c| c.is_empty()) {
		return Err("empty clause");
	}

	Ok(clauses)
}

fn parse_pointer(pointer: &str) -> Result<String, &'static str> {
	let pointer = pointer.trim();
	if !pointer.starts_with('/') {
		return Err("JSON pointer must start with `/`");
	}
	if pointer.contains(char::is_whitespace) {
		return Err("JSON pointer must not contain whitespace");
	}

	Ok(pointer.to_owned())
}

fn parse_literal(literal: &str) -> Result<Value, &'static str> {
	serde_json::from_str(literal.trim()).map_err(|_| "right hand side is not a JSON literal")
}

fn parse_clause(clause: &str) -> Result<Clause, &'static str> {
	// the pointer never contains `=`, so the first one is the operator
	match clause.find('=') {
		None => Ok(Clause::Truthy(parse_pointer(clause)?)),
		Some(i) if i > 0 && clause.as_bytes()[i - 1] == b'!' => Ok(Clause::NotEquals(
			parse_pointer(&clause[..i - 1])?,
			parse_literal(&clause[i + 1..])?,
		)),
		Some(i) => Ok(Clause::Equals(
			parse_pointer(&clause[..i])?,
			parse_literal(&clause[i + 1..])?,
		)),
	}
}

fn is_json_pointer_dialect(dialect: &str) -> bool {
	dialect == JSON_POINTER_DIALECT || dialect.eq_ignore_ascii_case("json-pointer")
}

/// A validated [`Filter`]
#[derive(Debug, Clone, Default)]
pub struct CompiledFilter {
	topic: Option<TopicMatcher>,
	producer_properties: Option<ContentPredicate>,
	message_content: Option<ContentPredicate>,
}

impl CompiledFilter {
	/// Matches every message
	pub fn any() -> Self {
		Self::default()
	}
	/// Validates the filter, checking topics against the given topic set
	pub fn compile(filter: &Filter, topics: &TopicSet) -> Result<Self, FilterError> {
		let topic = match &filter.topic {
			Some(expression) => {
				let matcher = TopicMatcher::compile(expression)?;
				topics.check_supported(expression, &matcher)?;
				Some(matcher)
			}
			None => None,
		};

		let producer_properties = match &filter.producer_properties {
			Some(expression) => Some(compile_content(expression, |reason| {
				FilterError::InvalidProducerProperties {
					expression: expression.expression.clone(),
					reason,
				}
			})?),
			None => None,
		};

		let message_content = match &filter.message_content {
			Some(expression) => Some(compile_content(expression, |reason| {
				FilterError::InvalidMessageContent {
					expression: expression.expression.clone(),
					reason,
				}
			})?),
			None => None,
		};

		Ok(Self {
			topic,
			producer_properties,
			message_content,
		})
	}
}

fn compile_content<F>(
	expression: &ContentExpression,
	invalid: F,
) -> Result<ContentPredicate, FilterError>
where
	F: FnOnce(&'static str) -> FilterError,
{
	if !is_json_pointer_dialect(&expression.dialect) {
		return Err(FilterError::UnknownFilter(expression.dialect.clone()));
	}

	ContentPredicate::parse(&expression.expression).map_err(invalid)
}

/// Whether `message` passes every part of `filter`
pub fn matches(message: &NotificationMessage, filter: &CompiledFilter) -> bool {
	if let Some(topic) = &filter.topic {
		if !topic.matches(&message.topic) {
			return false;
		}
	}

	if let Some(producer_properties) = &filter.producer_properties {
		let properties = json!({ "address": message.producer_reference });
		if !producer_properties.evaluate(&properties) {
			return false;
		}
	}

	if let Some(message_content) = &filter.message_content {
		if !message_content.evaluate(&message.payload) {
			return false;
		}
	}

	true
}
