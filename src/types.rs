//! Shared type-name helpers used by both the semantic analyzer and the code generator: rendering an AST `TypeNode`
//! as a canonical type tag, and the type-combination rules for binary/unary operators. Grounded in
//! `vm_assembly/type_helpers.py`'s `resolve_type`/`combine_types` functions from the original implementation.

use crate::ast::{BinaryOperator, TypeNode, UnaryOperator};

pub const INTEGER: &str = "INTEGER";
pub const REAL: &str = "REAL";
pub const BOOLEAN: &str = "BOOLEAN";
pub const CHAR: &str = "CHAR";
pub const STRING: &str = "STRING";

/// Renders a `TypeNode` as its canonical upper-case tag. For an array type this is always `ARRAY`; the element type
/// is tracked separately on the `Symbol` (§3, `Symbol.element_type`).
#[must_use]
pub fn type_node_name(type_node: &TypeNode) -> String {
	match type_node {
		TypeNode::Named(name) => name.to_uppercase(),
		TypeNode::Array(_) => "ARRAY".to_owned(),
	}
}

/// Whether `name` (already upper-cased) denotes a known scalar type.
#[must_use]
pub fn is_known_scalar_type(name: &str) -> bool {
	matches!(name, INTEGER | REAL | BOOLEAN | CHAR | STRING)
}

/// Whether a value of `from` can be assigned to a variable of `to_type` without an explicit conversion. The only
/// permitted coercion is `INTEGER` -> `REAL` (§4.C, "Assignment compatibility").
#[must_use]
pub fn is_assignable(from: &str, to_type: &str) -> bool {
	from == to_type || (from == INTEGER && to_type == REAL)
}

/// The result type of applying `operator` to two operands of types `left` and `right`, or `None` if the combination
/// is not permitted (§4.C, "Expression typing").
///
/// `/` (real division) always yields `REAL`, even for two `INTEGER` operands; `div`/`mod` require both operands to
/// be `INTEGER` and yield `INTEGER`; comparisons yield `BOOLEAN` for any pair of numeric operands (with the usual
/// `INTEGER`/`REAL` mixing) or for two operands of the same non-numeric type; `and`/`or`/`andthen`/`orelse` require
/// both operands to be `BOOLEAN`.
#[must_use]
pub fn combine_binary(operator: BinaryOperator, left: &str, right: &str) -> Option<String> {
	let both_numeric = matches!(left, INTEGER | REAL) && matches!(right, INTEGER | REAL);
	match operator {
		BinaryOperator::Add | BinaryOperator::Subtract | BinaryOperator::Multiply if both_numeric => {
			Some(if left == REAL || right == REAL { REAL } else { INTEGER }.to_owned())
		}
		BinaryOperator::Divide if both_numeric => Some(REAL.to_owned()),
		BinaryOperator::Div | BinaryOperator::Mod if left == INTEGER && right == INTEGER => Some(INTEGER.to_owned()),
		BinaryOperator::Equal | BinaryOperator::NotEqual | BinaryOperator::LessThan | BinaryOperator::LessEqual | BinaryOperator::GreaterThan | BinaryOperator::GreaterEqual => {
			if both_numeric || left == right {
				Some(BOOLEAN.to_owned())
			} else {
				None
			}
		}
		BinaryOperator::And | BinaryOperator::AndThen | BinaryOperator::Or | BinaryOperator::OrElse if left == BOOLEAN && right == BOOLEAN => Some(BOOLEAN.to_owned()),
		_ => None,
	}
}

/// The result type of applying a unary `operator` to an operand of type `operand_type`.
#[must_use]
pub fn combine_unary(operator: UnaryOperator, operand_type: &str) -> Option<String> {
	match operator {
		UnaryOperator::Plus | UnaryOperator::Minus if matches!(operand_type, INTEGER | REAL) => Some(operand_type.to_owned()),
		UnaryOperator::Not if operand_type == BOOLEAN => Some(BOOLEAN.to_owned()),
		_ => None,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn integer_widens_to_real_but_not_the_reverse() {
		assert!(is_assignable(INTEGER, REAL));
		assert!(!is_assignable(REAL, INTEGER));
	}

	#[test]
	fn division_always_yields_real() {
		assert_eq!(combine_binary(BinaryOperator::Divide, INTEGER, INTEGER).as_deref(), Some(REAL));
	}

	#[test]
	fn div_and_mod_require_both_operands_integer() {
		assert_eq!(combine_binary(BinaryOperator::Div, INTEGER, INTEGER).as_deref(), Some(INTEGER));
		assert!(combine_binary(BinaryOperator::Div, REAL, INTEGER).is_none());
	}

	#[test]
	fn comparisons_of_mixed_numeric_types_are_allowed() {
		assert_eq!(combine_binary(BinaryOperator::LessThan, INTEGER, REAL).as_deref(), Some(BOOLEAN));
	}

	#[test]
	fn comparisons_across_unrelated_types_are_rejected() {
		assert!(combine_binary(BinaryOperator::Equal, BOOLEAN, STRING).is_none());
	}

	#[test]
	fn logical_operators_require_boolean_operands() {
		assert!(combine_binary(BinaryOperator::And, INTEGER, BOOLEAN).is_none());
		assert_eq!(combine_binary(BinaryOperator::And, BOOLEAN, BOOLEAN).as_deref(), Some(BOOLEAN));
	}
}
