//! Recursive-descent parser over the token stream. This grammar is small enough to live in a single module rather
//! than split across `expressions`/`statements` submodules.

use std::collections::VecDeque;

use crate::{
	ast::{
		ArrayAccess, ArrayType, AssignmentStatement, AssignmentTarget, Block, CompoundStatement, Declaration, Expression, ForDirection, ForStatement, FunctionCall, FunctionDeclaration, Identifier,
		IfStatement, IoCall, IoOperation, Literal, LiteralValue, Parameter, ProcedureDeclaration, Program, ProgramHeader, Statement, TypeNode, UnaryOperator, VariableDeclaration, VariableGroup,
		WhileStatement,
	},
	token::{Token, TokenKind},
};

/// A `VecDeque<Token>` viewed as a queue, with `peek`/`advance`/`expect` returning `anyhow::Result` uniformly (via
/// `CompileError`) so every call site handles failure the same way.
struct TokenStream {
	tokens: VecDeque<Token>,
}

impl TokenStream {
	fn peek(&self) -> Option<&Token> {
		self.tokens.front()
	}

	fn current_line(&self) -> usize {
		self.peek().map_or(0, |token| token.line)
	}

	fn next_is(&self, kind: TokenKind) -> bool {
		self.peek().is_some_and(|token| token.kind == kind)
	}

	fn advance(&mut self) -> anyhow::Result<Token> {
		self.tokens.pop_front().ok_or_else(|| anyhow::anyhow!(crate::error::CompileError::syntax(0, "unexpected end of file")))
	}

	/// Consumes and returns the next token if it matches `kind`, else raises a syntax error.
	fn expect(&mut self, kind: TokenKind) -> anyhow::Result<Token> {
		match self.peek() {
			Some(token) if token.kind == kind => self.advance(),
			Some(token) => Err(anyhow::anyhow!(crate::error::CompileError::syntax(token.line, format!("expected {kind} but found {} ({:?})", token.kind, token.value)))),
			None => Err(anyhow::anyhow!(crate::error::CompileError::syntax(0, format!("expected {kind} but found end of file")))),
		}
	}
}

/// Parses a complete token stream into a `Program`.
///
/// # Errors
/// Returns an error describing the offending token, its value, and its line on the first syntax error; no
/// recovery is attempted (§4.B).
pub fn parse(tokens: VecDeque<Token>) -> anyhow::Result<Program> {
	let mut stream = TokenStream { tokens };
	let program = parse_program(&mut stream)?;
	if let Some(token) = stream.peek() {
		anyhow::bail!(crate::error::CompileError::syntax(token.line, format!("unexpected trailing {} after program", token.kind)));
	}
	Ok(program)
}

fn parse_program(stream: &mut TokenStream) -> anyhow::Result<Program> {
	stream.expect(TokenKind::KeywordProgram)?;
	let name_token = stream.expect(TokenKind::Identifier)?;
	let line = name_token.line;

	let mut id_list = Vec::new();
	if stream.next_is(TokenKind::LeftParenthesis) {
		stream.advance()?;
		id_list = parse_id_list(stream)?;
		stream.expect(TokenKind::RightParenthesis)?;
	}
	stream.expect(TokenKind::Semicolon)?;

	let block = parse_block(stream)?;
	stream.expect(TokenKind::Dot)?;

	Ok(Program { header: ProgramHeader { name: name_token.value, id_list, line }, block })
}

fn parse_id_list(stream: &mut TokenStream) -> anyhow::Result<Vec<String>> {
	let mut ids = vec![stream.expect(TokenKind::Identifier)?.value];
	while stream.next_is(TokenKind::Comma) {
		stream.advance()?;
		ids.push(stream.expect(TokenKind::Identifier)?.value);
	}
	Ok(ids)
}

fn parse_block(stream: &mut TokenStream) -> anyhow::Result<Block> {
	let mut declarations = Vec::new();
	loop {
		if stream.next_is(TokenKind::KeywordVar) {
			declarations.push(Declaration::Variable(parse_var_decl(stream)?));
		} else if stream.next_is(TokenKind::KeywordFunction) {
			declarations.push(Declaration::Function(parse_func_decl(stream)?));
		} else if stream.next_is(TokenKind::KeywordProcedure) {
			declarations.push(Declaration::Procedure(parse_proc_decl(stream)?));
		} else {
			break;
		}
	}
	let compound = parse_compound(stream)?;
	Ok(Block { declarations, compound })
}

fn parse_var_decl(stream: &mut TokenStream) -> anyhow::Result<VariableDeclaration> {
	stream.expect(TokenKind::KeywordVar)?;
	let mut groups = vec![parse_var_item(stream)?];
	stream.expect(TokenKind::Semicolon)?;
	while stream.next_is(TokenKind::Identifier) {
		groups.push(parse_var_item(stream)?);
		stream.expect(TokenKind::Semicolon)?;
	}
	Ok(VariableDeclaration { groups })
}

fn parse_var_item(stream: &mut TokenStream) -> anyhow::Result<VariableGroup> {
	let line = stream.current_line();
	let ids = parse_id_list(stream)?;
	stream.expect(TokenKind::Colon)?;
	let type_node = parse_type(stream)?;
	Ok(VariableGroup { ids, type_node, line })
}

fn parse_type(stream: &mut TokenStream) -> anyhow::Result<TypeNode> {
	let line = stream.current_line();
	if stream.next_is(TokenKind::KeywordArray) {
		stream.advance()?;
		stream.expect(TokenKind::LeftBracket)?;
		let lower = parse_array_bound(stream)?;
		stream.expect(TokenKind::DotDot)?;
		let upper = parse_array_bound(stream)?;
		stream.expect(TokenKind::RightBracket)?;
		stream.expect(TokenKind::KeywordOf)?;
		let element_type_name = type_node_name(&parse_type(stream)?);
		return Ok(TypeNode::Array(ArrayType { lower, upper, element_type_name, line }));
	}

	let token = stream.advance()?;
	let name = match token.kind {
		TokenKind::Identifier | TokenKind::KeywordInteger | TokenKind::KeywordReal | TokenKind::KeywordBoolean | TokenKind::KeywordChar | TokenKind::KeywordString => token.value,
		_ => anyhow::bail!(crate::error::CompileError::syntax(token.line, format!("expected a type name but found {}", token.kind))),
	};
	Ok(TypeNode::Named(name))
}

/// An inline copy of `types::type_node_name` for `Named` nodes only, avoiding a dependency from the parser on a
/// module whose real job is serving the semantic/codegen passes; kept trivial on purpose.
fn type_node_name(type_node: &TypeNode) -> String {
	match type_node {
		TypeNode::Named(name) => name.to_uppercase(),
		TypeNode::Array(_) => "ARRAY".to_owned(),
	}
}

/// Parses an array bound: an optional leading `-` followed by an integer literal (§4.B: "negative bounds may
/// appear via unary minus before parsing of literals").
fn parse_array_bound(stream: &mut TokenStream) -> anyhow::Result<i64> {
	let negative = if stream.next_is(TokenKind::Minus) {
		stream.advance()?;
		true
	} else {
		false
	};
	let token = stream.expect(TokenKind::Integer)?;
	let magnitude: i64 = token.value.parse().map_err(|_| anyhow::anyhow!(crate::error::CompileError::syntax(token.line, format!("'{}' is not a valid integer array bound", token.value))))?;
	Ok(if negative { -magnitude } else { magnitude })
}

fn parse_func_decl(stream: &mut TokenStream) -> anyhow::Result<FunctionDeclaration> {
	stream.expect(TokenKind::KeywordFunction)?;
	let name_token = stream.expect(TokenKind::Identifier)?;
	let params = parse_param_list(stream)?;
	stream.expect(TokenKind::Colon)?;
	let return_type_name = type_node_name(&parse_type(stream)?);
	stream.expect(TokenKind::Semicolon)?;
	let block = parse_block(stream)?;
	stream.expect(TokenKind::Semicolon)?;
	Ok(FunctionDeclaration { name: name_token.value, params, return_type_name, block, line: name_token.line })
}

/// A procedure declaration's trailing `;` after `block` is required even though `block` already ends in `end`
/// (§4.B; preserved per the original grammar, DESIGN.md).
fn parse_proc_decl(stream: &mut TokenStream) -> anyhow::Result<ProcedureDeclaration> {
	stream.expect(TokenKind::KeywordProcedure)?;
	let name_token = stream.expect(TokenKind::Identifier)?;
	let params = parse_param_list(stream)?;
	stream.expect(TokenKind::Semicolon)?;
	let block = parse_block(stream)?;
	stream.expect(TokenKind::Semicolon)?;
	Ok(ProcedureDeclaration { name: name_token.value, params, block, line: name_token.line })
}

fn parse_param_list(stream: &mut TokenStream) -> anyhow::Result<Vec<Parameter>> {
	if !stream.next_is(TokenKind::LeftParenthesis) {
		return Ok(Vec::new());
	}
	stream.advance()?;
	let mut params = vec![parse_param_sec(stream)?];
	while stream.next_is(TokenKind::Semicolon) {
		stream.advance()?;
		params.push(parse_param_sec(stream)?);
	}
	stream.expect(TokenKind::RightParenthesis)?;
	Ok(params)
}

fn parse_param_sec(stream: &mut TokenStream) -> anyhow::Result<Parameter> {
	let line = stream.current_line();
	let is_var = if stream.next_is(TokenKind::KeywordVar) {
		stream.advance()?;
		true
	} else {
		false
	};
	let ids = parse_id_list(stream)?;
	stream.expect(TokenKind::Colon)?;
	let type_node = parse_type(stream)?;
	Ok(Parameter { ids, type_node, is_var, line })
}

fn parse_compound(stream: &mut TokenStream) -> anyhow::Result<CompoundStatement> {
	stream.expect(TokenKind::KeywordBegin)?;
	let mut statements = vec![parse_statement(stream)?];
	while stream.next_is(TokenKind::Semicolon) {
		stream.advance()?;
		statements.push(parse_statement(stream)?);
	}
	stream.expect(TokenKind::KeywordEnd)?;
	Ok(CompoundStatement { statements })
}

fn parse_statement(stream: &mut TokenStream) -> anyhow::Result<Statement> {
	let Some(token) = stream.peek() else {
		return Ok(Statement::Empty);
	};

	match token.kind {
		TokenKind::KeywordBegin => Ok(Statement::Compound(parse_compound(stream)?)),
		TokenKind::KeywordIf => Ok(Statement::If(parse_if(stream)?)),
		TokenKind::KeywordWhile => Ok(Statement::While(parse_while(stream)?)),
		TokenKind::KeywordFor => Ok(Statement::For(parse_for(stream)?)),
		TokenKind::KeywordWrite | TokenKind::KeywordWriteln | TokenKind::KeywordRead | TokenKind::KeywordReadln => Ok(Statement::Io(parse_io_call(stream)?)),
		TokenKind::Identifier => parse_identifier_led_statement(stream),
		TokenKind::Semicolon | TokenKind::KeywordEnd => Ok(Statement::Empty),
		_ => Ok(Statement::Expression(parse_expression(stream)?)),
	}
}

/// Disambiguates an `ID`-led statement between an assignment (possibly to an array element) and a bare expression
/// statement (a procedure call with no further use, e.g. `foo(1, 2);`).
fn parse_identifier_led_statement(stream: &mut TokenStream) -> anyhow::Result<Statement> {
	let name_token = stream.expect(TokenKind::Identifier)?;
	let line = name_token.line;

	if stream.next_is(TokenKind::LeftBracket) {
		let mut target = Expression::Identifier(Identifier { name: name_token.value, line });
		while stream.next_is(TokenKind::LeftBracket) {
			stream.advance()?;
			let index = parse_expression(stream)?;
			stream.expect(TokenKind::RightBracket)?;
			target = Expression::ArrayAccess(ArrayAccess { array: Box::new(target), index: Box::new(index), line });
		}
		stream.expect(TokenKind::Assign)?;
		let expression = parse_expression(stream)?;
		let Expression::ArrayAccess(array_access) = target else {
			unreachable!("loop above only produces ArrayAccess nodes");
		};
		return Ok(Statement::Assignment(AssignmentStatement { target: AssignmentTarget::ArrayAccess(array_access), expression, line }));
	}

	if stream.next_is(TokenKind::Assign) {
		stream.advance()?;
		let expression = parse_expression(stream)?;
		return Ok(Statement::Assignment(AssignmentStatement { target: AssignmentTarget::Identifier(name_token.value), expression, line }));
	}

	if stream.next_is(TokenKind::LeftParenthesis) {
		stream.advance()?;
		let args = parse_expr_list(stream)?;
		stream.expect(TokenKind::RightParenthesis)?;
		return Ok(Statement::Expression(Expression::Call(FunctionCall { name: name_token.value, args, line })));
	}

	Ok(Statement::Expression(Expression::Identifier(Identifier { name: name_token.value, line })))
}

fn parse_if(stream: &mut TokenStream) -> anyhow::Result<IfStatement> {
	let line = stream.expect(TokenKind::KeywordIf)?.line;
	let condition = parse_expression(stream)?;
	stream.expect(TokenKind::KeywordThen)?;
	let then_branch = Box::new(parse_statement(stream)?);
	let else_branch = if stream.next_is(TokenKind::KeywordElse) {
		stream.advance()?;
		Some(Box::new(parse_statement(stream)?))
	} else {
		None
	};
	Ok(IfStatement { condition, then_branch, else_branch, line })
}

fn parse_while(stream: &mut TokenStream) -> anyhow::Result<WhileStatement> {
	let line = stream.expect(TokenKind::KeywordWhile)?.line;
	let condition = parse_expression(stream)?;
	stream.expect(TokenKind::KeywordDo)?;
	let body = Box::new(parse_statement(stream)?);
	Ok(WhileStatement { condition, body, line })
}

fn parse_for(stream: &mut TokenStream) -> anyhow::Result<ForStatement> {
	let line = stream.expect(TokenKind::KeywordFor)?.line;
	let variable = stream.expect(TokenKind::Identifier)?.value;
	stream.expect(TokenKind::Assign)?;
	let from = parse_expression(stream)?;
	let direction = if stream.next_is(TokenKind::KeywordDownto) {
		stream.advance()?;
		ForDirection::Downto
	} else {
		stream.expect(TokenKind::KeywordTo)?;
		ForDirection::To
	};
	let to = parse_expression(stream)?;
	stream.expect(TokenKind::KeywordDo)?;
	let body = Box::new(parse_statement(stream)?);
	Ok(ForStatement { variable, from, to, direction, body, line })
}

fn parse_io_call(stream: &mut TokenStream) -> anyhow::Result<IoCall> {
	let token = stream.advance()?;
	let operation = match token.kind {
		TokenKind::KeywordWrite => IoOperation::Write,
		TokenKind::KeywordWriteln => IoOperation::Writeln,
		TokenKind::KeywordRead => IoOperation::Read,
		TokenKind::KeywordReadln => IoOperation::Readln,
		_ => unreachable!("caller only dispatches here for the four I/O keyword kinds"),
	};
	let mut args = Vec::new();
	if stream.next_is(TokenKind::LeftParenthesis) {
		stream.advance()?;
		args = parse_expr_list(stream)?;
		stream.expect(TokenKind::RightParenthesis)?;
	}
	Ok(IoCall { operation, args, line: token.line })
}

fn parse_expr_list(stream: &mut TokenStream) -> anyhow::Result<Vec<Expression>> {
	if stream.next_is(TokenKind::RightParenthesis) {
		return Ok(Vec::new());
	}
	let mut args = vec![parse_expression(stream)?];
	while stream.next_is(TokenKind::Comma) {
		stream.advance()?;
		args.push(parse_expression(stream)?);
	}
	Ok(args)
}

/// `expression = additive { relop additive }` (non-associative in principle, left-folded here since the grammar
/// never nests a relational result back into another relational operand in this subset).
fn parse_expression(stream: &mut TokenStream) -> anyhow::Result<Expression> {
	let mut left = parse_additive(stream)?;
	while let Some(operator) = relational_operator(stream) {
		let line = stream.advance()?.line;
		let right = parse_additive(stream)?;
		left = Expression::Binary(crate::ast::BinaryOperation { left: Box::new(left), operator, right: Box::new(right), line });
	}
	Ok(left)
}

fn relational_operator(stream: &TokenStream) -> Option<crate::ast::BinaryOperator> {
	use crate::ast::BinaryOperator;
	match stream.peek()?.kind {
		TokenKind::Equal => Some(BinaryOperator::Equal),
		TokenKind::NotEqual => Some(BinaryOperator::NotEqual),
		TokenKind::LessThan => Some(BinaryOperator::LessThan),
		TokenKind::LessEqual => Some(BinaryOperator::LessEqual),
		TokenKind::GreaterThan => Some(BinaryOperator::GreaterThan),
		TokenKind::GreaterEqual => Some(BinaryOperator::GreaterEqual),
		_ => None,
	}
}

/// `additive = multiplicative { (+|-|OR|ORELSE) multiplicative }`.
fn parse_additive(stream: &mut TokenStream) -> anyhow::Result<Expression> {
	use crate::ast::BinaryOperator;
	let mut left = parse_multiplicative(stream)?;
	loop {
		let operator = match stream.peek().map(|token| token.kind) {
			Some(TokenKind::Plus) => BinaryOperator::Add,
			Some(TokenKind::Minus) => BinaryOperator::Subtract,
			Some(TokenKind::KeywordOr) => BinaryOperator::Or,
			Some(TokenKind::KeywordOrElse) => BinaryOperator::OrElse,
			_ => break,
		};
		let line = stream.advance()?.line;
		let right = parse_multiplicative(stream)?;
		left = Expression::Binary(crate::ast::BinaryOperation { left: Box::new(left), operator, right: Box::new(right), line });
	}
	Ok(left)
}

/// `multiplicative = factor { (*|/|DIV|MOD|AND|ANDTHEN) factor }`.
fn parse_multiplicative(stream: &mut TokenStream) -> anyhow::Result<Expression> {
	use crate::ast::BinaryOperator;
	let mut left = parse_factor(stream)?;
	loop {
		let operator = match stream.peek().map(|token| token.kind) {
			Some(TokenKind::Asterisk) => BinaryOperator::Multiply,
			Some(TokenKind::Slash) => BinaryOperator::Divide,
			Some(TokenKind::KeywordDiv) => BinaryOperator::Div,
			Some(TokenKind::KeywordMod) => BinaryOperator::Mod,
			Some(TokenKind::KeywordAnd) => BinaryOperator::And,
			Some(TokenKind::KeywordAndThen) => BinaryOperator::AndThen,
			_ => break,
		};
		let line = stream.advance()?.line;
		let right = parse_factor(stream)?;
		left = Expression::Binary(crate::ast::BinaryOperation { left: Box::new(left), operator, right: Box::new(right), line });
	}
	Ok(left)
}

/// `factor = NUM | STRING | TRUE | FALSE | ID | '(' expression ')' | factor '[' expression ']'
/// | ID '(' [expr_list] ')' | '-' factor | NOT factor`. The postfix `'[' expression ']'` repetition is applied in a
/// loop after the primary factor is parsed, so `a[1][2]` (an array of arrays, out of this subset's scope but
/// harmless to accept syntactically) parses the same way nested calls would.
fn parse_factor(stream: &mut TokenStream) -> anyhow::Result<Expression> {
	let token = stream.peek().cloned().ok_or_else(|| anyhow::anyhow!(crate::error::CompileError::syntax(0, "expected an expression but found end of file")))?;

	let mut expression = match token.kind {
		TokenKind::Integer => {
			stream.advance()?;
			let value = token.value.parse().map_err(|_| anyhow::anyhow!(crate::error::CompileError::syntax(token.line, format!("'{}' is not a valid integer literal", token.value))))?;
			Expression::Literal(Literal { value: LiteralValue::Integer(value), line: token.line })
		}
		TokenKind::Real => {
			stream.advance()?;
			let value = token.value.parse().map_err(|_| anyhow::anyhow!(crate::error::CompileError::syntax(token.line, format!("'{}' is not a valid real literal", token.value))))?;
			Expression::Literal(Literal { value: LiteralValue::Real(value), line: token.line })
		}
		TokenKind::StringLiteral => {
			stream.advance()?;
			Expression::Literal(Literal { value: LiteralValue::String(token.value), line: token.line })
		}
		TokenKind::Identifier if token.value == "true" => {
			stream.advance()?;
			Expression::Literal(Literal { value: LiteralValue::Boolean(true), line: token.line })
		}
		TokenKind::Identifier if token.value == "false" => {
			stream.advance()?;
			Expression::Literal(Literal { value: LiteralValue::Boolean(false), line: token.line })
		}
		TokenKind::Identifier => {
			stream.advance()?;
			if stream.next_is(TokenKind::LeftParenthesis) {
				stream.advance()?;
				let args = parse_expr_list(stream)?;
				stream.expect(TokenKind::RightParenthesis)?;
				Expression::Call(FunctionCall { name: token.value, args, line: token.line })
			} else {
				Expression::Identifier(Identifier { name: token.value, line: token.line })
			}
		}
		TokenKind::LeftParenthesis => {
			stream.advance()?;
			let inner = parse_expression(stream)?;
			stream.expect(TokenKind::RightParenthesis)?;
			inner
		}
		TokenKind::Minus => {
			stream.advance()?;
			let operand = Box::new(parse_factor(stream)?);
			Expression::Unary(crate::ast::UnaryOperation { operator: UnaryOperator::Minus, operand, line: token.line })
		}
		TokenKind::KeywordNot => {
			stream.advance()?;
			let operand = Box::new(parse_factor(stream)?);
			Expression::Unary(crate::ast::UnaryOperation { operator: UnaryOperator::Not, operand, line: token.line })
		}
		_ => anyhow::bail!(crate::error::CompileError::syntax(token.line, format!("unexpected {} ({:?}) while parsing an expression", token.kind, token.value))),
	};

	while stream.next_is(TokenKind::LeftBracket) {
		let line = stream.advance()?.line;
		let index = parse_expression(stream)?;
		stream.expect(TokenKind::RightBracket)?;
		expression = Expression::ArrayAccess(ArrayAccess { array: Box::new(expression), index: Box::new(index), line });
	}

	Ok(expression)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::lexer::tokenize;

	fn parse_source(source: &str) -> anyhow::Result<Program> {
		parse(tokenize(source)?)
	}

	#[test]
	fn parses_minimal_program() {
		let program = parse_source("program P; begin end.").unwrap();
		assert_eq!(program.header.name, "p");
		assert!(program.block.declarations.is_empty());
	}

	#[test]
	fn parses_program_header_identifier_list() {
		let program = parse_source("program P(input, output); begin end.").unwrap();
		assert_eq!(program.header.id_list, vec!["input", "output"]);
	}

	#[test]
	fn parses_var_decl_with_multiple_groups() {
		let program = parse_source("program P; var a, b: Integer; c: Real; begin end.").unwrap();
		let Declaration::Variable(declaration) = &program.block.declarations[0] else { panic!("expected a variable declaration") };
		assert_eq!(declaration.groups.len(), 2);
		assert_eq!(declaration.groups[0].ids, vec!["a", "b"]);
	}

	#[test]
	fn parses_array_type_with_literal_bounds() {
		let program = parse_source("program P; var a: array [1..10] of Integer; begin end.").unwrap();
		let Declaration::Variable(declaration) = &program.block.declarations[0] else { panic!("expected a variable declaration") };
		let TypeNode::Array(array_type) = &declaration.groups[0].type_node else { panic!("expected an array type") };
		assert_eq!((array_type.lower, array_type.upper), (1, 10));
	}

	#[test]
	fn parses_assignment_and_array_assignment() {
		let program = parse_source("program P; var a: array [1..3] of Integer; x: Integer; begin x := 1; a[2] := 7 end.").unwrap();
		assert_eq!(program.block.compound.statements.len(), 2);
		assert!(matches!(program.block.compound.statements[1], Statement::Assignment(AssignmentStatement { target: AssignmentTarget::ArrayAccess(_), .. })));
	}

	#[test]
	fn dangling_else_binds_to_nearest_then() {
		let program = parse_source("program P; var x: Boolean; begin if x then if x then x := true else x := false end.").unwrap();
		let Statement::If(outer) = &program.block.compound.statements[0] else { panic!("expected an if statement") };
		let Statement::If(inner) = outer.then_branch.as_ref() else { panic!("expected a nested if statement") };
		assert!(inner.else_branch.is_some());
		assert!(outer.else_branch.is_none());
	}

	#[test]
	fn parses_for_loop_with_downto() {
		let program = parse_source("program P; var i: Integer; begin for i := 10 downto 1 do i := i end.").unwrap();
		let Statement::For(for_statement) = &program.block.compound.statements[0] else { panic!("expected a for statement") };
		assert_eq!(for_statement.direction, ForDirection::Downto);
	}

	#[test]
	fn respects_operator_precedence() {
		let program = parse_source("program P; var x: Integer; begin x := 1 + 2 * 3 end.").unwrap();
		let Statement::Assignment(assignment) = &program.block.compound.statements[0] else { panic!("expected an assignment") };
		let Expression::Binary(binary) = &assignment.expression else { panic!("expected a binary expression") };
		assert_eq!(binary.operator, crate::ast::BinaryOperator::Add);
		assert!(matches!(binary.right.as_ref(), Expression::Binary(inner) if inner.operator == crate::ast::BinaryOperator::Multiply));
	}

	#[test]
	fn parses_function_and_procedure_declarations() {
		let program = parse_source(
			"program P;\n\
			 function Square(n: Integer): Integer;\n\
			 begin Square := n * n end;\n\
			 procedure Swap(var a, b: Integer);\n\
			 begin end;\n\
			 begin end.",
		)
		.unwrap();
		assert_eq!(program.block.declarations.len(), 2);
		assert!(matches!(program.block.declarations[0], Declaration::Function(_)));
		assert!(matches!(program.block.declarations[1], Declaration::Procedure(_)));
	}

	#[test]
	fn true_and_false_parse_as_boolean_literals() {
		let program = parse_source("program P; var x: Boolean; begin x := true end.").unwrap();
		let Statement::Assignment(assignment) = &program.block.compound.statements[0] else { panic!("expected an assignment") };
		assert!(matches!(assignment.expression, Expression::Literal(Literal { value: LiteralValue::Boolean(true), .. })));
	}

	#[test]
	fn rejects_unexpected_token_with_line_number() {
		let error = parse_source("program P; begin x := end.").unwrap_err();
		assert!(error.to_string().contains("Line 1"));
	}
}
