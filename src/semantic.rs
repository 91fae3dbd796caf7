//! Semantic analysis: a single recursive walk of the `Program` AST that builds nested scopes, resolves every
//! reference, and checks type agreement (§4.C). Builds and discards its own `ScopeArena`, entirely separate from
//! the one the code generator builds later (§9, "Two separate scope chains").

use crate::{
	ast::{
		AssignmentTarget, Block, CompoundStatement, Declaration, Expression, ForStatement, FunctionDeclaration, IfStatement, IoCall, IoOperation, LiteralValue, ProcedureDeclaration, Program,
		Statement, TypeNode, WhileStatement,
	},
	error::CompileError,
	symbol::{Address, ScopeArena, Symbol, SymbolKind},
	types,
};

/// The signature of a built-in callable registered into the root scope (§6).
struct BuiltinSignature {
	params: &'static [&'static str],
	return_type: &'static str,
}

/// Built-in callables, looked up by canonicalized (lower-case) name. Only `length`, `abs`, `sqr`, and no-argument
/// `writeln` have a code generator emission path (§4.D); the rest type-check here but are a documented codegen gap
/// (§9).
static BUILTINS: phf::Map<&'static str, BuiltinSignature> = phf::phf_map! {
	"length" => BuiltinSignature { params: &[types::STRING], return_type: types::INTEGER },
	"uppercase" => BuiltinSignature { params: &[types::STRING], return_type: types::STRING },
	"lowercase" => BuiltinSignature { params: &[types::STRING], return_type: types::STRING },
	"abs" => BuiltinSignature { params: &[types::INTEGER], return_type: types::INTEGER },
	"sqr" => BuiltinSignature { params: &[types::INTEGER], return_type: types::INTEGER },
	"sqrt" => BuiltinSignature { params: &[types::REAL], return_type: types::REAL },
	"pred" => BuiltinSignature { params: &[types::INTEGER], return_type: types::INTEGER },
	"succ" => BuiltinSignature { params: &[types::INTEGER], return_type: types::INTEGER },
};

struct SemanticAnalyzer {
	scopes: ScopeArena,
}

/// Checks `program` for declaration and type errors.
///
/// # Errors
/// Returns the first `CompileError` encountered, formatted as `Line N: message` (§4.C). No recovery is attempted;
/// analysis stops at the first error.
pub fn analyze(program: &Program) -> anyhow::Result<()> {
	let mut analyzer = SemanticAnalyzer { scopes: ScopeArena::new() };
	analyzer.register_builtins();
	for id in &program.header.id_list {
		analyzer.scopes.define(Symbol::scalar(id, "", SymbolKind::ProgramParam, Address::Offset(0), 0))?;
	}
	analyzer.visit_block(&program.block)
}

impl SemanticAnalyzer {
	fn register_builtins(&mut self) {
		for (name, signature) in &BUILTINS {
			let params_info = signature.params.iter().enumerate().map(|(index, param_type)| Symbol::scalar(format!("arg{index}"), *param_type, SymbolKind::Parameter, Address::Offset(0), 0)).collect();
			let mut symbol = Symbol::scalar(*name, signature.return_type, SymbolKind::Function, Address::Builtin((*name).to_uppercase()), 0);
			symbol.params_info = params_info;
			symbol.return_type = Some(signature.return_type.to_owned());
			self.scopes.define(symbol).expect("builtin names are distinct and the root scope starts empty");
		}
	}

	fn visit_block(&mut self, block: &Block) -> anyhow::Result<()> {
		for declaration in &block.declarations {
			self.visit_declaration(declaration)?;
		}
		self.visit_compound(&block.compound)
	}

	fn visit_declaration(&mut self, declaration: &Declaration) -> anyhow::Result<()> {
		match declaration {
			Declaration::Variable(variable_declaration) => {
				for group in &variable_declaration.groups {
					self.declare_variable_group(&group.ids, &group.type_node, group.line, SymbolKind::Variable, false)?;
				}
				Ok(())
			}
			Declaration::Function(function_declaration) => self.visit_function(function_declaration),
			Declaration::Procedure(procedure_declaration) => self.visit_procedure(procedure_declaration),
		}
	}

	/// Declares every id in `ids` as a symbol of `kind`, with `is_var_param` carried through for parameters.
	fn declare_variable_group(&mut self, ids: &[String], type_node: &TypeNode, line: usize, kind: SymbolKind, is_var_param: bool) -> anyhow::Result<()> {
		let (is_array, lower, element_count, element_type, sym_type) = match type_node {
			TypeNode::Array(array_type) => {
				if array_type.upper < array_type.lower {
					anyhow::bail!(CompileError::semantic(line, format!("array upper bound {} is less than lower bound {}", array_type.upper, array_type.lower)));
				}
				let element_type = array_type.element_type_name.to_uppercase();
				if !types::is_known_scalar_type(&element_type) {
					anyhow::bail!(CompileError::semantic(line, format!("unknown array element type '{element_type}'")));
				}
				(true, Some(array_type.lower), Some(array_type.upper - array_type.lower + 1), Some(element_type), "ARRAY".to_owned())
			}
			TypeNode::Named(name) => {
				let sym_type = name.to_uppercase();
				if !types::is_known_scalar_type(&sym_type) {
					anyhow::bail!(CompileError::semantic(line, format!("unknown type '{sym_type}'")));
				}
				(false, None, None, None, sym_type)
			}
		};

		for id in ids {
			if self.scopes.declared_in_current_scope(id) {
				anyhow::bail!(CompileError::semantic(line, format!("'{id}' is already declared in this scope")));
			}
			let mut symbol = Symbol::scalar(id, &sym_type, kind, Address::Offset(0), self.scopes.current_level());
			symbol.is_var_param = is_var_param;
			symbol.is_array = is_array;
			symbol.array_lower_bound = lower;
			symbol.array_element_count = element_count;
			symbol.element_type = element_type.clone();
			self.scopes.define(symbol)?;
		}
		Ok(())
	}

	fn visit_function(&mut self, declaration: &FunctionDeclaration) -> anyhow::Result<()> {
		let return_type = declaration.return_type_name.to_uppercase();
		if !types::is_known_scalar_type(&return_type) {
			anyhow::bail!(CompileError::semantic(declaration.line, format!("unknown return type '{return_type}'")));
		}
		if self.scopes.declared_in_current_scope(&declaration.name) {
			anyhow::bail!(CompileError::semantic(declaration.line, format!("'{}' is already declared in this scope", declaration.name)));
		}
		let params_info = self.build_params_info(&declaration.params)?;
		let mut symbol = Symbol::scalar(&declaration.name, &return_type, SymbolKind::Function, Address::Label(declaration.name.clone()), self.scopes.current_level());
		symbol.params_info = params_info;
		symbol.return_type = Some(return_type.clone());
		self.scopes.define(symbol)?;

		self.scopes.push_scope(declaration.name.clone());
		for parameter in &declaration.params {
			self.declare_variable_group(&parameter.ids, &parameter.type_node, parameter.line, SymbolKind::Parameter, parameter.is_var)?;
		}
		self.declare_variable_group(std::slice::from_ref(&declaration.name), &TypeNode::Named(return_type), declaration.line, SymbolKind::Variable, false)?;
		self.visit_block(&declaration.block)?;
		self.scopes.pop_scope()
	}

	fn visit_procedure(&mut self, declaration: &ProcedureDeclaration) -> anyhow::Result<()> {
		if self.scopes.declared_in_current_scope(&declaration.name) {
			anyhow::bail!(CompileError::semantic(declaration.line, format!("'{}' is already declared in this scope", declaration.name)));
		}
		let params_info = self.build_params_info(&declaration.params)?;
		let mut symbol = Symbol::scalar(&declaration.name, "PROCEDURE", SymbolKind::Procedure, Address::Label(declaration.name.clone()), self.scopes.current_level());
		symbol.params_info = params_info;
		self.scopes.define(symbol)?;

		self.scopes.push_scope(declaration.name.clone());
		for parameter in &declaration.params {
			self.declare_variable_group(&parameter.ids, &parameter.type_node, parameter.line, SymbolKind::Parameter, parameter.is_var)?;
		}
		self.visit_block(&declaration.block)?;
		self.scopes.pop_scope()
	}

	/// Builds the `params_info` list for a callable's `Symbol` without mutating the current scope, by expanding
	/// each `Parameter`'s id list into individual parameter symbols.
	fn build_params_info(&self, params: &[crate::ast::Parameter]) -> anyhow::Result<Vec<Symbol>> {
		let mut params_info = Vec::new();
		for parameter in params {
			let sym_type = types::type_node_name(&parameter.type_node);
			if !types::is_known_scalar_type(&sym_type) && sym_type != "ARRAY" {
				anyhow::bail!(CompileError::semantic(parameter.line, format!("unknown parameter type '{sym_type}'")));
			}
			for id in &parameter.ids {
				let mut symbol = Symbol::scalar(id, &sym_type, SymbolKind::Parameter, Address::Offset(0), 0);
				symbol.is_var_param = parameter.is_var;
				params_info.push(symbol);
			}
		}
		Ok(params_info)
	}

	fn visit_compound(&mut self, compound: &CompoundStatement) -> anyhow::Result<()> {
		for statement in &compound.statements {
			self.visit_statement(statement)?;
		}
		Ok(())
	}

	fn visit_statement(&mut self, statement: &Statement) -> anyhow::Result<()> {
		match statement {
			Statement::Assignment(assignment) => self.visit_assignment(assignment),
			Statement::If(if_statement) => self.visit_if(if_statement),
			Statement::While(while_statement) => self.visit_while(while_statement),
			Statement::For(for_statement) => self.visit_for(for_statement),
			Statement::Compound(compound) => self.visit_compound(compound),
			Statement::Io(io_call) => self.visit_io_call(io_call),
			Statement::Expression(expression) => self.visit_expression(expression).map(|_| ()),
			Statement::Empty => Ok(()),
		}
	}

	fn visit_assignment(&mut self, assignment: &crate::ast::AssignmentStatement) -> anyhow::Result<()> {
		let rhs_type = self.visit_expression(&assignment.expression)?;
		let lhs_type = match &assignment.target {
			AssignmentTarget::Identifier(name) => {
				let symbol = self.scopes.resolve(name).ok_or_else(|| anyhow::anyhow!(CompileError::semantic(assignment.line, format!("undeclared identifier '{name}'"))))?;
				if symbol.kind == SymbolKind::Parameter && !symbol.is_var_param {
					anyhow::bail!(CompileError::semantic(assignment.line, format!("cannot assign to value parameter '{name}'")));
				}
				if !matches!(symbol.kind, SymbolKind::Variable | SymbolKind::Parameter) {
					anyhow::bail!(CompileError::semantic(assignment.line, format!("'{name}' is not assignable")));
				}
				symbol.sym_type.clone()
			}
			AssignmentTarget::ArrayAccess(array_access) => self.visit_array_access(array_access)?,
		};
		if !types::is_assignable(&rhs_type, &lhs_type) {
			anyhow::bail!(CompileError::semantic(assignment.line, format!("cannot assign a value of type {rhs_type} to a target of type {lhs_type}")));
		}
		Ok(())
	}

	fn visit_if(&mut self, if_statement: &IfStatement) -> anyhow::Result<()> {
		self.require_boolean(&if_statement.condition)?;
		self.visit_statement(&if_statement.then_branch)?;
		if let Some(else_branch) = &if_statement.else_branch {
			self.visit_statement(else_branch)?;
		}
		Ok(())
	}

	fn visit_while(&mut self, while_statement: &WhileStatement) -> anyhow::Result<()> {
		self.require_boolean(&while_statement.condition)?;
		self.visit_statement(&while_statement.body)
	}

	fn visit_for(&mut self, for_statement: &ForStatement) -> anyhow::Result<()> {
		let variable_type = self
			.scopes
			.resolve(&for_statement.variable)
			.ok_or_else(|| anyhow::anyhow!(CompileError::semantic(for_statement.line, format!("undeclared identifier '{}'", for_statement.variable))))?
			.sym_type
			.clone();
		let from_type = self.visit_expression(&for_statement.from)?;
		let to_type = self.visit_expression(&for_statement.to)?;
		if !types::is_assignable(&from_type, &variable_type) || !types::is_assignable(&to_type, &variable_type) {
			anyhow::bail!(CompileError::semantic(for_statement.line, format!("for-loop bounds must agree with control variable type {variable_type}")));
		}
		self.visit_statement(&for_statement.body)
	}

	fn visit_io_call(&mut self, io_call: &IoCall) -> anyhow::Result<()> {
		match io_call.operation {
			IoOperation::Write | IoOperation::Writeln => {
				for arg in &io_call.args {
					self.visit_expression(arg)?;
				}
			}
			IoOperation::Read | IoOperation::Readln => {
				for arg in &io_call.args {
					match arg {
						Expression::Identifier(_) | Expression::ArrayAccess(_) => {
							self.visit_expression(arg)?;
						}
						_ => anyhow::bail!(CompileError::semantic(io_call.line, "read target must be a variable or array element")),
					}
				}
			}
		}
		Ok(())
	}

	fn require_boolean(&mut self, expression: &Expression) -> anyhow::Result<()> {
		let found_type = self.visit_expression(expression)?;
		if found_type != types::BOOLEAN {
			anyhow::bail!(CompileError::semantic(expression.line(), format!("expected a {} condition but found {found_type}", types::BOOLEAN)));
		}
		Ok(())
	}

	/// Infers and returns the type of `expression`, resolving every identifier and call along the way.
	fn visit_expression(&mut self, expression: &Expression) -> anyhow::Result<String> {
		match expression {
			Expression::Literal(literal) => Ok(match literal.value {
				LiteralValue::Integer(_) => types::INTEGER.to_owned(),
				LiteralValue::Real(_) => types::REAL.to_owned(),
				LiteralValue::String(_) => types::STRING.to_owned(),
				LiteralValue::Boolean(_) => types::BOOLEAN.to_owned(),
			}),
			Expression::Identifier(identifier) => {
				let symbol = self.scopes.resolve(&identifier.name).ok_or_else(|| anyhow::anyhow!(CompileError::semantic(identifier.line, format!("undeclared identifier '{}'", identifier.name))))?;
				if symbol.is_array {
					anyhow::bail!(CompileError::semantic(identifier.line, format!("'{}' is an array and cannot be used without an index", identifier.name)));
				}
				Ok(symbol.sym_type.clone())
			}
			Expression::Binary(binary) => {
				let left = self.visit_expression(&binary.left)?;
				let right = self.visit_expression(&binary.right)?;
				types::combine_binary(binary.operator, &left, &right)
					.ok_or_else(|| anyhow::anyhow!(CompileError::semantic(binary.line, format!("operator {:?} is not defined for {left} and {right}", binary.operator))))
			}
			Expression::Unary(unary) => {
				let operand_type = self.visit_expression(&unary.operand)?;
				types::combine_unary(unary.operator, &operand_type).ok_or_else(|| anyhow::anyhow!(CompileError::semantic(unary.line, format!("operator {:?} is not defined for {operand_type}", unary.operator))))
			}
			Expression::ArrayAccess(array_access) => self.visit_array_access(array_access),
			Expression::Call(call) => {
				let symbol = self.scopes.resolve(&call.name).ok_or_else(|| anyhow::anyhow!(CompileError::semantic(call.line, format!("undeclared identifier '{}'", call.name))))?;
				if symbol.kind == SymbolKind::Procedure {
					anyhow::bail!(CompileError::semantic(call.line, format!("'{}' is a procedure and cannot be used in an expression", call.name)));
				}
				if symbol.kind != SymbolKind::Function {
					anyhow::bail!(CompileError::semantic(call.line, format!("'{}' is not callable", call.name)));
				}
				if symbol.params_info.len() != call.args.len() {
					anyhow::bail!(CompileError::semantic(call.line, format!("'{}' expects {} argument(s) but {} were given", call.name, symbol.params_info.len(), call.args.len())));
				}
				let return_type = symbol.return_type.clone().unwrap_or_else(|| symbol.sym_type.clone());
				for arg in &call.args {
					self.visit_expression(arg)?;
				}
				Ok(return_type)
			}
		}
	}

	/// Resolves an `ArrayAccess`, requiring the base to be a plain identifier (this subset has no array-of-array or
	/// array-returning expressions — see the element-type invariant in §3). The base is either a true array
	/// (yielding its declared element type) or a `STRING` scalar indexed character-wise (yielding `CHAR`, §4.D
	/// "Identifiers and array access").
	fn visit_array_access(&mut self, array_access: &crate::ast::ArrayAccess) -> anyhow::Result<String> {
		let Expression::Identifier(identifier) = array_access.array.as_ref() else {
			anyhow::bail!(CompileError::semantic(array_access.line, "array indexing requires a simple array variable"));
		};
		let symbol = self.scopes.resolve(&identifier.name).ok_or_else(|| anyhow::anyhow!(CompileError::semantic(array_access.line, format!("undeclared identifier '{}'", identifier.name))))?;
		let element_type = if symbol.is_array {
			symbol.element_type.clone().expect("is_array symbols always carry an element_type")
		} else if symbol.sym_type == types::STRING {
			types::CHAR.to_owned()
		} else {
			anyhow::bail!(CompileError::semantic(array_access.line, format!("'{}' is not an array or a string", identifier.name)));
		};

		let index_type = self.visit_expression(&array_access.index)?;
		if index_type != types::INTEGER {
			anyhow::bail!(CompileError::semantic(array_access.line, format!("array index must be {} but found {index_type}", types::INTEGER)));
		}
		Ok(element_type)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{lexer::tokenize, parser};

	fn check(source: &str) -> anyhow::Result<()> {
		analyze(&parser::parse(tokenize(source)?)?)
	}

	#[test]
	fn accepts_a_well_typed_program() {
		check("program P; var x: Integer; begin x := 5; Write(x) end.").unwrap();
	}

	#[test]
	fn rejects_redeclaration_in_the_same_scope() {
		assert!(check("program P; var x: Integer; x: Real; begin end.").is_err());
	}

	#[test]
	fn rejects_undeclared_identifier() {
		let error = check("program P; begin x := 1 end.").unwrap_err();
		assert!(error.to_string().contains("undeclared"));
	}

	#[test]
	fn allows_integer_to_real_widening_on_assignment() {
		check("program P; var r: Real; begin r := 1 end.").unwrap();
	}

	#[test]
	fn rejects_real_to_integer_narrowing_on_assignment() {
		assert!(check("program P; var i: Integer; begin i := 1.5 end.").is_err());
	}

	#[test]
	fn rejects_string_assigned_to_integer() {
		assert!(check("program P; var x: Integer; begin x := 'hello' end.").is_err());
	}

	#[test]
	fn rejects_assignment_to_value_parameter() {
		let source = "program P; procedure Foo(n: Integer); begin n := 1 end; begin end.";
		assert!(check(source).is_err());
	}

	#[test]
	fn allows_assignment_to_var_parameter() {
		let source = "program P; procedure Foo(var n: Integer); begin n := 1 end; begin end.";
		check(source).unwrap();
	}

	#[test]
	fn allows_assignment_to_function_own_name() {
		let source = "program P; function Square(n: Integer): Integer; begin Square := n * n end; var r: Integer; begin r := Square(3) end.";
		check(source).unwrap();
	}

	#[test]
	fn rejects_wrong_argument_count() {
		let source = "program P; function Square(n: Integer): Integer; begin Square := n * n end; var r: Integer; begin r := Square(3, 4) end.";
		assert!(check(source).is_err());
	}

	#[test]
	fn rejects_calling_a_procedure_in_an_expression() {
		let source = "program P; procedure Foo; begin end; var r: Integer; begin r := Foo end.";
		assert!(check(source).is_err());
	}

	#[test]
	fn rejects_array_with_upper_bound_less_than_lower() {
		assert!(check("program P; var a: array [5..1] of Integer; begin end.").is_err());
	}

	#[test]
	fn array_element_type_checks_against_index_and_value() {
		check("program P; var a: array [1..3] of Integer; begin a[1] := 7 end.").unwrap();
	}

	#[test]
	fn rejects_non_integer_array_index() {
		assert!(check("program P; var a: array [1..3] of Integer; begin a[1.5] := 7 end.").is_err());
	}

	#[test]
	fn division_always_yields_real_and_is_assignable_to_real() {
		check("program P; var r: Real; begin r := 1 / 2 end.").unwrap();
	}

	#[test]
	fn builtin_length_typechecks() {
		check("program P; var n: Integer; begin n := length('hello') end.").unwrap();
	}

	#[test]
	fn indexing_a_string_yields_a_char() {
		check("program P; var s: String; c: Char; begin c := s[1] end.").unwrap();
	}

	#[test]
	fn rejects_indexing_a_plain_integer() {
		assert!(check("program P; var n: Integer; begin n := n[1] end.").is_err());
	}
}
