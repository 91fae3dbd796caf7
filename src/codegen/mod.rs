//! Code generation: walks the `Program` AST once more, emitting a flat listing of stack-machine instructions
//! (§4.D). Builds and discards its own `ScopeArena`, entirely separate from the semantic analyzer's (§9, "Two
//! separate scope chains") — it re-discovers declarations as it walks rather than consulting the earlier pass's
//! symbol table, trusting that `semantic::analyze` already accepted the program.
//!
//! Grounded in the original `vm_assembly/generator.py`, `vm_assembly/generation_context.py`, and
//! `vm_assembly/node_visitors.py`; state that module kept as module-level globals (reset between files by a
//! `reset_context()` call) is instead owned by a fresh `CodeGenerator` constructed per file (§5, §9).

use std::collections::HashMap;

use crate::{
	ast::{
		ArrayAccess, AssignmentStatement, AssignmentTarget, BinaryOperation, BinaryOperator, CompoundStatement, Declaration, Expression, ForDirection, ForStatement, FunctionCall,
		FunctionDeclaration, IfStatement, IoCall, IoOperation, LiteralValue, Parameter, ProcedureDeclaration, Program, Statement, TypeNode, UnaryOperation, UnaryOperator, WhileStatement,
	},
	error::CompileError,
	symbol::{Address, ScopeArena, Symbol, SymbolKind},
	types,
};

/// Generates the instruction listing for `program`.
///
/// # Errors
/// Returns a `CompileError` (wrapped in `anyhow::Error`) if the generator reaches an AST shape the semantic pass
/// should already have ruled out (`Codegen — structural`, §7), or one of the few constructs this subset's codegen
/// deliberately leaves unimplemented (built-ins other than `length`/`abs`/`sqr`, string concatenation — see §9).
pub fn generate(program: &Program) -> anyhow::Result<Vec<String>> {
	let mut generator = CodeGenerator::new();
	for id in &program.header.id_list {
		generator.scopes.define(Symbol::scalar(id, "", SymbolKind::ProgramParam, Address::Offset(0), 0))?;
	}
	generator.materialize_variable_declarations(&program.block.declarations)?;
	generator.emit("START");
	generator.generate_callables_and_compound(&program.block.declarations, &program.block.compound)?;
	generator.emit("STOP");
	Ok(generator.lines)
}

/// Resolved by `CodeGenerator::locate`; see there for what each variant means.
enum Locality {
	Global,
	Current,
	/// Holds the offset, within the current frame, of the static link to dereference.
	Enclosing(i64),
}

struct CodeGenerator {
	scopes: ScopeArena,
	lines: Vec<String>,
	label_counter: usize,
	/// Maps a scope arena id to the parameter-area offset holding its static link, for callables nested one
	/// level inside another non-global callable. Absent for global-level callables, which never need one
	/// (§1, "non-local access beyond one level" is the only case this doesn't cover).
	static_links: HashMap<usize, i64>,
}

impl CodeGenerator {
	fn new() -> Self {
		Self { scopes: ScopeArena::new(), lines: Vec::new(), label_counter: 0, static_links: HashMap::new() }
	}

	fn emit(&mut self, text: impl Into<String>) {
		self.lines.push(format!("    {}", text.into()));
	}

	fn emit_label(&mut self, label: &str) {
		self.lines.push(format!("{label}:"));
	}

	/// A fresh, globally-unique label built from `prefix` (§8, "labels are unique across the emitted listing").
	fn fresh_label(&mut self, prefix: &str) -> String {
		self.label_counter += 1;
		format!("{}_{}", prefix.to_lowercase(), self.label_counter)
	}

	fn resolve(&self, name: &str, line: usize) -> anyhow::Result<Symbol> {
		self.scopes.resolve(name).cloned().ok_or_else(|| anyhow::anyhow!(CompileError::codegen(line, format!("undeclared identifier '{name}'"))))
	}

	/// Extracts `(is_array, lower, element_count, element_type, sym_type)` from a `TypeNode`, mirroring
	/// `semantic::declare_variable_group`'s type resolution but independently, since the two passes never share
	/// state (§9).
	fn type_info(type_node: &TypeNode) -> (bool, Option<i64>, Option<i64>, Option<String>, String) {
		match type_node {
			TypeNode::Array(array_type) => {
				let element_type = array_type.element_type_name.to_uppercase();
				(true, Some(array_type.lower), Some(array_type.upper - array_type.lower + 1), Some(element_type), "ARRAY".to_owned())
			}
			TypeNode::Named(name) => (false, None, None, None, name.to_uppercase()),
		}
	}

	/// Materializes every `VariableDeclaration` in `declarations` as a slot in the *current* scope: a scalar gets
	/// one ascending offset and a `PUSHI 0`; an array gets `element_count` offsets (as one reserved block) and a
	/// `PUSHN element_count`. Used both for the program's globals (emitted before `START`) and for a callable's own
	/// locals (emitted at the top of its body) — the same mechanism, just invoked at a different point (§4.D).
	fn materialize_variable_declarations(&mut self, declarations: &[Declaration]) -> anyhow::Result<()> {
		let scope_level = self.scopes.current_level();
		for declaration in declarations {
			let Declaration::Variable(variable_declaration) = declaration else { continue };
			for group in &variable_declaration.groups {
				let (is_array, lower, element_count, element_type, sym_type) = Self::type_info(&group.type_node);
				for id in &group.ids {
					let offset = self.scopes.allocate_local_offset(element_count.unwrap_or(1));
					if is_array {
						self.emit(format!("PUSHN {}", element_count.unwrap_or(0)));
					} else {
						self.emit("PUSHI 0");
					}
					let mut symbol = Symbol::scalar(id, &sym_type, SymbolKind::Variable, Address::Offset(offset), scope_level);
					symbol.is_array = is_array;
					symbol.array_lower_bound = lower;
					symbol.array_element_count = element_count;
					symbol.element_type = element_type.clone();
					self.scopes.define(symbol)?;
				}
			}
		}
		Ok(())
	}

	/// The hoisting pattern common to every block (§4.D): register every callable's label up front (so mutual and
	/// forward calls resolve), jump over their bodies, emit each body, then the block's own compound statement.
	fn generate_callables_and_compound(&mut self, declarations: &[Declaration], compound: &CompoundStatement) -> anyhow::Result<()> {
		let mut callables = Vec::new();
		for declaration in declarations {
			match declaration {
				Declaration::Function(function) => {
					let label = self.fresh_label(&function.name);
					let params_info = Self::flatten_params(&function.params);
					let mut symbol = Symbol::scalar(&function.name, function.return_type_name.to_uppercase(), SymbolKind::Function, Address::Label(label.clone()), self.scopes.current_level());
					symbol.params_info = params_info;
					symbol.return_type = Some(function.return_type_name.to_uppercase());
					self.scopes.define(symbol)?;
					callables.push((declaration, label));
				}
				Declaration::Procedure(procedure) => {
					let label = self.fresh_label(&procedure.name);
					let params_info = Self::flatten_params(&procedure.params);
					let mut symbol = Symbol::scalar(&procedure.name, "PROCEDURE", SymbolKind::Procedure, Address::Label(label.clone()), self.scopes.current_level());
					symbol.params_info = params_info;
					self.scopes.define(symbol)?;
					callables.push((declaration, label));
				}
				Declaration::Variable(_) => {}
			}
		}

		let main_label = self.fresh_label("main");
		self.emit(format!("JUMP {main_label}"));
		for (declaration, label) in callables {
			self.generate_callable_body(declaration, &label)?;
		}
		self.emit_label(&main_label);
		self.generate_compound(compound)
	}

	/// Builds the `params_info` symbols for a callable's signature, without touching the scope chain. Used only for
	/// recording argument arity/`is_var_param` on the callable's own `Symbol`.
	fn flatten_params(params: &[Parameter]) -> Vec<Symbol> {
		let mut params_info = Vec::new();
		for parameter in params {
			let (is_array, _, _, _, sym_type) = Self::type_info(&parameter.type_node);
			for id in &parameter.ids {
				let mut symbol = Symbol::scalar(id, &sym_type, SymbolKind::Parameter, Address::Offset(0), 0);
				symbol.is_var_param = parameter.is_var;
				symbol.is_array = is_array;
				params_info.push(symbol);
			}
		}
		params_info
	}

	fn generate_callable_body(&mut self, declaration: &Declaration, label: &str) -> anyhow::Result<()> {
		match declaration {
			Declaration::Function(function) => self.generate_function_body(function, label),
			Declaration::Procedure(procedure) => self.generate_procedure_body(procedure, label),
			Declaration::Variable(_) => unreachable!("callables list only ever holds Function/Procedure declarations"),
		}
	}

	fn define_params(&mut self, params: &[Parameter]) -> anyhow::Result<()> {
		let mut flattened = Vec::new();
		for parameter in params {
			let (is_array, lower, element_count, element_type, sym_type) = Self::type_info(&parameter.type_node);
			for id in &parameter.ids {
				flattened.push((id.clone(), sym_type.clone(), is_array, lower, element_count, element_type.clone(), parameter.is_var));
			}
		}
		let names: Vec<String> = flattened.iter().map(|(id, ..)| id.clone()).collect();
		let offsets = self.scopes.allocate_param_offsets(&names);
		let level = self.scopes.current_level();
		for ((id, sym_type, is_array, lower, element_count, element_type, is_var), offset) in flattened.into_iter().zip(offsets) {
			let mut symbol = Symbol::scalar(id, sym_type, SymbolKind::Parameter, Address::Offset(offset), level);
			symbol.is_var_param = is_var;
			symbol.is_array = is_array;
			symbol.array_lower_bound = lower;
			symbol.array_element_count = element_count;
			symbol.element_type = element_type;
			self.scopes.define(symbol)?;
		}
		Ok(())
	}

	/// Reserves the deepest parameter-area slot for a static link when this callable's body is nested one
	/// level inside another non-global callable (body level >= 2), so a non-local read/write can reach the
	/// enclosing frame without knowing it at call-generation time (§1, exactly one level is in scope).
	fn reserve_static_link(&mut self) {
		if self.scopes.current_level() >= 2 {
			let offset = self.scopes.allocate_param_offsets(&["<static link>".to_owned()])[0];
			self.static_links.insert(self.scopes.current_id(), offset);
		}
	}

	fn generate_function_body(&mut self, function: &FunctionDeclaration, label: &str) -> anyhow::Result<()> {
		self.emit_label(label);
		self.scopes.push_scope(function.name.clone());
		self.define_params(&function.params)?;
		self.reserve_static_link();
		self.materialize_variable_declarations(&function.block.declarations)?;

		let return_type = function.return_type_name.to_uppercase();
		let return_offset = self.scopes.allocate_local_offset(1);
		self.emit("PUSHI 0");
		self.scopes.define(Symbol::scalar(&function.name, return_type, SymbolKind::Variable, Address::Offset(return_offset), self.scopes.current_level()))?;

		self.generate_callables_and_compound(&function.block.declarations, &function.block.compound)?;
		self.scopes.pop_scope()?;
		self.emit(format!("PUSHL {return_offset}"));
		self.emit("RETURN");
		Ok(())
	}

	fn generate_procedure_body(&mut self, procedure: &ProcedureDeclaration, label: &str) -> anyhow::Result<()> {
		self.emit_label(label);
		self.scopes.push_scope(procedure.name.clone());
		self.define_params(&procedure.params)?;
		self.reserve_static_link();
		self.materialize_variable_declarations(&procedure.block.declarations)?;
		self.generate_callables_and_compound(&procedure.block.declarations, &procedure.block.compound)?;
		self.scopes.pop_scope()?;
		self.emit("RETURN");
		Ok(())
	}

	fn generate_compound(&mut self, compound: &CompoundStatement) -> anyhow::Result<()> {
		for statement in &compound.statements {
			self.generate_statement(statement)?;
		}
		Ok(())
	}

	fn generate_statement(&mut self, statement: &Statement) -> anyhow::Result<()> {
		match statement {
			Statement::Assignment(assignment) => self.generate_assignment(assignment),
			Statement::If(if_statement) => self.generate_if(if_statement),
			Statement::While(while_statement) => self.generate_while(while_statement),
			Statement::For(for_statement) => self.generate_for(for_statement),
			Statement::Compound(compound) => self.generate_compound(compound),
			Statement::Io(io_call) => self.generate_io(io_call),
			Statement::Expression(expression) => self.generate_statement_expression(expression),
			Statement::Empty => Ok(()),
		}
	}

	fn generate_statement_expression(&mut self, expression: &Expression) -> anyhow::Result<()> {
		if let Expression::Call(call) = expression {
			let symbol = self.resolve(&call.name, call.line)?;
			if symbol.kind == SymbolKind::Procedure {
				return self.generate_call(&symbol, &call.args, call.line);
			}
		}
		anyhow::bail!(CompileError::codegen(expression.line(), "expression statement does not call a procedure and cannot be emitted without unbalancing the stack"));
	}

	// --- Assignment ---------------------------------------------------------------------------------------------

	fn generate_assignment(&mut self, assignment: &AssignmentStatement) -> anyhow::Result<()> {
		match &assignment.target {
			AssignmentTarget::Identifier(name) => {
				let symbol = self.resolve(name, assignment.line)?;
				self.generate_expression(&assignment.expression)?;
				self.store_scalar(&symbol, assignment.line)
			}
			AssignmentTarget::ArrayAccess(array_access) => self.generate_array_assignment(array_access, &assignment.expression, assignment.line),
		}
	}

	fn generate_array_assignment(&mut self, array_access: &ArrayAccess, rhs: &Expression, line: usize) -> anyhow::Result<()> {
		let Expression::Identifier(base) = array_access.array.as_ref() else {
			anyhow::bail!(CompileError::codegen(line, "array assignment requires a simple array variable"));
		};
		let symbol = self.resolve(&base.name, line)?;
		if !symbol.is_array {
			anyhow::bail!(CompileError::codegen(line, format!("'{}' is not an array", base.name)));
		}
		self.generate_expression(rhs)?;
		let temp_offset = self.scopes.allocate_local_offset(1);
		self.emit(format!("STOREL {temp_offset}"));
		self.emit_array_base_address(&symbol, line)?;
		self.generate_expression(&array_access.index)?;
		self.emit_lower_bound_adjustment(&symbol);
		self.emit(format!("PUSHL {temp_offset}"));
		self.emit("STOREN");
		Ok(())
	}

	/// Where `symbol` lives relative to the frame currently being generated: the global area, the current
	/// frame, or — exactly one level up — the enclosing callable's frame, reached through this frame's static
	/// link (§1, "non-local access beyond one level" is the only case left unsupported).
	fn locate(&self, symbol: &Symbol, line: usize) -> anyhow::Result<Locality> {
		if symbol.scope_level == 0 {
			Ok(Locality::Global)
		} else if symbol.scope_level == self.scopes.current_level() {
			Ok(Locality::Current)
		} else if symbol.scope_level + 1 == self.scopes.current_level() {
			let link_offset = self.static_links.get(&self.scopes.current_id()).copied().ok_or_else(|| {
				anyhow::anyhow!(CompileError::codegen(line, format!("'{}' is captured from an enclosing scope, but this callable has no static link", symbol.name)))
			})?;
			Ok(Locality::Enclosing(link_offset))
		} else {
			anyhow::bail!(CompileError::codegen(line, format!("'{}' is declared more than one enclosing scope away; non-local access beyond one level is not supported", symbol.name)));
		}
	}

	/// Stores the value currently on TOS into `symbol`'s slot, choosing `STOREG`/`STOREL`/the enclosing-frame
	/// address dance/the VAR-parameter `STORE 0` dance as appropriate (§4.D, "Assignment").
	fn store_scalar(&mut self, symbol: &Symbol, line: usize) -> anyhow::Result<()> {
		let offset = symbol.offset()?;
		if symbol.kind == SymbolKind::Parameter && symbol.is_var_param {
			self.emit(format!("PUSHL {offset}"));
			self.emit("SWAP");
			self.emit("STORE 0");
			return Ok(());
		}
		match self.locate(symbol, line)? {
			Locality::Global => self.emit(format!("STOREG {offset}")),
			Locality::Current => self.emit(format!("STOREL {offset}")),
			Locality::Enclosing(link_offset) => {
				self.emit(format!("PUSHL {link_offset}"));
				self.emit(format!("PUSHI {offset}"));
				self.emit("PADD");
				self.emit("SWAP");
				self.emit("STORE 0");
			}
		}
		Ok(())
	}

	/// Pushes the value currently held by `symbol` onto TOS.
	fn load_scalar(&mut self, symbol: &Symbol, line: usize) -> anyhow::Result<()> {
		let offset = symbol.offset()?;
		if symbol.kind == SymbolKind::Parameter && symbol.is_var_param {
			self.emit(format!("PUSHL {offset}"));
			self.emit("LOAD 0");
			return Ok(());
		}
		match self.locate(symbol, line)? {
			Locality::Global => self.emit(format!("PUSHG {offset}")),
			Locality::Current => self.emit(format!("PUSHL {offset}")),
			Locality::Enclosing(link_offset) => {
				self.emit(format!("PUSHL {link_offset}"));
				self.emit(format!("PUSHI {offset}"));
				self.emit("PADD");
				self.emit("LOAD 0");
			}
		}
		Ok(())
	}

	/// Pushes the base address of an array (or array VAR-parameter) symbol, ready for an index to be added (§4.D,
	/// "Identifiers and array access").
	fn emit_array_base_address(&mut self, symbol: &Symbol, line: usize) -> anyhow::Result<()> {
		let offset = symbol.offset()?;
		if symbol.is_var_param {
			self.emit(format!("PUSHL {offset}"));
			return Ok(());
		}
		match self.locate(symbol, line)? {
			Locality::Global => {
				self.emit("PUSHGP");
				self.emit(format!("PUSHI {offset}"));
				self.emit("PADD");
			}
			Locality::Current => {
				self.emit("PUSHFP");
				self.emit(format!("PUSHI {offset}"));
				self.emit("PADD");
			}
			Locality::Enclosing(link_offset) => {
				self.emit(format!("PUSHL {link_offset}"));
				self.emit(format!("PUSHI {offset}"));
				self.emit("PADD");
			}
		}
		Ok(())
	}

	fn emit_lower_bound_adjustment(&mut self, symbol: &Symbol) {
		if let Some(lower) = symbol.array_lower_bound {
			if lower != 0 {
				self.emit(format!("PUSHI {lower}"));
				self.emit("SUB");
			}
		}
	}

	// --- Control flow --------------------------------------------------------------------------------------------

	fn generate_if(&mut self, if_statement: &IfStatement) -> anyhow::Result<()> {
		let has_else = if_statement.else_branch.is_some();
		let false_label = self.fresh_label(if has_else { "else" } else { "endif" });
		self.generate_expression(&if_statement.condition)?;
		self.emit(format!("JZ {false_label}"));
		self.generate_statement(&if_statement.then_branch)?;
		if let Some(else_branch) = &if_statement.else_branch {
			let end_label = self.fresh_label("endif");
			self.emit(format!("JUMP {end_label}"));
			self.emit_label(&false_label);
			self.generate_statement(else_branch)?;
			self.emit_label(&end_label);
		} else {
			self.emit_label(&false_label);
		}
		Ok(())
	}

	fn generate_while(&mut self, while_statement: &WhileStatement) -> anyhow::Result<()> {
		let start_label = self.fresh_label("start");
		let end_label = self.fresh_label("end");
		self.emit_label(&start_label);
		self.generate_expression(&while_statement.condition)?;
		self.emit(format!("JZ {end_label}"));
		self.generate_statement(&while_statement.body)?;
		self.emit(format!("JUMP {start_label}"));
		self.emit_label(&end_label);
		Ok(())
	}

	fn generate_for(&mut self, for_statement: &ForStatement) -> anyhow::Result<()> {
		let control = self.resolve(&for_statement.variable, for_statement.line)?;
		let to_offset = self.scopes.allocate_local_offset(1);
		self.generate_expression(&for_statement.to)?;
		self.emit(format!("STOREL {to_offset}"));
		self.generate_expression(&for_statement.from)?;
		self.store_scalar(&control, for_statement.line)?;

		let check_label = self.fresh_label("check");
		let end_label = self.fresh_label("end");
		self.emit_label(&check_label);
		self.load_scalar(&control, for_statement.line)?;
		self.emit(format!("PUSHL {to_offset}"));
		self.emit(if for_statement.direction == ForDirection::To { "INFEQ" } else { "SUPEQ" });
		self.emit(format!("JZ {end_label}"));
		self.generate_statement(&for_statement.body)?;
		self.load_scalar(&control, for_statement.line)?;
		self.emit("PUSHI 1");
		self.emit(if for_statement.direction == ForDirection::To { "ADD" } else { "SUB" });
		self.store_scalar(&control, for_statement.line)?;
		self.emit(format!("JUMP {check_label}"));
		self.emit_label(&end_label);
		Ok(())
	}

	// --- Expressions ---------------------------------------------------------------------------------------------

	/// Best-effort type inference for opcode selection during codegen. Unlike the semantic analyzer's
	/// `visit_expression`, this never fails: it trusts the program already passed `semantic::analyze` and falls
	/// back to `"UNKNOWN"` for anything it doesn't need to distinguish (§4.E, `determine_expression_type`).
	fn infer_type(&self, expression: &Expression) -> String {
		match expression {
			Expression::Literal(literal) => match literal.value {
				LiteralValue::Integer(_) => types::INTEGER.to_owned(),
				LiteralValue::Real(_) => types::REAL.to_owned(),
				LiteralValue::String(_) => types::STRING.to_owned(),
				LiteralValue::Boolean(_) => types::BOOLEAN.to_owned(),
			},
			Expression::Identifier(identifier) => self.scopes.resolve(&identifier.name).map_or_else(|| "UNKNOWN".to_owned(), |symbol| symbol.sym_type.clone()),
			Expression::Binary(binary) => {
				let left = self.infer_type(&binary.left);
				let right = self.infer_type(&binary.right);
				types::combine_binary(binary.operator, &left, &right).unwrap_or_else(|| "UNKNOWN".to_owned())
			}
			Expression::Unary(unary) => {
				let operand = self.infer_type(&unary.operand);
				types::combine_unary(unary.operator, &operand).unwrap_or_else(|| "UNKNOWN".to_owned())
			}
			Expression::ArrayAccess(array_access) => match array_access.array.as_ref() {
				Expression::Identifier(identifier) => self.scopes.resolve(&identifier.name).map_or_else(
					|| "UNKNOWN".to_owned(),
					|symbol| if symbol.is_array { symbol.element_type.clone().unwrap_or_else(|| "UNKNOWN".to_owned()) } else { types::CHAR.to_owned() },
				),
				_ => "UNKNOWN".to_owned(),
			},
			Expression::Call(call) => self.scopes.resolve(&call.name).map_or_else(|| "UNKNOWN".to_owned(), |symbol| symbol.return_type.clone().unwrap_or_else(|| symbol.sym_type.clone())),
		}
	}

	fn generate_expression(&mut self, expression: &Expression) -> anyhow::Result<()> {
		match expression {
			Expression::Literal(literal) => {
				match &literal.value {
					LiteralValue::Integer(value) => self.emit(format!("PUSHI {value}")),
					LiteralValue::Real(value) => self.emit(format!("PUSHF {value}")),
					LiteralValue::String(value) => self.emit(format!("PUSHS {value:?}")),
					LiteralValue::Boolean(value) => self.emit(format!("PUSHI {}", i32::from(*value))),
				}
				Ok(())
			}
			Expression::Identifier(identifier) => {
				let symbol = self.resolve(&identifier.name, identifier.line)?;
				if symbol.is_array {
					anyhow::bail!(CompileError::codegen(identifier.line, format!("'{}' is an array and cannot be used as a value directly", identifier.name)));
				}
				self.load_scalar(&symbol, identifier.line)
			}
			Expression::Binary(binary) => self.generate_binary(binary),
			Expression::Unary(unary) => self.generate_unary(unary),
			Expression::ArrayAccess(array_access) => self.generate_array_value(array_access),
			Expression::Call(call) => self.generate_call_value(call),
		}
	}

	/// Evaluates `expression` onto TOS, inserting `ITOF` right after it if `expression_type` is `INTEGER` and
	/// `want_real` is set. Interleaving the evaluation this way (rather than pushing both operands and converting
	/// one of them afterwards) means the conversion always targets the value that's currently on top, so no `SWAP`
	/// is needed here (unlike unary minus, where the wrapping `PUSHI 0`/`PUSHF 0.0` is emitted *after* the operand
	/// and does need one — see `generate_unary`).
	fn emit_numeric_operand(&mut self, expression: &Expression, expression_type: &str, want_real: bool) -> anyhow::Result<()> {
		self.generate_expression(expression)?;
		if want_real && expression_type == types::INTEGER {
			self.emit("ITOF");
		}
		Ok(())
	}

	fn generate_binary(&mut self, binary: &BinaryOperation) -> anyhow::Result<()> {
		let left_type = self.infer_type(&binary.left);
		let right_type = self.infer_type(&binary.right);
		let is_real = left_type == types::REAL || right_type == types::REAL;

		match binary.operator {
			BinaryOperator::Add | BinaryOperator::Subtract | BinaryOperator::Multiply => {
				if left_type == types::STRING && right_type == types::STRING {
					anyhow::bail!(CompileError::codegen(binary.line, "string concatenation is not supported by this code generator"));
				}
				self.emit_numeric_operand(&binary.left, &left_type, is_real)?;
				self.emit_numeric_operand(&binary.right, &right_type, is_real)?;
				self.emit(match (binary.operator, is_real) {
					(BinaryOperator::Add, true) => "FADD",
					(BinaryOperator::Add, false) => "ADD",
					(BinaryOperator::Subtract, true) => "FSUB",
					(BinaryOperator::Subtract, false) => "SUB",
					(BinaryOperator::Multiply, true) => "FMUL",
					(BinaryOperator::Multiply, false) => "MUL",
					_ => unreachable!(),
				});
			}
			BinaryOperator::Divide => {
				self.emit_numeric_operand(&binary.left, &left_type, true)?;
				self.emit_numeric_operand(&binary.right, &right_type, true)?;
				self.emit("FDIV");
			}
			BinaryOperator::Div => {
				self.generate_expression(&binary.left)?;
				self.generate_expression(&binary.right)?;
				self.emit("DIV");
			}
			BinaryOperator::Mod => {
				self.generate_expression(&binary.left)?;
				self.generate_expression(&binary.right)?;
				self.emit("MOD");
			}
			BinaryOperator::Equal | BinaryOperator::NotEqual => {
				self.emit_numeric_operand(&binary.left, &left_type, is_real)?;
				self.emit_numeric_operand(&binary.right, &right_type, is_real)?;
				self.emit(if is_real { "FEQUAL" } else { "EQUAL" });
				if binary.operator == BinaryOperator::NotEqual {
					self.emit("NOT");
				}
			}
			BinaryOperator::LessThan | BinaryOperator::LessEqual | BinaryOperator::GreaterThan | BinaryOperator::GreaterEqual => {
				self.emit_numeric_operand(&binary.left, &left_type, is_real)?;
				self.emit_numeric_operand(&binary.right, &right_type, is_real)?;
				self.emit(match (binary.operator, is_real) {
					(BinaryOperator::LessThan, true) => "FINF",
					(BinaryOperator::LessThan, false) => "INF",
					(BinaryOperator::LessEqual, true) => "FINFEQ",
					(BinaryOperator::LessEqual, false) => "INFEQ",
					(BinaryOperator::GreaterThan, true) => "FSUP",
					(BinaryOperator::GreaterThan, false) => "SUP",
					(BinaryOperator::GreaterEqual, true) => "FSUPEQ",
					(BinaryOperator::GreaterEqual, false) => "SUPEQ",
					_ => unreachable!(),
				});
			}
			BinaryOperator::And | BinaryOperator::AndThen => {
				self.generate_expression(&binary.left)?;
				self.generate_expression(&binary.right)?;
				self.emit("AND");
			}
			BinaryOperator::Or | BinaryOperator::OrElse => {
				self.generate_expression(&binary.left)?;
				self.generate_expression(&binary.right)?;
				self.emit("OR");
			}
		}
		Ok(())
	}

	fn generate_unary(&mut self, unary: &UnaryOperation) -> anyhow::Result<()> {
		match unary.operator {
			UnaryOperator::Minus => {
				let operand_type = self.infer_type(&unary.operand);
				self.generate_expression(&unary.operand)?;
				if operand_type == types::REAL {
					self.emit("PUSHF 0.0");
					self.emit("SWAP");
					self.emit("FSUB");
				} else {
					self.emit("PUSHI 0");
					self.emit("SWAP");
					self.emit("SUB");
				}
			}
			UnaryOperator::Plus => self.generate_expression(&unary.operand)?,
			UnaryOperator::Not => {
				self.generate_expression(&unary.operand)?;
				self.emit("NOT");
			}
		}
		Ok(())
	}

	fn generate_array_value(&mut self, array_access: &ArrayAccess) -> anyhow::Result<()> {
		let Expression::Identifier(base) = array_access.array.as_ref() else {
			anyhow::bail!(CompileError::codegen(array_access.line, "array indexing requires a simple array variable"));
		};
		let symbol = self.resolve(&base.name, array_access.line)?;
		if symbol.is_array {
			self.emit_array_base_address(&symbol, array_access.line)?;
			self.generate_expression(&array_access.index)?;
			self.emit_lower_bound_adjustment(&symbol);
			self.emit("LOADN");
			Ok(())
		} else if symbol.sym_type == types::STRING {
			self.load_scalar(&symbol, array_access.line)?;
			self.generate_expression(&array_access.index)?;
			self.emit("PUSHI 1");
			self.emit("SUB");
			self.emit("CHARAT");
			Ok(())
		} else {
			anyhow::bail!(CompileError::codegen(array_access.line, format!("'{}' is not an array or a string", base.name)));
		}
	}

	// --- Calls -----------------------------------------------------------------------------------------------------

	fn generate_call_value(&mut self, call: &FunctionCall) -> anyhow::Result<()> {
		match call.name.to_lowercase().as_str() {
			"length" => self.generate_length(call),
			"abs" => self.generate_abs(call),
			"sqr" => self.generate_sqr(call),
			"uppercase" | "lowercase" | "sqrt" | "pred" | "succ" => {
				anyhow::bail!(CompileError::codegen(call.line, format!("no code generation path for built-in '{}'", call.name)))
			}
			_ => {
				let symbol = self.resolve(&call.name, call.line)?;
				if symbol.kind != SymbolKind::Function {
					anyhow::bail!(CompileError::codegen(call.line, format!("'{}' is not callable", call.name)));
				}
				self.generate_call(&symbol, &call.args, call.line)
			}
		}
	}

	fn generate_length(&mut self, call: &FunctionCall) -> anyhow::Result<()> {
		if let [Expression::Literal(literal)] = call.args.as_slice() {
			if let LiteralValue::String(value) = &literal.value {
				self.emit(format!("PUSHI {}", value.chars().count()));
				return Ok(());
			}
		}
		let Some(arg) = call.args.first() else {
			anyhow::bail!(CompileError::codegen(call.line, "'length' requires one argument"));
		};
		self.generate_expression(arg)?;
		self.emit("STRLEN");
		Ok(())
	}

	fn generate_abs(&mut self, call: &FunctionCall) -> anyhow::Result<()> {
		let Some(arg) = call.args.first() else {
			anyhow::bail!(CompileError::codegen(call.line, "'abs' requires one argument"));
		};
		let is_real = self.infer_type(arg) == types::REAL;
		self.generate_expression(arg)?;
		let end_label = self.fresh_label("absend");
		self.emit("DUP 1");
		self.emit(if is_real { "PUSHF 0.0" } else { "PUSHI 0" });
		self.emit(if is_real { "FINF" } else { "INF" });
		self.emit(format!("JZ {end_label}"));
		self.emit(if is_real { "PUSHF 0.0" } else { "PUSHI 0" });
		self.emit("SWAP");
		self.emit(if is_real { "FSUB" } else { "SUB" });
		self.emit_label(&end_label);
		Ok(())
	}

	fn generate_sqr(&mut self, call: &FunctionCall) -> anyhow::Result<()> {
		let Some(arg) = call.args.first() else {
			anyhow::bail!(CompileError::codegen(call.line, "'sqr' requires one argument"));
		};
		let is_real = self.infer_type(arg) == types::REAL;
		self.generate_expression(arg)?;
		self.emit("DUP 1");
		self.emit(if is_real { "FMUL" } else { "MUL" });
		Ok(())
	}

	fn generate_call(&mut self, callee: &Symbol, args: &[Expression], line: usize) -> anyhow::Result<()> {
		if callee.scope_level >= 1 {
			self.emit_static_link_argument(callee.scope_level, line)?;
		}
		for (param, arg) in callee.params_info.iter().zip(args) {
			if param.is_var_param {
				self.emit_var_argument_address(arg, line)?;
			} else {
				self.generate_expression(arg)?;
			}
		}
		let Address::Label(label) = &callee.address else {
			anyhow::bail!(CompileError::codegen(line, format!("'{}' has no entry label", callee.name)));
		};
		self.emit(format!("PUSHA {label}"));
		self.emit("CALL");
		Ok(())
	}

	/// Pushes the frame pointer `callee_scope_level` (the level of the scope the callee was declared in)
	/// should receive as its static link: our own frame, if the callee is declared directly in the scope
	/// we're generating code for right now, or our own inherited link forwarded one level further out if
	/// we're one level deeper than that. Anything else would need more than one hop and is rejected (§1,
	/// "non-local access beyond one level").
	fn emit_static_link_argument(&mut self, callee_scope_level: usize, line: usize) -> anyhow::Result<()> {
		let current = self.scopes.current_level();
		if callee_scope_level == current {
			self.emit("PUSHFP");
		} else if callee_scope_level + 1 == current {
			let link_offset = self
				.static_links
				.get(&self.scopes.current_id())
				.copied()
				.ok_or_else(|| anyhow::anyhow!(CompileError::codegen(line, "calling a nested callable, but the current frame has no static link to forward")))?;
			self.emit(format!("PUSHL {link_offset}"));
		} else {
			anyhow::bail!(CompileError::codegen(line, "call crosses more than one level of nesting, which is not supported"));
		}
		Ok(())
	}

	/// A VAR argument's address is exactly what `emit_array_base_address` already computes for a scalar
	/// symbol (its one-element "array"): a plain `PUSHL` for an inherited VAR parameter, otherwise the
	/// global/current/enclosing address arithmetic (§4.D, "VAR parameter round-trip").
	fn emit_var_argument_address(&mut self, arg: &Expression, line: usize) -> anyhow::Result<()> {
		let Expression::Identifier(identifier) = arg else {
			anyhow::bail!(CompileError::codegen(line, "a VAR argument must be a simple variable"));
		};
		let symbol = self.resolve(&identifier.name, line)?;
		self.emit_array_base_address(&symbol, line)
	}

	// --- I/O -------------------------------------------------------------------------------------------------------

	fn generate_io(&mut self, io_call: &IoCall) -> anyhow::Result<()> {
		match io_call.operation {
			IoOperation::Write | IoOperation::Writeln => {
				for arg in &io_call.args {
					let arg_type = self.infer_type(arg);
					self.generate_expression(arg)?;
					self.emit(match arg_type.as_str() {
						types::STRING => "WRITES",
						types::REAL => "WRITEF",
						types::INTEGER => "WRITEI",
						_ => "WRITECHR",
					});
				}
				if io_call.operation == IoOperation::Writeln {
					self.emit("WRITELN");
				}
				Ok(())
			}
			IoOperation::Read | IoOperation::Readln => {
				for arg in &io_call.args {
					self.generate_read_target(arg, io_call.line)?;
				}
				Ok(())
			}
		}
	}

	fn generate_read_target(&mut self, target: &Expression, line: usize) -> anyhow::Result<()> {
		match target {
			Expression::Identifier(identifier) => {
				let symbol = self.resolve(&identifier.name, identifier.line)?;
				self.emit("READ");
				self.emit_string_conversion(&symbol.sym_type);
				self.store_scalar(&symbol, identifier.line)
			}
			Expression::ArrayAccess(array_access) => {
				let Expression::Identifier(base) = array_access.array.as_ref() else {
					anyhow::bail!(CompileError::codegen(line, "read target must be a variable or array element"));
				};
				let symbol = self.resolve(&base.name, line)?;
				if !symbol.is_array {
					anyhow::bail!(CompileError::codegen(line, format!("'{}' is not an array", base.name)));
				}
				self.emit_array_base_address(&symbol, line)?;
				self.generate_expression(&array_access.index)?;
				self.emit_lower_bound_adjustment(&symbol);
				self.emit("READ");
				self.emit_string_conversion(symbol.element_type.as_deref().unwrap_or(types::INTEGER));
				self.emit("STOREN");
				Ok(())
			}
			_ => anyhow::bail!(CompileError::codegen(line, "read target must be a variable or array element")),
		}
	}

	fn emit_string_conversion(&mut self, target_type: &str) {
		match target_type {
			types::INTEGER => self.emit("ATOI"),
			types::REAL => self.emit("ATOF"),
			types::CHAR => {
				self.emit("PUSHI 0");
				self.emit("CHARAT");
			}
			_ => {}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{lexer::tokenize, parser};

	fn compile(source: &str) -> anyhow::Result<Vec<String>> {
		let ast = parser::parse(tokenize(source)?)?;
		crate::semantic::analyze(&ast)?;
		generate(&ast)
	}

	fn joined(lines: &[String]) -> String {
		lines.join("\n")
	}

	#[test]
	fn global_scalar_materializes_before_start_and_compiles_a_write() {
		let listing = compile("program P; var x: Integer; begin x := 5; Write(x) end.").unwrap();
		let text = joined(&listing);
		let start_index = listing.iter().position(|line| line.trim() == "START").unwrap();
		assert_eq!(listing[0].trim(), "PUSHI 0");
		assert!(start_index >= 1);
		assert!(text.contains("STOREG 0"));
		assert!(text.contains("PUSHG 0"));
		assert!(text.contains("WRITEI"));
		assert_eq!(listing.last().unwrap().trim(), "STOP");
	}

	#[test]
	fn array_declaration_emits_pushn_and_indexing_uses_padd() {
		let listing = compile("program P; var a: array [1..3] of Integer; begin a[2] := 7; Write(a[2]) end.").unwrap();
		let text = joined(&listing);
		assert!(listing[0].trim() == "PUSHN 3");
		assert!(text.contains("PUSHGP"));
		assert!(text.contains("PADD"));
		assert!(text.contains("STOREN"));
		assert!(text.contains("LOADN"));
	}

	#[test]
	fn division_of_two_integers_converts_both_operands_and_emits_fdiv() {
		let listing = compile("program P; var r: Real; begin r := 1 / 2 end.").unwrap();
		let text = joined(&listing);
		assert_eq!(text.matches("ITOF").count(), 2);
		assert!(text.contains("FDIV"));
	}

	#[test]
	fn for_to_loop_uses_infeq_and_add() {
		let listing = compile("program P; var i: Integer; begin for i := 1 to 3 do Write(i) end.").unwrap();
        let text = joined(&listing);
        assert!(text.contains("INFEQ"));
        assert!(text.contains("ADD"));
	}

	#[test]
	fn for_downto_loop_uses_supeq_and_sub() {
		let listing = compile("program P; var i: Integer; begin for i := 3 downto 1 do Write(i) end.").unwrap();
		let text = joined(&listing);
		assert!(text.contains("SUPEQ"));
	}

	#[test]
	fn if_without_else_jumps_to_endif_label() {
		let listing = compile("program P; var x: Integer; begin if x = 1 then Write(x) end.").unwrap();
		let text = joined(&listing);
		assert!(text.contains("endif_"));
		assert!(!text.contains("else_"));
	}

	#[test]
	fn if_with_else_emits_both_branches() {
		let listing = compile("program P; var x: Integer; begin if x = 1 then Write(x) else Write(0) end.").unwrap();
		let text = joined(&listing);
		assert!(text.contains("else_"));
		assert!(text.contains("endif_"));
	}

	#[test]
	fn user_function_call_pushes_address_and_calls() {
		let listing = compile("program P; function Square(n: Integer): Integer; begin Square := n * n end; var r: Integer; begin r := Square(3) end.").unwrap();
		let text = joined(&listing);
		assert!(text.contains("PUSHA"));
		assert!(text.contains("CALL"));
		assert!(text.contains("RETURN"));
	}

	#[test]
	fn var_parameter_assignment_uses_store_zero_dereference() {
		let listing = compile("program P; procedure Inc(var n: Integer); begin n := n + 1 end; var x: Integer; begin Inc(x) end.").unwrap();
		let text = joined(&listing);
		assert!(text.contains("STORE 0"));
		assert!(text.contains("LOAD 0"));
	}

	#[test]
	fn nested_procedure_reads_and_writes_an_enclosing_local_through_a_static_link() {
		let listing = compile(
			"program P; procedure Outer; var x: Integer; procedure Inner; begin x := x + 1 end; begin x := 0; Inner end; begin Outer end.",
		)
		.unwrap();
		let text = joined(&listing);
		assert!(text.contains("PUSHFP"), "call to Inner must pass Outer's own frame as the static link");
		assert!(text.matches("PADD").count() >= 2, "reading and writing x through the link each compute an address");
		assert!(text.contains("LOAD 0"));
		assert!(text.contains("STORE 0"));
	}

	#[test]
	fn nested_procedure_with_its_own_parameter_still_reaches_the_enclosing_local() {
		let listing = compile(
			"program P; procedure Outer; var x: Integer; procedure Inner(n: Integer); begin x := x + n end; begin x := 0; Inner(5) end; begin Outer end.",
		)
		.unwrap();
		let text = joined(&listing);
		assert!(text.contains("PUSHFP"));
		assert!(text.contains("PUSHI 5"));
		assert!(text.contains("PADD"));
	}

	#[test]
	fn non_local_access_beyond_one_level_is_a_structural_error() {
		let result = compile(
			"program P; procedure A; var x: Integer; procedure B; procedure C; begin x := x + 1 end; begin C end; begin x := 0; B end; begin A end.",
		);
		assert!(result.is_err(), "C is nested two levels below the declaration of x, which is out of scope");
	}

	#[test]
	fn length_of_a_literal_string_is_folded_at_compile_time() {
		let listing = compile("program P; var n: Integer; begin n := length('hello') end.").unwrap();
		let text = joined(&listing);
		assert!(text.contains("PUSHI 5"));
		assert!(!text.contains("STRLEN"));
	}

	#[test]
	fn length_of_a_variable_emits_strlen() {
		let listing = compile("program P; var s: String; n: Integer; begin n := length(s) end.").unwrap();
		assert!(joined(&listing).contains("STRLEN"));
	}

	#[test]
	fn string_assignment_without_concatenation_is_fine() {
		assert!(compile("program P; var a, b: String; begin a := b end.").is_ok());
	}

	#[test]
	fn string_indexing_emits_charat() {
		let listing = compile("program P; var s: String; c: Char; begin c := s[1] end.").unwrap();
		assert!(joined(&listing).contains("CHARAT"));
	}

	#[test]
	fn labels_are_unique_across_the_listing() {
		let listing = compile(
			"program P; var x: Integer; begin if x = 1 then x := 1 else x := 2; if x = 2 then x := 3 else x := 4 end.",
		)
		.unwrap();
		let labels: Vec<&str> = listing.iter().filter(|line| line.ends_with(':')).map(String::as_str).collect();
		let mut unique = labels.clone();
		unique.sort_unstable();
		unique.dedup();
		assert_eq!(labels.len(), unique.len());
	}

	#[test]
	fn every_call_is_preceded_by_a_matching_pusha_label() {
		let listing = compile("program P; procedure Foo; begin end; begin Foo end.").unwrap();
		let call_index = listing.iter().position(|line| line.trim() == "CALL").unwrap();
		let pusha = listing[call_index - 1].trim();
		assert!(pusha.starts_with("PUSHA "));
		let label = pusha.strip_prefix("PUSHA ").unwrap();
		assert_eq!(listing.iter().filter(|line| *line == &format!("{label}:")).count(), 1);
	}
}
