use std::collections::VecDeque;

use crate::token::{Token, TokenKind};

/// Tokenizes Pascal source code into a queue of tokens, ready to be consumed by the parser.
///
/// Comments (`{ ... }` and `(* ... *)`) and whitespace are discarded and never appear in the returned queue. Keywords
/// and identifiers are matched case-insensitively; an identifier's `value` is folded to lower case so every later
/// stage can compare names with a plain `==`. Unknown characters are reported on their line and skipped, so the rest
/// of the file can still be scanned; the driver still treats the returned error as fatal for the file (see
/// `SPEC_FULL.md` §7), but a single bad character doesn't prevent reporting every other one found.
///
/// # Errors
/// Returns an error if the source contains a character sequence that matches no token kind, or an unterminated
/// string or comment.
pub fn tokenize(source: &str) -> anyhow::Result<VecDeque<Token>> {
	let mut remaining = source;
	let mut tokens = Vec::new();
	let mut line = 1_usize;
	let mut lexical_errors = Vec::new();

	while !remaining.is_empty() {
		if let Some(rest) = remaining.strip_prefix(char::is_whitespace) {
			if remaining.starts_with('\n') {
				line += 1;
			}
			remaining = rest;
			continue;
		}

		if let Some(rest) = remaining.strip_prefix('{') {
			let Some(end) = rest.find('}') else {
				anyhow::bail!(crate::error::CompileError::lexical(line, "unterminated comment"));
			};
			line += rest[..end].matches('\n').count();
			remaining = &rest[end + 1..];
			continue;
		}

		if let Some(rest) = remaining.strip_prefix("(*") {
			let Some(end) = rest.find("*)") else {
				anyhow::bail!(crate::error::CompileError::lexical(line, "unterminated comment"));
			};
			line += rest[..end].matches('\n').count();
			remaining = &rest[end + 2..];
			continue;
		}

		if let Some((kind, lexeme)) = TokenKind::identify(remaining) {
			let value = canonicalize(kind, &lexeme);
			tokens.push(Token { kind, value, line });
			remaining = &remaining[lexeme.len()..];
			continue;
		}

		let bad_char = remaining.chars().next().unwrap_or_default();
		lexical_errors.push(crate::error::CompileError::lexical(line, format!("unknown character {bad_char:?}")));
		remaining = &remaining[bad_char.len_utf8()..];
	}

	if let Some(first) = lexical_errors.into_iter().next() {
		return Err(first.into());
	}

	Ok(VecDeque::from(tokens))
}

/// Canonicalizes a matched lexeme into the `value` that's stored on the `Token`. Keywords and identifiers are folded
/// to lower case; string literals have their surrounding quotes stripped and doubled quotes un-escaped; everything
/// else (numbers, punctuation) is kept as written.
fn canonicalize(kind: TokenKind, lexeme: &str) -> String {
	match kind {
		_ if kind.is_keyword() || kind == TokenKind::Identifier => lexeme.to_lowercase(),
		TokenKind::StringLiteral => lexeme
			.strip_prefix('\'')
			.and_then(|rest| rest.strip_suffix('\''))
			.unwrap_or(lexeme)
			.replace("''", "'"),
		_ => lexeme.to_owned(),
	}
}

impl TokenKind {
	/// Finds the first token kind (in declaration order) whose pattern matches the start of `code`, returning it
	/// along with the matched lexeme.
	fn identify(code: &str) -> Option<(Self, String)> {
		Self::find_match(code)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn kinds(source: &str) -> Vec<TokenKind> {
		tokenize(source).unwrap().into_iter().map(|token| token.kind).collect()
	}

	#[test]
	fn tokenizes_program_header() {
		assert_eq!(
			kinds("program P;"),
			vec![TokenKind::KeywordProgram, TokenKind::Identifier, TokenKind::Semicolon]
		);
	}

	#[test]
	fn distinguishes_integer_and_real() {
		let tokens = tokenize("42 3.14").unwrap();
		assert_eq!(tokens[0].kind, TokenKind::Integer);
		assert_eq!(tokens[0].value, "42");
		assert_eq!(tokens[1].kind, TokenKind::Real);
		assert_eq!(tokens[1].value, "3.14");
	}

	#[test]
	fn array_bound_dotdot_is_not_swallowed_by_real() {
		let tokens = tokenize("[1..3]").unwrap();
		let kinds = tokens.iter().map(|token| token.kind).collect::<Vec<_>>();
		assert_eq!(
			kinds,
			vec![
				TokenKind::LeftBracket,
				TokenKind::Integer,
				TokenKind::DotDot,
				TokenKind::Integer,
				TokenKind::RightBracket,
			]
		);
	}

	#[test]
	fn keywords_are_case_insensitive_and_canonicalized() {
		let tokens = tokenize("BEGIN End").unwrap();
		assert_eq!(tokens[0].kind, TokenKind::KeywordBegin);
		assert_eq!(tokens[0].value, "begin");
		assert_eq!(tokens[1].kind, TokenKind::KeywordEnd);
	}

	#[test]
	fn strips_quotes_from_string_literals() {
		let tokens = tokenize("'hello'").unwrap();
		assert_eq!(tokens[0].kind, TokenKind::StringLiteral);
		assert_eq!(tokens[0].value, "hello");
	}

	#[test]
	fn doubled_quote_is_an_escaped_literal_quote() {
		let tokens = tokenize("'it''s'").unwrap();
		assert_eq!(tokens[0].value, "it's");
	}

	#[test]
	fn skips_both_comment_styles() {
		let tokens = tokenize("{ a comment } begin (* another *) end").unwrap();
		let kinds = tokens.iter().map(|token| token.kind).collect::<Vec<_>>();
		assert_eq!(kinds, vec![TokenKind::KeywordBegin, TokenKind::KeywordEnd]);
	}

	#[test]
	fn unknown_character_is_an_error() {
		assert!(tokenize("program P; @ begin end.").is_err());
	}

	#[test]
	fn tracks_line_numbers_across_newlines() {
		let tokens = tokenize("begin\nend").unwrap();
		assert_eq!(tokens[0].line, 1);
		assert_eq!(tokens[1].line, 2);
	}
}
