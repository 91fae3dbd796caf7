// Bring the `IntoEnumIterator` trait into scope, which allows us to use `::iter()` on enums that `#[derive(strum_macros::EnumIter)]`. This is used by
// `TokenKind::find_match` to try every variant's pattern in declaration order against the head of the remaining source.
use strum::IntoEnumIterator as _;

// Bring the `Casing` trait into scope so `TokenKind`'s `Display` impl can render `KeywordBegin` as `Keyword Begin` in error messages.
use convert_case::Casing as _;

/// A kind of token recognized by the tokenizer. Declaration order matters: `find_match` tries variants in the order they're
/// declared here, so keywords must be listed before `Identifier` (otherwise `begin` would tokenize as an identifier) and
/// multi-character operators must be listed before any single-character operator they share a prefix with (`Assign` before
/// `Colon`, `NotEqual`/`LessEqual` before `LessThan`).
#[derive(strum_macros::EnumIter, PartialEq, Eq, Debug, Clone, Copy)]
pub enum TokenKind {
	KeywordProgram,
	KeywordVar,
	KeywordArray,
	KeywordOf,
	KeywordFunction,
	KeywordProcedure,
	KeywordBegin,
	KeywordEnd,
	KeywordIf,
	KeywordThen,
	KeywordElse,
	KeywordWhile,
	KeywordDo,
	KeywordFor,
	KeywordDownto,
	KeywordTo,
	KeywordDiv,
	KeywordMod,
	KeywordAndThen,
	KeywordAnd,
	KeywordOrElse,
	KeywordOr,
	KeywordNot,
	KeywordIn,
	KeywordWrite,
	KeywordWriteln,
	KeywordRead,
	KeywordReadln,

	/// The `Integer` type keyword, e.g. `var x: Integer`. Distinct from the `Integer` literal kind below.
	KeywordInteger,
	KeywordReal,
	KeywordBoolean,
	KeywordChar,
	KeywordString,

	/// An identifier. Canonicalized to lower case in `value`. `true` and `false` also tokenize as identifiers;
	/// it's the parser's job to recognize them as boolean literals (see `parser::factor`).
	Identifier,

	/// A real (floating point) literal, e.g. `3.14`. Distinguished from `Integer` by the presence of a `.` followed by a digit.
	/// Must be tried before `Integer`, since matching is first-match (not longest-match) and `Integer`'s pattern is a strict
	/// prefix of `Real`'s.
	Real,
	/// An integer literal, e.g. `42`.
	Integer,
	/// A single-quoted string literal. The surrounding quotes are stripped from `value`.
	StringLiteral,

	Assign,
	DotDot,
	Dot,
	Colon,
	Semicolon,
	Comma,
	LeftParenthesis,
	RightParenthesis,
	LeftBracket,
	RightBracket,
	Equal,
	NotEqual,
	LessEqual,
	GreaterEqual,
	LessThan,
	GreaterThan,
	Plus,
	Minus,
	Asterisk,
	Slash,
}

impl TokenKind {
	/// Returns a regular expression pattern that matches this token kind at the *start* of the remaining source.
	/// The returned value is a lazily-evaluated static, so there is no performance cost to calling this repeatedly.
	fn pattern(self) -> &'static regex_macro::Regex {
		match self {
			Self::KeywordProgram => regex_macro::regex!(r"(?i)^program\b"),
			Self::KeywordVar => regex_macro::regex!(r"(?i)^var\b"),
			Self::KeywordArray => regex_macro::regex!(r"(?i)^array\b"),
			Self::KeywordOf => regex_macro::regex!(r"(?i)^of\b"),
			Self::KeywordFunction => regex_macro::regex!(r"(?i)^function\b"),
			Self::KeywordProcedure => regex_macro::regex!(r"(?i)^procedure\b"),
			Self::KeywordBegin => regex_macro::regex!(r"(?i)^begin\b"),
			Self::KeywordEnd => regex_macro::regex!(r"(?i)^end\b"),
			Self::KeywordIf => regex_macro::regex!(r"(?i)^if\b"),
			Self::KeywordThen => regex_macro::regex!(r"(?i)^then\b"),
			Self::KeywordElse => regex_macro::regex!(r"(?i)^else\b"),
			Self::KeywordWhile => regex_macro::regex!(r"(?i)^while\b"),
			Self::KeywordDo => regex_macro::regex!(r"(?i)^do\b"),
			Self::KeywordFor => regex_macro::regex!(r"(?i)^for\b"),
			// Must come before `KeywordDo`'s sibling `KeywordTo`, and before `Identifier`.
			Self::KeywordDownto => regex_macro::regex!(r"(?i)^downto\b"),
			Self::KeywordTo => regex_macro::regex!(r"(?i)^to\b"),
			Self::KeywordDiv => regex_macro::regex!(r"(?i)^div\b"),
			Self::KeywordMod => regex_macro::regex!(r"(?i)^mod\b"),
			// Must come before `KeywordAnd`/`KeywordOr`.
			Self::KeywordAndThen => regex_macro::regex!(r"(?i)^andthen\b"),
			Self::KeywordAnd => regex_macro::regex!(r"(?i)^and\b"),
			Self::KeywordOrElse => regex_macro::regex!(r"(?i)^orelse\b"),
			Self::KeywordOr => regex_macro::regex!(r"(?i)^or\b"),
			Self::KeywordNot => regex_macro::regex!(r"(?i)^not\b"),
			Self::KeywordIn => regex_macro::regex!(r"(?i)^in\b"),
			// Must come before `KeywordWrite`.
			Self::KeywordWriteln => regex_macro::regex!(r"(?i)^writeln\b"),
			Self::KeywordWrite => regex_macro::regex!(r"(?i)^write\b"),
			// Must come before `KeywordRead`.
			Self::KeywordReadln => regex_macro::regex!(r"(?i)^readln\b"),
			Self::KeywordRead => regex_macro::regex!(r"(?i)^read\b"),
			Self::KeywordInteger => regex_macro::regex!(r"(?i)^integer\b"),
			Self::KeywordReal => regex_macro::regex!(r"(?i)^real\b"),
			Self::KeywordBoolean => regex_macro::regex!(r"(?i)^boolean\b"),
			Self::KeywordChar => regex_macro::regex!(r"(?i)^char\b"),
			Self::KeywordString => regex_macro::regex!(r"(?i)^string\b"),

			Self::Identifier => regex_macro::regex!(r"^[A-Za-z_]\w*"),
			Self::Real => regex_macro::regex!(r"^\d+\.\d+"),
			Self::Integer => regex_macro::regex!(r"^\d+"),
			Self::StringLiteral => regex_macro::regex!(r"^'(?:[^']|'')*'"),

			// `:=` must come before `:`; `..` before `.`; `<>`/`<=` before `<`; `>=` before `>`.
			Self::Assign => regex_macro::regex!("^:="),
			Self::DotDot => regex_macro::regex!(r"^\.\."),
			Self::Dot => regex_macro::regex!(r"^\."),
			Self::Colon => regex_macro::regex!("^:"),
			Self::Semicolon => regex_macro::regex!("^;"),
			Self::Comma => regex_macro::regex!("^,"),
			Self::LeftParenthesis => regex_macro::regex!(r"^\("),
			Self::RightParenthesis => regex_macro::regex!(r"^\)"),
			Self::LeftBracket => regex_macro::regex!(r"^\["),
			Self::RightBracket => regex_macro::regex!(r"^\]"),
			Self::NotEqual => regex_macro::regex!("^<>"),
			Self::LessEqual => regex_macro::regex!("^<="),
			Self::LessThan => regex_macro::regex!("^<"),
			Self::GreaterEqual => regex_macro::regex!("^>="),
			Self::GreaterThan => regex_macro::regex!("^>"),
			Self::Equal => regex_macro::regex!("^="),
			Self::Plus => regex_macro::regex!(r"^\+"),
			Self::Minus => regex_macro::regex!("^-"),
			Self::Asterisk => regex_macro::regex!(r"^\*"),
			Self::Slash => regex_macro::regex!("^/"),
		}
	}

	/// Tries to match this token kind at the start of `code`.
	fn get_match(self, code: &str) -> Option<String> {
		self.pattern().find(code).map(|found| found.as_str().to_owned())
	}

	/// Finds the first token kind (in declaration order) that matches the start of `code`.
	pub(crate) fn find_match(code: &str) -> Option<(Self, String)> {
		for kind in Self::iter() {
			if let Some(matched) = kind.get_match(code) {
				return Some((kind, matched));
			}
		}
		None
	}

	/// Whether this token kind denotes a keyword. Used by the tokenizer to decide whether an `Identifier`-shaped
	/// lexeme should instead be returned with its matching keyword kind.
	#[must_use]
	pub const fn is_keyword(self) -> bool {
		!matches!(
			self,
			Self::Identifier | Self::Integer | Self::Real | Self::StringLiteral | Self::Assign | Self::DotDot | Self::Dot | Self::Colon | Self::Semicolon | Self::Comma | Self::LeftParenthesis | Self::RightParenthesis | Self::LeftBracket | Self::RightBracket | Self::Equal | Self::NotEqual | Self::LessEqual | Self::GreaterEqual | Self::LessThan | Self::GreaterThan | Self::Plus | Self::Minus | Self::Asterisk | Self::Slash
		)
	}
}

impl std::fmt::Display for TokenKind {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", format!("{self:?}").to_case(convert_case::Case::Title))
	}
}

/// A single token produced by the tokenizer, carrying its kind, its canonicalized lexeme, and the source line it
/// appeared on (for error reporting; see `SPEC_FULL.md` §4.A).
#[derive(Debug, Clone)]
pub struct Token {
	pub kind: TokenKind,
	pub value: String,
	pub line: usize,
}
