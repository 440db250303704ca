//! Lexical helpers for notebook queries that must not touch the engine.
//!
//! Everything here is a heuristic scanner, not a Lean parser. Offsets are
//! counted in chars (Unicode scalar values), matching how notebook front
//! ends report cursor positions.

/// Identifier found around a cursor position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierSpan {
    pub text: String,
    /// Inclusive start offset (chars).
    pub start: usize,
    /// Exclusive end offset (chars).
    pub end: usize,
}

impl IdentifierSpan {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Completion candidates plus the region of the input they replace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionResult {
    pub matches: Vec<String>,
    pub cursor_start: usize,
    pub cursor_end: usize,
}

/// Whether a cell's text looks like a finished statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completeness {
    Complete,
    Incomplete,
}

impl Completeness {
    pub fn as_str(&self) -> &'static str {
        match self {
            Completeness::Complete => "complete",
            Completeness::Incomplete => "incomplete",
        }
    }
}

/// Characters that may appear in a (possibly qualified) Lean identifier.
pub fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '\'' || c == '.'
}

/// Extract the identifier surrounding `cursor`.
///
/// The cursor is clamped to `[0, len]`. The span grows left and then right
/// from the cursor while characters are identifier constituents, so
/// `start <= cursor <= end` always holds.
pub fn extract_identifier(text: &str, cursor: usize) -> IdentifierSpan {
    let chars: Vec<char> = text.chars().collect();
    let cursor = cursor.min(chars.len());

    let mut start = cursor;
    while start > 0 && is_ident_char(chars[start - 1]) {
        start -= 1;
    }

    let mut end = cursor;
    while end < chars.len() && is_ident_char(chars[end]) {
        end += 1;
    }

    IdentifierSpan {
        text: chars[start..end].iter().collect(),
        start,
        end,
    }
}

/// Classify whether `text` is ready to be executed.
///
/// Tracks paren/brace/bracket depth outside strings and `--` line comments.
/// Unclosed brackets or an open string literal make the text incomplete;
/// surplus closers do not. Text mentioning `by` that does not end in `.` or
/// `)` is treated as an unterminated tactic block.
pub fn is_complete(text: &str) -> Completeness {
    let trimmed = text.trim_end();
    if trimmed.is_empty() {
        return Completeness::Incomplete;
    }

    let mut parens: i64 = 0;
    let mut braces: i64 = 0;
    let mut brackets: i64 = 0;
    let mut in_string = false;
    let mut escaped = false;
    let mut in_comment = false;

    let mut chars = trimmed.chars().peekable();
    while let Some(c) = chars.next() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        if in_comment {
            if c == '\n' {
                in_comment = false;
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '-' if chars.peek() == Some(&'-') => {
                chars.next();
                in_comment = true;
            }
            '(' => parens += 1,
            ')' => parens -= 1,
            '{' => braces += 1,
            '}' => braces -= 1,
            '[' => brackets += 1,
            ']' => brackets -= 1,
            _ => {}
        }
    }

    if parens > 0 || braces > 0 || brackets > 0 || in_string {
        return Completeness::Incomplete;
    }

    // Substring match on purpose: this also fires on identifiers such as
    // `bye` and on `by` inside comments or strings.
    if trimmed.contains("by") && !(trimmed.ends_with('.') || trimmed.ends_with(')')) {
        return Completeness::Incomplete;
    }

    Completeness::Complete
}

/// Source of completion candidates for a prefix.
///
/// The static vocabulary is the default; an engine-backed symbol query can
/// implement this without changing callers.
pub trait CandidateSource: Send + Sync {
    /// Candidates starting with `prefix`, in the source's preferred order.
    fn candidates(&self, prefix: &str) -> Vec<String>;
}

/// Fixed list of Lean keywords, common builtins and tactics.
#[derive(Debug, Clone)]
pub struct StaticVocabulary {
    words: Vec<String>,
}

const DEFAULT_VOCABULARY: &[&str] = &[
    "def", "theorem", "lemma", "example", "axiom", "inductive",
    "structure", "class", "instance", "namespace", "section",
    "variable", "variables", "constant", "import", "open",
    "by", "have", "show", "from", "let", "in",
    "match", "with", "do", "if", "then", "else",
    "fun", "λ", "forall", "∀", "exists", "∃",
    "Nat", "Int", "String", "Bool", "List", "Array", "Option",
    "Nat.add", "Nat.mul", "List.map", "List.filter",
    "simp", "rfl", "intro", "apply", "exact", "cases", "induction",
    "rw", "rewrite", "unfold", "split", "contradiction",
];

impl Default for StaticVocabulary {
    fn default() -> Self {
        Self {
            words: DEFAULT_VOCABULARY.iter().map(|w| w.to_string()).collect(),
        }
    }
}

impl StaticVocabulary {
    pub fn new(words: Vec<String>) -> Self {
        Self { words }
    }

    /// Default vocabulary followed by `extra` words not already present.
    pub fn with_extra(extra: &[String]) -> Self {
        let mut vocab = Self::default();
        for word in extra {
            if !vocab.words.contains(word) {
                vocab.words.push(word.clone());
            }
        }
        vocab
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }
}

impl CandidateSource for StaticVocabulary {
    fn candidates(&self, prefix: &str) -> Vec<String> {
        self.words
            .iter()
            .filter(|w| w.starts_with(prefix))
            .cloned()
            .collect()
    }
}

/// Complete the identifier under `cursor` against `source`.
pub fn complete(text: &str, cursor: usize, source: &dyn CandidateSource) -> CompletionResult {
    let span = extract_identifier(text, cursor);
    CompletionResult {
        matches: source.candidates(&span.text),
        cursor_start: span.start,
        cursor_end: span.end,
    }
}
