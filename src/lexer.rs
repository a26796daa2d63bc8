use fxhash::FxHashMap;

use crate::symbol::Span;

/// A single token with its location in the preprocessed source.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Token {
    pub text: String,
    pub span: Span,
}

impl Token {
    pub fn new(text: impl Into<String>, span: Span) -> Self {
        Token {
            text: text.into(),
            span,
        }
    }
}

/// One source line's worth of tokens. Empty and comment-only lines produce
/// an empty token vector so that line positions survive tokenization.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct Line {
    pub tokens: Vec<Token>,
}

const COMMENT_CHAR: char = '#';

/// Tokenize preprocessed source into per-line token vectors.
///
/// Rules:
/// - `#` starts a comment that runs to end of line
/// - commas count as whitespace
/// - tokens matching a `%define` key are substituted with the defined value,
///   keeping the original token's span for diagnostics
pub fn tokenize(src: &str, defines: &FxHashMap<String, String>) -> Vec<Line> {
    let mut lines = Vec::new();
    let mut offset = 0;

    for raw in src.split_inclusive('\n') {
        let line = raw.strip_suffix('\n').unwrap_or(raw);
        let line = line.strip_suffix('\r').unwrap_or(line);
        let visible = match line.find(COMMENT_CHAR) {
            Some(ix) => &line[..ix],
            None => line,
        };

        let mut tokens = Vec::new();
        let mut start = None;
        for (ix, c) in visible.char_indices() {
            if c.is_whitespace() || c == ',' {
                if let Some(s) = start.take() {
                    tokens.push(make_token(&visible[s..ix], offset + s, defines));
                }
            } else if start.is_none() {
                start = Some(ix);
            }
        }
        if let Some(s) = start {
            tokens.push(make_token(&visible[s..], offset + s, defines));
        }

        lines.push(Line { tokens });
        offset += raw.len();
    }

    lines
}

fn make_token(text: &str, offs: usize, defines: &FxHashMap<String, String>) -> Token {
    let span = Span::at(offs, text.len());
    match defines.get(text) {
        Some(substitution) => Token::new(substitution.clone(), span),
        None => Token::new(text, span),
    }
}
