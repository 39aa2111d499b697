/// A single fd a redirection can target. Only stdout (1) and stderr (2) are
/// addressable — this shell has no input-redirection syntax.
pub type Fd = u8;

/// An operator token recognized at an unquoted word boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorKind {
    /// `|`
    Pipe,
    /// `>`, `1>` (append = false) or `>>`, `1>>` (append = true); `2>`/`2>>` analogously for fd 2.
    RedirOut { fd: Fd, append: bool },
}

/// The smallest lexical unit produced by the tokenizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Word(String),
    Operator(OperatorKind),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenizeError {
    UnterminatedQuote,
}

/// States for the tokenizer state machine.
enum State {
    /// Between tokens — whitespace is skipped.
    Normal,
    /// Building an unquoted word — whitespace ends it, operator chars split it.
    InWord,
    /// Inside double quotes — whitespace and operator chars are literal.
    InDoubleQuote,
    /// Inside single quotes — everything is literal, including backslash.
    InSingleQuote,
}

/// Tokenize one line of shell input into [`Token`]s.
///
/// Honors single-quote, double-quote, and backslash rules (see spec §4.1),
/// and recognizes `|`, `>`, `>>`, `1>`, `1>>`, `2>`, `2>>` as operators when
/// they appear unquoted. A leading `1` or `2` is only folded into an
/// operator when it is the entire word accumulated so far and is
/// immediately followed by `>`; otherwise it is an ordinary word character.
///
/// Fails with [`TokenizeError::UnterminatedQuote`] if the line ends inside
/// an open `'` or `"`. Callers are expected to fall back to whitespace-only
/// splitting of the original line in that case (see `pipeline::parse_line`).
pub fn tokenize(input: &str) -> Result<Vec<Token>, TokenizeError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut state = State::Normal;
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        match (&state, ch) {
            // ── Normal: between tokens ──
            (State::Normal, ' ' | '\t') => {}
            (State::Normal, '"') => state = State::InDoubleQuote,
            (State::Normal, '\'') => state = State::InSingleQuote,
            (State::Normal, '\\') => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
                state = State::InWord;
            }
            (State::Normal, '|') => {
                tokens.push(Token::Operator(OperatorKind::Pipe));
            }
            (State::Normal, '>') => {
                push_redir(&mut tokens, &mut current, 1, &mut chars);
            }
            (State::Normal, c) => {
                current.push(c);
                state = State::InWord;
            }

            // ── InWord: building an unquoted word ──
            (State::InWord, ' ' | '\t') => {
                tokens.push(Token::Word(std::mem::take(&mut current)));
                state = State::Normal;
            }
            (State::InWord, '"') => state = State::InDoubleQuote,
            (State::InWord, '\'') => state = State::InSingleQuote,
            (State::InWord, '\\') => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            (State::InWord, '|') => {
                flush_word(&mut tokens, &mut current);
                tokens.push(Token::Operator(OperatorKind::Pipe));
                state = State::Normal;
            }
            (State::InWord, '>') => {
                let fd = match current.as_str() {
                    "1" => {
                        current.clear();
                        1
                    }
                    "2" => {
                        current.clear();
                        2
                    }
                    _ => {
                        flush_word(&mut tokens, &mut current);
                        1
                    }
                };
                push_redir(&mut tokens, &mut current, fd, &mut chars);
                state = State::Normal;
            }
            (State::InWord, c) => current.push(c),

            // ── InDoubleQuote ──
            (State::InDoubleQuote, '"') => state = State::InWord,
            (State::InDoubleQuote, '\\') => match chars.peek() {
                Some(&('"' | '\\' | '$' | '`')) => current.push(chars.next().unwrap()),
                Some(&'\n') => {
                    chars.next();
                }
                _ => current.push('\\'),
            },
            (State::InDoubleQuote, c) => current.push(c),

            // ── InSingleQuote ──
            (State::InSingleQuote, '\'') => state = State::InWord,
            (State::InSingleQuote, c) => current.push(c),
        }
    }

    match state {
        State::InDoubleQuote | State::InSingleQuote => Err(TokenizeError::UnterminatedQuote),
        _ => {
            if !current.is_empty() {
                tokens.push(Token::Word(current));
            }
            Ok(tokens)
        }
    }
}

/// Having already decided the redirect targets fd `fd`, consume an optional
/// second `>` (making it an append redirect) and push the operator token.
fn push_redir(
    tokens: &mut Vec<Token>,
    current: &mut String,
    fd: Fd,
    chars: &mut std::iter::Peekable<std::str::Chars>,
) {
    flush_word(tokens, current);
    let append = if chars.peek() == Some(&'>') {
        chars.next();
        true
    } else {
        false
    };
    tokens.push(Token::Operator(OperatorKind::RedirOut { fd, append }));
}

fn flush_word(tokens: &mut Vec<Token>, current: &mut String) {
    if !current.is_empty() {
        tokens.push(Token::Word(std::mem::take(current)));
    }
}

/// Re-tokenize already whitespace-split pieces (the `UnterminatedQuote`
/// fallback path) by checking each piece for an operator prefix. No
/// quote processing happens here — the pieces are taken as literal text,
/// matching the shell's documented fallback behavior.
pub fn classify_plain_words(words: Vec<String>) -> Vec<Token> {
    // Longest prefix first so `1>>` isn't mistaken for `1>`.
    const PREFIXES: &[(&str, Fd, bool)] = &[
        ("1>>", 1, true),
        ("2>>", 2, true),
        ("1>", 1, false),
        ("2>", 2, false),
        (">>", 1, true),
        (">", 1, false),
    ];

    let mut tokens = Vec::with_capacity(words.len());
    for word in words {
        if word == "|" {
            tokens.push(Token::Operator(OperatorKind::Pipe));
            continue;
        }
        if let Some(&(_, fd, append)) = PREFIXES.iter().find(|(p, ..)| word == *p) {
            tokens.push(Token::Operator(OperatorKind::RedirOut { fd, append }));
            continue;
        }
        if let Some(&(prefix, fd, append)) = PREFIXES.iter().find(|(p, ..)| word.starts_with(p)) {
            tokens.push(Token::Operator(OperatorKind::RedirOut { fd, append }));
            let rest = &word[prefix.len()..];
            if !rest.is_empty() {
                tokens.push(Token::Word(rest.to_string()));
            }
            continue;
        }
        tokens.push(Token::Word(word));
    }
    tokens
}
