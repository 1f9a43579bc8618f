//! Console markup used by the styled renderer.
//!
//! Styled output wraps tokens in tags: `[blue]Program[/]`. A tag holds one
//! or more space-separated style words; `[/]` closes the innermost open tag.
//! Literal brackets are doubled (`[[` and `]]`). Bracketed text that is not
//! a known tag passes through unchanged.
//!
//! Recognized style words and their SGR codes:
//!
//! | Word        | SGR |
//! |-------------|-----|
//! | `bold`      | 1   |
//! | `dim`       | 2   |
//! | `underline` | 4   |
//! | `red`       | 31  |
//! | `green`     | 32  |
//! | `yellow`    | 33  |
//! | `blue`      | 34  |
//! | `white`     | 37  |
//! | `grey`      | 90  |

use std::borrow::Cow;

const RESET: &str = "\x1b[0m";

/// Escape literal brackets so text survives markup parsing.
pub fn escape(text: &str) -> Cow<'_, str> {
    if !text.contains(['[', ']']) {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len() + 4);
    for c in text.chars() {
        match c {
            '[' => out.push_str("[["),
            ']' => out.push_str("]]"),
            other => out.push(other),
        }
    }
    Cow::Owned(out)
}

/// Remove all tags and unescape brackets.
pub fn strip(markup: &str) -> String {
    let mut out = String::with_capacity(markup.len());
    parse(markup, |piece| {
        if let Piece::Text(text) = piece {
            out.push_str(text);
        }
    });
    out
}

/// Convert markup to text with ANSI SGR escapes.
pub fn to_ansi(markup: &str) -> String {
    let mut out = String::with_capacity(markup.len() + markup.len() / 2);
    let mut stack: Vec<String> = Vec::new();
    parse(markup, |piece| match piece {
        Piece::Text(text) => out.push_str(text),
        Piece::Open(codes) => {
            push_sgr(&mut out, &codes);
            stack.push(codes);
        }
        Piece::Close => {
            if stack.pop().is_some() {
                out.push_str(RESET);
                for codes in &stack {
                    push_sgr(&mut out, codes);
                }
            }
        }
    });
    if !stack.is_empty() {
        out.push_str(RESET);
    }
    out
}

fn push_sgr(out: &mut String, codes: &str) {
    out.push_str("\x1b[");
    out.push_str(codes);
    out.push('m');
}

fn sgr_code(word: &str) -> Option<&'static str> {
    let code = match word {
        "bold" => "1",
        "dim" => "2",
        "underline" => "4",
        "red" => "31",
        "green" => "32",
        "yellow" => "33",
        "blue" => "34",
        "white" => "37",
        "grey" | "gray" => "90",
        _ => return None,
    };
    Some(code)
}

/// `"red bold"` to `"31;1"`; `None` if any word is unknown.
fn tag_codes(tag: &str) -> Option<String> {
    let mut codes = Vec::new();
    for word in tag.split_whitespace() {
        codes.push(sgr_code(word)?);
    }
    if codes.is_empty() {
        return None;
    }
    Some(codes.join(";"))
}

enum Piece<'a> {
    Text(&'a str),
    Open(String),
    Close,
}

fn parse<'a>(markup: &'a str, mut emit: impl FnMut(Piece<'a>)) {
    let mut rest = markup;
    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix("[[") {
            emit(Piece::Text("["));
            rest = after;
        } else if let Some(after) = rest.strip_prefix("]]") {
            emit(Piece::Text("]"));
            rest = after;
        } else if rest.starts_with('[') {
            match rest.find(']') {
                Some(close) => {
                    let tag = &rest[1..close];
                    if tag == "/" {
                        emit(Piece::Close);
                    } else if let Some(codes) = tag_codes(tag) {
                        emit(Piece::Open(codes));
                    } else {
                        emit(Piece::Text(&rest[..=close]));
                    }
                    rest = &rest[close + 1..];
                }
                None => {
                    emit(Piece::Text(rest));
                    rest = "";
                }
            }
        } else if rest.starts_with(']') {
            emit(Piece::Text("]"));
            rest = &rest[1..];
        } else {
            let end = rest.find(['[', ']']).unwrap_or(rest.len());
            emit(Piece::Text(&rest[..end]));
            rest = &rest[end..];
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
