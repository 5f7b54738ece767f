//! Tokenization of Dockerfile text into instructions using `nom`.
//!
//! Physical lines are first folded into logical lines (comments dropped,
//! `\` continuations joined, heredoc bodies consumed), then each logical
//! line is split into a keyword, its leading `--flags`, and its arguments.

use dockmod_common::error::{DockmodError, Result};
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{is_not, tag, take_till1, take_while1},
    character::complete::{char, space0, space1},
    combinator::{map, recognize},
    multi::many0,
    sequence::{delimited, preceded},
};

/// A single Dockerfile instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    /// Upper-cased instruction keyword (`FROM`, `RUN`, ...).
    pub keyword: String,
    /// Leading `--flag[=value]` tokens, verbatim.
    pub flags: Vec<String>,
    /// Remaining whitespace separated arguments, unquoted.
    pub args: Vec<String>,
    /// One-based line number where the instruction starts.
    pub line: usize,
}

/// A logical line assembled from one or more physical lines.
struct LogicalLine {
    text: String,
    line: usize,
}

fn is_space(c: char) -> bool {
    c == ' ' || c == '\t'
}

/// Parses the instruction keyword.
fn keyword(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_alphabetic())(input)
}

/// Parses a `--flag` or `--flag=value` token.
fn flag(input: &str) -> IResult<&str, &str> {
    recognize(preceded(tag("--"), take_till1(is_space))).parse(input)
}

/// Parses a quoted or bare word. Quotes are stripped but may appear in the
/// middle of a word (`X="a b"` yields `X=a b`).
fn word(input: &str) -> IResult<&str, String> {
    let double = delimited(
        char('"'),
        map(many0(is_not("\"")), |s: Vec<&str>| s.concat()),
        char('"'),
    );
    let single = delimited(
        char('\''),
        map(many0(is_not("'")), |s: Vec<&str>| s.concat()),
        char('\''),
    );
    let bare = map(is_not(" \t\"'"), |s: &str| s.to_string());
    map(many0(alt((double, single, bare))), |parts: Vec<String>| {
        parts.concat()
    })
        .parse(input)
        .and_then(|(rest, w)| {
            if w.is_empty() && rest.len() == input.len() {
                Err(nom::Err::Error(nom::error::Error::new(
                    input,
                    nom::error::ErrorKind::TakeTill1,
                )))
            } else {
                Ok((rest, w))
            }
        })
}

/// Parses one logical line into its components.
fn instruction(input: &str) -> IResult<&str, (&str, Vec<&str>, Vec<String>)> {
    let (input, _) = space0(input)?;
    let (input, kw) = keyword(input)?;
    let (input, flags) = many0(preceded(space1, flag)).parse(input)?;
    let (input, args) = many0(preceded(space1, word)).parse(input)?;
    let (input, _) = space0(input)?;
    Ok((input, (kw, flags, args)))
}

/// Folds physical lines into logical ones.
fn logical_lines(input: &str) -> Vec<LogicalLine> {
    let mut out = Vec::new();
    let mut current: Option<LogicalLine> = None;
    let mut heredoc: Option<String> = None;

    for (idx, raw) in input.lines().enumerate() {
        if let Some(terminator) = &heredoc {
            if raw.trim() == terminator {
                heredoc = None;
            }
            continue;
        }

        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let (body, continues) = trimmed
            .strip_suffix('\\')
            .map_or((trimmed, false), |b| (b.trim_end(), true));

        let entry = current.get_or_insert_with(|| LogicalLine {
            text: String::new(),
            line: idx + 1,
        });
        if !entry.text.is_empty() {
            entry.text.push(' ');
        }
        entry.text.push_str(body);

        if !continues {
            if let Some(done) = current.take() {
                heredoc = heredoc_terminator(&done.text);
                out.push(done);
            }
        }
    }

    if let Some(done) = current.take() {
        out.push(done);
    }
    out
}

/// Returns the terminator word of a `<<EOF` heredoc opened on this line.
fn heredoc_terminator(text: &str) -> Option<String> {
    text.split_whitespace().find_map(|token| {
        let marker = token.strip_prefix("<<")?;
        let marker = marker.strip_prefix('-').unwrap_or(marker);
        let marker = marker.trim_matches(|c| c == '"' || c == '\'');
        (!marker.is_empty() && marker.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'))
            .then(|| marker.to_string())
    })
}

/// Tokenizes a Dockerfile into its instruction list.
///
/// # Errors
///
/// Returns a parse error naming the line when a logical line does not
/// start with an instruction keyword.
pub fn tokenize(filename: &str, input: &str) -> Result<Vec<Instruction>> {
    let mut instructions = Vec::new();

    for logical in logical_lines(input) {
        let (rest, (kw, flags, args)) =
            instruction(&logical.text).map_err(|e| DockmodError::Parse {
                descriptor: filename.to_string(),
                message: format!("line {}: malformed instruction ({e})", logical.line),
            })?;

        if !rest.is_empty() {
            return Err(DockmodError::Parse {
                descriptor: filename.to_string(),
                message: format!(
                    "line {}: unterminated quote near \"{}\"",
                    logical.line,
                    rest.chars().take(20).collect::<String>()
                ),
            });
        }

        instructions.push(Instruction {
            keyword: kw.to_ascii_uppercase(),
            flags: flags.into_iter().map(str::to_string).collect(),
            args,
            line: logical.line,
        });
    }

    Ok(instructions)
}
