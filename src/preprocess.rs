use std::fs;

use fxhash::FxHashMap;
use miette::Result;

use crate::error;
use crate::symbol::Span;

pub const TOK_INCLUDE: &str = "%include";
pub const TOK_DEFINE: &str = "%define";

/// Expand `%include` and `%define` directives until none remain.
///
/// `%include PATH` splices the named file's contents in place of the
/// directive line. `%define KEY VALUE` records a substitution for the lexer
/// and blanks the line. Spliced files are re-scanned, so included files may
/// themselves define and include.
pub fn preprocess(mut src: String, defines: &mut FxHashMap<String, String>) -> Result<String> {
    loop {
        let (out, had_include) = expand_include(src)?;
        let (out, had_define) = collect_define(out, defines)?;
        if !had_include && !had_define {
            return Ok(out);
        }
        src = out;
    }
}

/// Scan for a line holding `directive`, using a callback to produce the text
/// that replaces the directive line. Replaces at most one occurrence per
/// call; the caller loops to a fixed point.
fn process_directive_line<F>(
    mut src: String,
    directive: &str,
    replace_line: F,
) -> Result<(String, bool)>
where
    F: FnOnce(&str, Span, &str) -> Result<String>,
{
    let start = match src.find(directive) {
        Some(ix) => ix,
        None => return Ok((src, false)),
    };

    let end = src[start..]
        .find('\n')
        .map(|ix| ix + start)
        .unwrap_or(src.len());

    let rest = src[start + directive.len()..end].trim();
    let replacement = replace_line(rest, Span::from(start..end), &src)?;

    src.drain(start..(end + 1).min(src.len()));
    src.insert_str(start, &replacement);

    Ok((src, true))
}

fn expand_include(src: String) -> Result<(String, bool)> {
    process_directive_line(src, TOK_INCLUDE, |path, span, src| {
        fs::read_to_string(path).map_err(|e| error::preproc_failed_include(span, src, path, e))
    })
}

fn collect_define(src: String, defines: &mut FxHashMap<String, String>) -> Result<(String, bool)> {
    process_directive_line(src, TOK_DEFINE, |line, span, src| {
        parse_define(line, defines, span, src)?;
        Ok(String::from("\n"))
    })
}

fn parse_define(
    line: &str,
    defines: &mut FxHashMap<String, String>,
    span: Span,
    src: &str,
) -> Result<()> {
    if line.is_empty() {
        return Err(error::preproc_empty_define(span, src));
    }

    // The syntax is "%define key value"; everything after the first space
    // belongs to the value
    let first_space = line
        .find(' ')
        .ok_or_else(|| error::preproc_define_without_value(span, src, line))?;
    let (key, value) = line.split_at(first_space);
    let value = value.trim();

    if defines.contains_key(key) {
        return Err(error::preproc_duplicate_define(span, src, key));
    }
    defines.insert(key.to_string(), value.to_string());

    Ok(())
}
