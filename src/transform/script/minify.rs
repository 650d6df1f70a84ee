// src/transform/script/minify.rs

/// Conservative JavaScript minifier.
///
/// Strips comments (keeping `/*! ... */`), trims every line and drops blank
/// lines. Line breaks are kept, so automatic semicolon insertion behaves
/// exactly as in the source. Strings, template literals and regular
/// expression literals are copied verbatim.
pub fn minify_js(src: &str) -> String {
    let stripped = strip_comments(src);
    let mut out = String::with_capacity(stripped.len());
    for line in stripped.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        out.push_str(line);
        out.push('\n');
    }
    out
}

fn strip_comments(src: &str) -> String {
    let chars: Vec<char> = src.chars().collect();
    let mut out = String::with_capacity(src.len());
    let mut i = 0;
    // Last non-whitespace character emitted, used to tell regex from division.
    let mut prev_significant: Option<char> = None;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();

        match c {
            '"' | '\'' | '`' => {
                let end = skip_quoted(&chars, i, c);
                out.extend(&chars[i..end]);
                i = end;
                prev_significant = Some(c);
                continue;
            }
            '/' if next == Some('/') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
                continue;
            }
            '/' if next == Some('*') => {
                let start = i;
                i += 2;
                while i + 1 < chars.len() && !(chars[i] == '*' && chars[i + 1] == '/') {
                    i += 1;
                }
                let end = (i + 2).min(chars.len());
                if chars.get(start + 2) == Some(&'!') {
                    out.extend(&chars[start..end]);
                } else if chars[start..end].contains(&'\n') {
                    out.push('\n');
                } else {
                    out.push(' ');
                }
                i = end;
                continue;
            }
            '/' if regex_allowed(prev_significant) => {
                let end = skip_regex(&chars, i);
                out.extend(&chars[i..end]);
                i = end;
                prev_significant = Some('/');
                continue;
            }
            _ => {}
        }

        if !c.is_whitespace() {
            prev_significant = Some(c);
        }
        out.push(c);
        i += 1;
    }
    out
}

fn regex_allowed(prev: Option<char>) -> bool {
    match prev {
        None => true,
        Some(c) => "(,=:[!&|?{};+-*%<>~^".contains(c),
    }
}

/// Index one past the closing quote (or end of input).
fn skip_quoted(chars: &[char], start: usize, quote: char) -> usize {
    let mut i = start + 1;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 2,
            c if c == quote => return i + 1,
            '\n' if quote != '`' => return i,
            _ => i += 1,
        }
    }
    chars.len()
}

fn skip_regex(chars: &[char], start: usize) -> usize {
    let mut i = start + 1;
    let mut in_class = false;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 2,
            '[' => {
                in_class = true;
                i += 1;
            }
            ']' => {
                in_class = false;
                i += 1;
            }
            '/' if !in_class => {
                i += 1;
                while i < chars.len() && chars[i].is_ascii_alphabetic() {
                    i += 1;
                }
                return i;
            }
            '\n' => return i,
            _ => i += 1,
        }
    }
    chars.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removes_comments_and_blank_lines() {
        let src = "/*! keep */\n// line\nvar a = 1; // trailing\n\n/* block */\nvar b = a / 2;\n";
        assert_eq!(minify_js(src), "/*! keep */\nvar a = 1;\nvar b = a / 2;\n");
    }

    #[test]
    fn strings_and_regexes_are_untouched() {
        let src = "var u = \"http://x\"; var r = /\\/\\/[a/]*/g; var t = `a // b`;";
        assert_eq!(minify_js(src), format!("{src}\n"));
    }
}
