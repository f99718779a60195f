//! Text utilities that look at a single line around a cursor.
//!
//! Every function here works on character indices (not bytes) and is total:
//! malformed or incomplete input yields an empty string or `None`.

/// Call expression enclosing a cursor, as seen on one line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallContext {
    /// Text of the callee, e.g. `self.foo` or `lib.bar`.
    pub callee: String,
    /// Number of top-level commas between the opening paren and the cursor.
    pub active_parameter: u32,
}

pub fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn is_expression_char(c: char) -> bool {
    is_word_char(c) || matches!(c, '.' | '[' | ']')
}

/// Identifier covering `index`, or an empty string.
pub fn word_at(line: &str, index: usize) -> String {
    let chars: Vec<char> = line.chars().collect();
    let index = index.min(chars.len());

    let mut start = index;
    while start > 0 && is_word_char(chars[start - 1]) {
        start -= 1;
    }
    let mut end = index;
    while end < chars.len() && is_word_char(chars[end]) {
        end += 1;
    }
    chars[start..end].iter().collect()
}

/// Dotted expression covering `index`.
///
/// Inside a balanced pair of parentheses the whole call is returned instead,
/// from the callee through the closing paren.
pub fn expression_at(line: &str, index: usize) -> String {
    let chars: Vec<char> = line.chars().collect();
    let index = index.min(chars.len());

    if let Some(open) = unmatched_open(&chars, index)
        && let Some(close) = matching_close(&chars, open)
    {
        let start = callee_start(&chars, open).unwrap_or(open);
        return chars[start..=close].iter().collect();
    }

    let mut start = index;
    while start > 0 && is_expression_char(chars[start - 1]) {
        start -= 1;
    }
    let mut end = index;
    while end < chars.len() && is_expression_char(chars[end]) {
        end += 1;
    }
    chars[start..end].iter().collect()
}

/// Whether the word covering `index` is named right after `self.`.
///
/// Only the text in front of the word counts, so `bar` in
/// `self.foo(self.bar())` is a member while `x` in `self.foo(x)` is not.
pub fn is_self_member(line: &str, index: usize) -> bool {
    let chars: Vec<char> = line.chars().collect();
    let index = index.min(chars.len());

    let mut start = index;
    while start > 0 && is_word_char(chars[start - 1]) {
        start -= 1;
    }
    let touches_word = start < index || chars.get(index).is_some_and(|c| is_word_char(*c));
    if !touches_word {
        return false;
    }
    let Some(receiver) = start.checked_sub("self.".len()) else {
        return false;
    };
    let prefix: String = chars[receiver..start].iter().collect();
    prefix == "self." && (receiver == 0 || !is_word_char(chars[receiver - 1]))
}

/// Call surrounding the cursor: callee text and active parameter index.
pub fn call_context(line: &str, index: usize) -> Option<CallContext> {
    let chars: Vec<char> = line.chars().collect();
    let index = index.min(chars.len());

    let open = unmatched_open(&chars, index)?;
    let start = callee_start(&chars, open)?;
    let callee: String = chars[start..open].iter().collect();
    let callee = callee.trim_end().to_string();

    let mut depth = 0usize;
    let mut active_parameter = 0;
    for &c in &chars[open + 1..index] {
        match c {
            '(' | '[' => depth += 1,
            ')' | ']' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => active_parameter += 1,
            _ => {}
        }
    }
    Some(CallContext {
        callee,
        active_parameter,
    })
}

/// Whether the cursor sits inside a parenthesis opened earlier on the line.
pub fn in_parentheses(line: &str, index: usize) -> bool {
    let chars: Vec<char> = line.chars().collect();
    unmatched_open(&chars, index.min(chars.len())).is_some()
}

/// Name of the function being called around the cursor, without its receiver.
pub fn call_target_name(line: &str, index: usize) -> Option<String> {
    let context = call_context(line, index)?;
    match parse_call_expression(&context.callee) {
        Some((_, method)) => Some(method),
        None if !context.callee.is_empty() && context.callee.chars().all(is_word_char) => {
            Some(context.callee)
        }
        None => None,
    }
}

/// Split `receiver.method(...)` into `(receiver, method)`.
///
/// A trailing argument list is dropped first, so `self.foo(self.bar())`
/// yields `("self", "foo")` and `self.baz(1).foo()` yields
/// `("self.baz(1)", "foo")`.
pub fn parse_call_expression(expression: &str) -> Option<(String, String)> {
    let chars: Vec<char> = expression.trim().chars().collect();

    let mut end = chars.len();
    if chars.last() == Some(&')') {
        end = matching_open(&chars, chars.len() - 1)?;
    }
    let callee = &chars[..end];

    let mut depth = 0usize;
    let mut dot = None;
    for (i, &c) in callee.iter().enumerate() {
        match c {
            '(' | '[' => depth += 1,
            ')' | ']' => depth = depth.saturating_sub(1),
            '.' if depth == 0 => dot = Some(i),
            _ => {}
        }
    }
    let dot = dot?;

    let receiver: String = callee[..dot].iter().collect();
    let method: String = callee[dot + 1..]
        .iter()
        .take_while(|c| is_word_char(**c))
        .collect();
    let receiver = receiver.trim().to_string();
    if receiver.is_empty() || method.is_empty() {
        return None;
    }
    Some((receiver, method))
}

/// Nearest `(` left of `index` that is not closed before `index`.
fn unmatched_open(chars: &[char], index: usize) -> Option<usize> {
    let mut depth = 0usize;
    for i in (0..index).rev() {
        match chars[i] {
            ')' => depth += 1,
            '(' if depth == 0 => return Some(i),
            '(' => depth -= 1,
            _ => {}
        }
    }
    None
}

fn matching_close(chars: &[char], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, &c) in chars.iter().enumerate().skip(open + 1) {
        match c {
            '(' => depth += 1,
            ')' if depth == 0 => return Some(i),
            ')' => depth -= 1,
            _ => {}
        }
    }
    None
}

fn matching_open(chars: &[char], close: usize) -> Option<usize> {
    let mut depth = 0usize;
    for i in (0..close).rev() {
        match chars[i] {
            ')' => depth += 1,
            '(' if depth == 0 => return Some(i),
            '(' => depth -= 1,
            _ => {}
        }
    }
    None
}

/// Start of the callee written before the paren at `open`.
///
/// Whitespace between callee and paren is allowed, and so are calls inside
/// the callee (`self.baz(1).foo`). `None` when nothing callable precedes it.
fn callee_start(chars: &[char], open: usize) -> Option<usize> {
    let mut start = open;
    while start > 0 && chars[start - 1] == ' ' {
        start -= 1;
    }
    let end = start;
    while start > 0 {
        let c = chars[start - 1];
        if is_expression_char(c) {
            start -= 1;
        } else if c == ')' {
            match matching_open(chars, start - 1) {
                Some(inner) => start = inner,
                None => break,
            }
        } else {
            break;
        }
    }
    (start < end).then_some(start)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_at() {
        let text = "self.foo = 123";
        assert_eq!(word_at(text, 0), "self");
        assert_eq!(word_at(text, 1), "self");
        assert_eq!(word_at(text, 5), "foo");
        assert_eq!(word_at(text, 12), "123");

        let text = "foo_bar = 123";
        assert_eq!(word_at(text, 0), "foo_bar");
        assert_eq!(word_at(text, 4), "foo_bar");
    }

    #[test]
    fn test_is_self_member() {
        assert!(is_self_member("self.owner", 7));
        let line = "    self._mint(receiver, amount)";
        assert!(is_self_member(line, 11));
        assert!(!is_self_member(line, 17));
        assert!(!is_self_member(line, 5));
        // members nested inside another self call
        let line = "x: uint256 = self.foo(self.bar(), self.owner)";
        assert!(is_self_member(line, 28));
        assert!(is_self_member(line, 40));
        assert!(is_self_member(line, 19));
        assert!(!is_self_member("myself.owner", 9));
        assert!(!is_self_member("lib.owner", 6));
        assert!(!is_self_member("self. ", 6));
    }

    #[test]
    fn test_word_at_whitespace_and_bounds() {
        assert_eq!(word_at("a =  b", 4), "");
        assert_eq!(word_at("", 3), "");
        assert_eq!(word_at("abc", 99), "abc");
    }

    #[test]
    fn test_expression_at() {
        let text = "self.foo = 123";
        assert_eq!(expression_at(text, 0), "self.foo");
        assert_eq!(expression_at(text, 1), "self.foo");
        assert_eq!(expression_at(text, 5), "self.foo");
        assert_eq!(expression_at(text, 12), "123");

        let text = "foo_bar = self.baz (1,2,3)";
        assert_eq!(expression_at(text, 0), "foo_bar");
        assert_eq!(expression_at(text, 4), "foo_bar");
        assert_eq!(expression_at(text, 21), "self.baz (1,2,3)");
    }

    #[test]
    fn test_expression_at_nested_calls() {
        let text = "self.foo(self.bar(), 2)";
        // between the parens of the inner call
        assert_eq!(expression_at(text, 18), "self.bar()");
        // on the inner callee, which sits inside the outer call
        assert_eq!(expression_at(text, 15), "self.foo(self.bar(), 2)");
        assert_eq!(expression_at(text, 6), "self.foo");
    }

    #[test]
    fn test_expression_at_unbalanced_parens() {
        assert_eq!(expression_at("x = self.foo(1, ", 15), "");
        assert_eq!(expression_at("x = self.foo(a", 14), "a");
    }

    #[test]
    fn test_expression_at_subscript() {
        assert_eq!(
            expression_at("    self.balances[msg.sender] = 1", 8),
            "self.balances[msg.sender]"
        );
    }

    #[test]
    fn test_parse_call_expression() {
        assert_eq!(
            parse_call_expression("self.foo()"),
            Some(("self".to_string(), "foo".to_string()))
        );
        assert_eq!(
            parse_call_expression("self.foo(self.bar())"),
            Some(("self".to_string(), "foo".to_string()))
        );
        assert_eq!(
            parse_call_expression("self.baz(1).foo()"),
            Some(("self.baz(1)".to_string(), "foo".to_string()))
        );
        assert_eq!(
            parse_call_expression("lib.transfer"),
            Some(("lib".to_string(), "transfer".to_string()))
        );
        assert_eq!(parse_call_expression("foo()"), None);
        assert_eq!(parse_call_expression(""), None);
        assert_eq!(parse_call_expression("self.foo(1))"), None);
    }

    #[test]
    fn test_call_context() {
        let context = call_context("    self.foo(1, 2)", 16).unwrap();
        assert_eq!(context.callee, "self.foo");
        assert_eq!(context.active_parameter, 1);

        let context = call_context("    self.foo(self.baz(1), 2)", 22).unwrap();
        assert_eq!(context.callee, "self.baz");
        assert_eq!(context.active_parameter, 0);

        let context = call_context("    self.foo(self.baz(1, 2), ", 29).unwrap();
        assert_eq!(context.callee, "self.foo");
        assert_eq!(context.active_parameter, 1);

        assert_eq!(call_context("    x = (1 + ", 13), None);
        assert_eq!(call_context("    x = 1", 9), None);
    }

    #[test]
    fn test_in_parentheses() {
        assert!(in_parentheses("def foo(x:", 10));
        assert!(!in_parentheses("def foo(x: uint256):", 20));
        assert!(!in_parentheses("", 4));
    }

    #[test]
    fn test_call_target_name() {
        assert_eq!(call_target_name("    self.foo(", 13), Some("foo".to_string()));
        assert_eq!(call_target_name("    p = Point(", 14), Some("Point".to_string()));
        assert_eq!(call_target_name("    self.baz(1).foo(", 20), Some("foo".to_string()));
        assert_eq!(call_target_name("    x = 1", 9), None);
    }
}
