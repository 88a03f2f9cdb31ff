/// Replace `${ENV_VAR}` placeholders in raw config text.
///
/// Unresolvable variables are left as-is so the parse error (or the
/// validation error for a missing secret) points at the placeholder.
pub fn substitute_env(input: &str) -> String {
    substitute_env_with(input, |name| std::env::var(name).ok())
}

fn substitute_env_with(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next();
            let mut name = String::new();
            let mut closed = false;
            for c in chars.by_ref() {
                if c == '}' {
                    closed = true;
                    break;
                }
                name.push(c);
            }
            if closed && !name.is_empty() {
                match lookup(&name) {
                    Some(val) => out.push_str(&val),
                    None => {
                        out.push_str("${");
                        out.push_str(&name);
                        out.push('}');
                    },
                }
            } else {
                out.push_str("${");
                out.push_str(&name);
                if closed {
                    out.push('}');
                }
            }
        } else {
            out.push(ch);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_root_key_placeholder() {
        let lookup = |name: &str| (name == "ENCRYPTION_KEY").then(|| "abc".to_string());
        assert_eq!(
            substitute_env_with("root_key = \"${ENCRYPTION_KEY}\"", lookup),
            "root_key = \"abc\""
        );
    }

    #[test]
    fn unresolved_and_malformed_are_literal() {
        let lookup = |_: &str| None;
        assert_eq!(substitute_env_with("${THERRA_MISSING}", lookup), "${THERRA_MISSING}");
        assert_eq!(substitute_env_with("tail ${OPEN", lookup), "tail ${OPEN");
        assert_eq!(substitute_env_with("cost $5", lookup), "cost $5");
    }
}
