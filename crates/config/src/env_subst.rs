/// Expand `${NAME}` placeholders from the process environment.
///
/// Unset variables and unterminated placeholders are kept verbatim, so a
/// later validation pass can still point at them.
pub fn substitute_env(input: &str) -> String {
    substitute_env_with(input, |name| std::env::var(name).ok())
}

pub(crate) fn substitute_env_with(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return out;
        };

        let name = &after[..end];
        match (!name.is_empty()).then(|| lookup(name)).flatten() {
            Some(value) => out.push_str(&value),
            None => out.push_str(&rest[start..start + 2 + end + 1]),
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_known_var() {
        let lookup = |name: &str| match name {
            "COURIER_TEST_TOKEN" => Some("123:abc".to_string()),
            _ => None,
        };
        assert_eq!(
            substitute_env_with("token = \"${COURIER_TEST_TOKEN}\"", lookup),
            "token = \"123:abc\""
        );
    }

    #[test]
    fn leaves_unknown_var() {
        let lookup = |_: &str| None;
        assert_eq!(
            substitute_env_with("${GEMINI_API_KEY}", lookup),
            "${GEMINI_API_KEY}"
        );
    }

    #[test]
    fn unterminated_placeholder_is_literal() {
        let lookup = |_: &str| Some("x".to_string());
        assert_eq!(substitute_env_with("key=${OPEN", lookup), "key=${OPEN");
        assert_eq!(substitute_env_with("cost: $5 {}", lookup), "cost: $5 {}");
    }

    #[test]
    fn substitutes_several_vars() {
        let lookup = |name: &str| Some(name.to_lowercase());
        assert_eq!(substitute_env_with("${A}-${B}", lookup), "a-b");
    }

    #[test]
    fn no_placeholders() {
        assert_eq!(substitute_env("plain text"), "plain text");
    }
}
