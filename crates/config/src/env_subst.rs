//! `${ENV_VAR}` placeholder substitution in raw config text.

/// Replace `${ENV_VAR}` placeholders with values from the environment.
///
/// Unresolvable or malformed placeholders are left as-is.
pub fn substitute_env(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) if end > 0 => {
                let name = &after[..end];
                match std::env::var(name) {
                    Ok(val) => out.push_str(&val),
                    Err(_) => {
                        out.push_str("${");
                        out.push_str(name);
                        out.push('}');
                    },
                }
                rest = &after[end + 1..];
            },
            _ => {
                // No closing brace (or empty name) — emit the rest verbatim.
                out.push_str(&rest[start..]);
                rest = "";
            },
        }
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[allow(unsafe_code)]
    fn substitutes_known_var() {
        unsafe { std::env::set_var("APIBRIDGE_TEST_SUBST", "hello") };
        assert_eq!(substitute_env("key=${APIBRIDGE_TEST_SUBST}"), "key=hello");
    }

    #[test]
    fn leaves_unknown_var_as_is() {
        assert_eq!(
            substitute_env("key=${APIBRIDGE_NO_SUCH_VAR_XYZ}"),
            "key=${APIBRIDGE_NO_SUCH_VAR_XYZ}"
        );
    }

    #[test]
    fn leaves_unclosed_placeholder_as_is() {
        assert_eq!(substitute_env("key=${OOPS"), "key=${OOPS");
        assert_eq!(substitute_env("key=${}"), "key=${}");
    }
}
