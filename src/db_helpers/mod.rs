mod category_helpers;
mod post_helpers;
mod tag_helpers;
mod user_helpers;

pub use category_helpers::*;
pub use post_helpers::*;
pub use tag_helpers::*;
pub use user_helpers::*;

/// Escapes `%`, `_` and `\` so `value` matches literally inside a
/// `LIKE ... ESCAPE '\'` pattern.
pub(crate) fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// `%value%` with wildcards in `value` escaped.
pub(crate) fn contains_pattern(value: &str) -> String {
    format!("%{}%", escape_like(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcards_are_escaped() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(contains_pattern("django"), "%django%");
    }
}
