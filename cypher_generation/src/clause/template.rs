//! Interpolation of rendered children into a clause's template string.
//!
//! Templates understand three directives:
//!
//! - `%s` substitutes the next argument.
//! - `%[n]s` substitutes the `n`-th argument (1-based). A following `%s`
//!   continues with argument `n + 1`.
//! - `%%` is a literal percent sign.
//!
//! A directive referring to a missing argument renders as `%!s(MISSING)`.
//! Arguments left over after the last sequential directive are not rendered
//! and logged as a warning, unless the template uses indexed directives.

/// Placeholder for a directive without a matching argument.
pub const MISSING: &str = "%!s(MISSING)";

pub fn format_template<S: AsRef<str>>(template: &str, args: &[S]) -> String {
    let (out, unused) = interpolate(template, args);
    if unused > 0 {
        tracing::warn!(template, unused, "template leaves arguments unused");
    }
    out
}

/// Renders `template`, returning the number of trailing arguments no
/// directive consumed.
fn interpolate<S: AsRef<str>>(template: &str, args: &[S]) -> (String, usize) {
    let mut reordered = false;
    let mut out = String::with_capacity(template.len() + args.iter().map(|a| a.as_ref().len()).sum::<usize>());
    let mut next = 0usize;
    let mut rest = template;

    while let Some(pos) = rest.find('%') {
        out.push_str(&rest[..pos]);
        let directive = &rest[pos + 1..];

        if let Some(after) = directive.strip_prefix('%') {
            out.push('%');
            rest = after;
        } else if let Some(after) = directive.strip_prefix('s') {
            push_arg(&mut out, args, next);
            next += 1;
            rest = after;
        } else if let Some((index, after)) = parse_indexed(directive) {
            push_arg(&mut out, args, index);
            next = index + 1;
            reordered = true;
            rest = after;
        } else {
            // Not a directive, keep it verbatim.
            out.push('%');
            rest = directive;
        }
    }
    out.push_str(rest);
    let unused = if reordered { 0 } else { args.len().saturating_sub(next) };
    (out, unused)
}

/// Parses `[n]s`, returning the zero-based index and the remainder.
fn parse_indexed(directive: &str) -> Option<(usize, &str)> {
    let inner = directive.strip_prefix('[')?;
    let close = inner.find(']')?;
    let index: usize = inner[..close].parse().ok()?;
    let after = inner[close + 1..].strip_prefix('s')?;
    Some((index.checked_sub(1)?, after))
}

fn push_arg<S: AsRef<str>>(out: &mut String, args: &[S], index: usize) {
    match args.get(index) {
        Some(arg) => out.push_str(arg.as_ref()),
        None => out.push_str(MISSING),
    }
}

/// A template concatenating `n` arguments.
pub fn concat_template(n: usize) -> String {
    "%s".repeat(n)
}

/// Escapes `%` so that `value` renders verbatim as a template.
pub fn escape(value: &str) -> String {
    value.replace('%', "%%")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequential() {
        assert_eq!(format_template("MATCH %s WHERE %s", &["(n)", "true"]), "MATCH (n) WHERE true");
    }

    #[test]
    fn indexed_reuse() {
        assert_eq!(
            format_template("(CASE WHEN (%s) < 0 THEN -(%[1]s) ELSE %[1]s END)", &["x"]),
            "(CASE WHEN (x) < 0 THEN -(x) ELSE x END)"
        );
        assert_eq!(format_template("%[2]s %s %[1]s", &["a", "b", "c"]), "b c a");
    }

    #[test]
    fn percent_and_missing() {
        assert_eq!(format_template("%s%%%s", &["1", "2"]), "1%2");
        assert_eq!(format_template("%s %s", &["a"]), format!("a {MISSING}"));
        assert_eq!(format_template("", &["ignored"]), "");
    }

    #[test]
    fn leftover_arguments_are_counted() {
        assert_eq!(interpolate("%s", &["a", "b", "c"]), ("a".to_string(), 2));
        assert_eq!(interpolate("%s %s", &["a", "b"]).1, 0);
        assert_eq!(interpolate("%s %s", &["a"]).1, 0);
        // Indexed directives may skip arguments on purpose.
        assert_eq!(interpolate("MATCH %s %[3]s", &["a", "b", "c"]), ("MATCH a c".to_string(), 0));
        assert_eq!(interpolate("", &["ignored"]), (String::new(), 1));
    }

    #[test]
    fn escaped_values_render_verbatim() {
        let template = escape("'100%'");
        assert_eq!(format_template::<&str>(&template, &[]), "'100%'");
        assert_eq!(format_template(&concat_template(3), &["a", "b", "c"]), "abc");
    }
}
