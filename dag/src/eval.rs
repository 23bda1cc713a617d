use catalog::XmlElement;

/// The narrow collaborator interface spec.md §6 describes as "a small
/// expression language... the core only needs: evaluate a string
/// expression against a context, returning a stringifiable value".
///
/// The differ never depends on a real expression interpreter; it only
/// needs something implementing this trait to resolve `{eval.expr}`
/// placeholders in dependency templates (spec.md §4.1).
pub trait ExprEval {
    fn eval(&self, expr: &str, old: &XmlElement, new: &XmlElement) -> String;
}

/// A minimal evaluator sufficient for the templates diff rules actually
/// embed: `{eval.expr}` resolves to the literal text of an attribute named
/// `expr` on the `after` content node, falling back to `before`, or the
/// empty string. Good enough to drive the core without pulling in a real
/// expression language (SPEC_FULL.md §6).
#[derive(Debug, Default, Clone, Copy)]
pub struct AttrEval;

impl ExprEval for AttrEval {
    fn eval(&self, expr: &str, old: &XmlElement, new: &XmlElement) -> String {
        new.attr(expr)
            .or_else(|| old.attr(expr))
            .unwrap_or_default()
            .to_string()
    }
}

/// Resolve the `{old.attr}`/`{new.attr}`/`{eval.expr}` placeholders in a
/// dependency template string (spec.md §4.1, "The template language").
pub fn substitute(template: &str, old: &XmlElement, new: &XmlElement, eval: &dyn ExprEval) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        let Some(end) = rest[start..].find('}') else {
            out.push_str(rest);
            return out;
        };
        out.push_str(&rest[..start]);
        let token = &rest[start + 1..start + end];
        out.push_str(&resolve_token(token, old, new, eval));
        rest = &rest[start + end + 1..];
    }
    out.push_str(rest);
    out
}

fn resolve_token(token: &str, old: &XmlElement, new: &XmlElement, eval: &dyn ExprEval) -> String {
    if let Some(attr) = token.strip_prefix("old.") {
        return old.attr(attr).unwrap_or_default().to_string();
    }
    if let Some(attr) = token.strip_prefix("new.") {
        return new.attr(attr).unwrap_or_default().to_string();
    }
    if let Some(expr) = token.strip_prefix("eval.") {
        return eval.eval(expr, old, new);
    }
    String::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_old_and_new() {
        let mut old = XmlElement::new("dbobject");
        old.attrs.insert("owner".into(), "alice".into());
        let mut new = XmlElement::new("dbobject");
        new.attrs.insert("owner".into(), "bob".into());

        let out = substitute("role.{old.owner}", &old, &new, &AttrEval);
        assert_eq!(out, "role.alice");
        let out = substitute("role.{new.owner}", &old, &new, &AttrEval);
        assert_eq!(out, "role.bob");
    }
}
