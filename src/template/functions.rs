//! Helper functions and filters available to theme templates.
//!
//! | Name                     | Kind            | Example                                   |
//! |--------------------------|-----------------|-------------------------------------------|
//! | `mod`, `minus`, `plus`   | function        | `{{ mod(loop.index0, 2) }}`               |
//! | `iter`                   | function        | `{% for i in iter(3) %}`                  |
//! | `every_nth_media_item`   | function        | `every_nth_media_item(media, 2, 0)`       |
//! | `to_int`                 | function        | `to_int(props.columns)`                   |
//! | `fmt_year_and_month`     | function        | `fmt_year_and_month(2024, 5)` → `2024-05` |
//! | `lower`                  | function/filter | `lower(tag)`                              |
//! | `normalize_tag_uri`      | function/filter | `tag \| normalize_tag_uri`                |

use crate::utils::{date::fmt_year_and_month, slug::normalize_tag_uri};
use minijinja::{Environment, Error, ErrorKind, Value};

pub fn register(env: &mut Environment<'static>) {
    env.add_function("mod", |a: i64, b: i64| -> Result<i64, Error> {
        if b == 0 {
            return Err(Error::new(ErrorKind::InvalidOperation, "mod by zero"));
        }
        Ok(a % b)
    });
    env.add_function("minus", |a: i64, b: i64| a - b);
    env.add_function("plus", |a: i64, b: i64| a + b);
    env.add_function("iter", |count: usize| (0..count).collect::<Vec<usize>>());
    env.add_function("every_nth_media_item", every_nth_item);
    env.add_function("to_int", |s: String| s.trim().parse::<i64>().unwrap_or(0));
    env.add_function("fmt_year_and_month", |year: i32, month: u32| {
        fmt_year_and_month(year, month)
    });
    env.add_function("lower", |s: String| s.to_lowercase());
    env.add_function("normalize_tag_uri", |s: String| normalize_tag_uri(&s));
    env.add_filter("normalize_tag_uri", |s: String| normalize_tag_uri(&s));
}

/// Items whose index `i` satisfies `i % nth == start`.
fn every_nth_item(items: Value, nth: usize, start: usize) -> Result<Value, Error> {
    if nth == 0 {
        return Err(Error::new(ErrorKind::InvalidOperation, "nth must be positive"));
    }
    let picked: Vec<Value> = items
        .try_iter()?
        .enumerate()
        .filter(|(idx, _)| idx % nth == start)
        .map(|(_, item)| item)
        .collect();
    Ok(Value::from(picked))
}

#[cfg(test)]
mod tests {
    use super::*;
    use minijinja::context;

    fn render(source: &str, ctx: Value) -> String {
        let mut env = Environment::new();
        register(&mut env);
        env.render_str(source, ctx).unwrap()
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(render("{{ mod(7, 3) }} {{ minus(7, 3) }} {{ plus(7, 3) }}", context! {}), "1 4 10");
    }

    #[test]
    fn test_mod_by_zero_errors() {
        let mut env = Environment::new();
        register(&mut env);
        assert!(env.render_str("{{ mod(1, 0) }}", context! {}).is_err());
    }

    #[test]
    fn test_iter_and_to_int() {
        assert_eq!(render("{% for i in iter(to_int(n)) %}{{ i }}{% endfor %}", context! { n => "3" }), "012");
        assert_eq!(render("{{ to_int('x') }}", context! {}), "0");
    }

    #[test]
    fn test_every_nth_media_item() {
        let out = render(
            "{% for m in every_nth_media_item(items, 2, 1) %}{{ m }},{% endfor %}",
            context! { items => vec!["a", "b", "c", "d", "e"] },
        );
        assert_eq!(out, "b,d,");
    }

    #[test]
    fn test_string_helpers() {
        assert_eq!(render("{{ fmt_year_and_month(2024, 5) }}", context! {}), "2024-05");
        assert_eq!(render("{{ lower('ABC') }}", context! {}), "abc");
        assert_eq!(render("{{ 'Multi Word' | normalize_tag_uri }}", context! {}), "multi_word");
    }
}
