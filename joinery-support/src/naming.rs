//! Naming helpers used to address classes by name.
//!
//! The container lets an untyped parameter such as `order_processor` find a
//! registered `OrderProcessor`. These helpers derive that lookup name from a
//! Rust type name.

/// Shortens a fully qualified type name for display.
///
/// ```
/// use joinery_support::naming::shorten_type_name;
///
/// assert_eq!(shorten_type_name("my_app::orders::OrderProcessor"), "OrderProcessor");
/// assert_eq!(
///     shorten_type_name("alloc::sync::Arc<dyn my_app::traits::Logger>"),
///     "Arc<dyn Logger>"
/// );
/// ```
pub fn shorten_type_name(full_name: &str) -> String {
    let mut result = String::with_capacity(full_name.len());
    let mut segment = String::new();
    let mut chars = full_name.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            ':' if chars.peek() == Some(&':') => {
                chars.next();
                segment.clear();
            }
            '<' | '>' | ',' | ' ' | '(' | ')' | '[' | ']' | ';' | '&' => {
                result.push_str(&segment);
                result.push(ch);
                segment.clear();
            }
            _ => segment.push(ch),
        }
    }

    result.push_str(&segment);
    result
}

/// Converts a `CamelCase` identifier to `snake_case`.
///
/// Acronyms stay together: `HTTPClient` becomes `http_client`.
///
/// ```
/// use joinery_support::naming::snake_case;
///
/// assert_eq!(snake_case("OrderProcessor"), "order_processor");
/// assert_eq!(snake_case("HTTPClient"), "http_client");
/// ```
pub fn snake_case(ident: &str) -> String {
    let chars: Vec<char> = ident.chars().collect();
    let mut out = String::with_capacity(ident.len() + 4);

    for (i, &ch) in chars.iter().enumerate() {
        if ch.is_uppercase() {
            let prev = i.checked_sub(1).map(|p| chars[p]);
            let next = chars.get(i + 1).copied();
            let starts_word = match prev {
                None | Some('_') => false,
                Some(p) if p.is_lowercase() || p.is_ascii_digit() => true,
                Some(p) if p.is_uppercase() => next.is_some_and(char::is_lowercase),
                Some(_) => false,
            };
            if starts_word {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
        } else {
            out.push(ch);
        }
    }

    out
}

/// Derives the name a class can be looked up by.
///
/// Generic arguments are dropped, so `Repository<User>` is found as
/// `repository`.
///
/// ```
/// use joinery_support::naming::lookup_name;
///
/// assert_eq!(lookup_name("shop::OrderProcessor"), "order_processor");
/// assert_eq!(lookup_name("shop::Repository<shop::User>"), "repository");
/// ```
pub fn lookup_name(full_name: &str) -> String {
    let short = shorten_type_name(full_name);
    let base = short.split('<').next().unwrap_or_default();
    snake_case(base.trim_start_matches("dyn ").trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shorten_keeps_plain_names() {
        assert_eq!(shorten_type_name("u16"), "u16");
    }

    #[test]
    fn shorten_nested_generics() {
        assert_eq!(
            shorten_type_name("core::option::Option<alloc::sync::Arc<app::Db>>"),
            "Option<Arc<Db>>"
        );
    }

    #[test]
    fn snake_case_simple() {
        assert_eq!(snake_case("MyClass"), "my_class");
        assert_eq!(snake_case("Socket"), "socket");
    }

    #[test]
    fn snake_case_acronyms_and_digits() {
        assert_eq!(snake_case("ParseJSONValue"), "parse_json_value");
        assert_eq!(snake_case("Ipv4Addr"), "ipv4_addr");
    }

    #[test]
    fn snake_case_is_idempotent() {
        assert_eq!(snake_case("already_snake"), "already_snake");
    }

    #[test]
    fn lookup_name_of_trait_object() {
        assert_eq!(lookup_name("dyn app::shapes::Shape"), "shape");
    }
}
