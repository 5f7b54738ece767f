//! Argument-name transforms shared by schema generation and decoding.

/// Returns the wire name of `arg` when exposed on behalf of `owner`.
pub fn prefixed_arg_name(owner: &str, arg: &str) -> String {
    format!("{owner}_{arg}")
}

/// Re-cases an environment variable name into an argument name.
///
/// Segments split on `_` are capitalized and joined: `FOO_BAR` becomes
/// `FooBar`. Empty segments are dropped.
pub fn format_env_variable_name(name: &str) -> String {
    name.split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect()
            })
        })
        .collect()
}
