/// Identity used when no host session provides one.
pub const LOCAL_USER: &str = "local";
const USER_ENV_VAR: &str = "STRONGTHREAD_USER";

/// Maps the host session to a stable user id: an explicit value wins, then
/// `STRONGTHREAD_USER`, then [`LOCAL_USER`].
pub fn resolve_user_id(explicit: Option<&str>) -> String {
    explicit
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .or_else(|| {
            std::env::var(USER_ENV_VAR)
                .ok()
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        })
        .unwrap_or_else(|| LOCAL_USER.to_string())
}

#[cfg(test)]
mod tests {
    use super::resolve_user_id;

    #[test]
    fn explicit_user_wins() {
        assert_eq!(resolve_user_id(Some(" alice ")), "alice");
    }

    #[test]
    fn blank_explicit_value_falls_through() {
        let resolved = resolve_user_id(Some("   "));
        assert!(!resolved.is_empty());
    }
}
