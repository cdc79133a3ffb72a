/// Get environment variable with LEDGERLINE_ prefix, falling back to unprefixed version
///
/// This helper function checks for `LEDGERLINE_{key}` first, then falls back to `{key}`
/// for compatibility with standard environment variable naming.
///
/// # Examples
///
/// ```rust
/// use ledgerline::utils::get_env_with_prefix;
///
/// // Checks LEDGERLINE_BILLING_API_KEY first, then BILLING_API_KEY
/// let key = get_env_with_prefix("BILLING_API_KEY");
///
/// // Checks LEDGERLINE_LOG_LEVEL first, then LOG_LEVEL
/// let level = get_env_with_prefix("LOG_LEVEL");
/// ```
pub fn get_env_with_prefix(key: &str) -> Option<String> {
    std::env::var(format!("LEDGERLINE_{}", key))
        .or_else(|_| std::env::var(key))
        .ok()
}
