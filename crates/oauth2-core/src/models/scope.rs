/// Split a space-delimited scope string into individual scopes.
///
/// Duplicates are dropped; first occurrence order is kept.
pub fn parse_scopes(raw: &str) -> Vec<String> {
    let mut scopes: Vec<String> = Vec::new();
    for scope in raw.split_whitespace() {
        if !scopes.iter().any(|s| s == scope) {
            scopes.push(scope.to_string());
        }
    }
    scopes
}

pub fn join_scopes(scopes: &[String]) -> String {
    scopes.join(" ")
}

/// True when every scope in `requested` is present in `granted`.
pub fn covers_scopes(granted: &[String], requested: &str) -> bool {
    requested
        .split_whitespace()
        .all(|s| granted.iter().any(|g| g == s))
}
